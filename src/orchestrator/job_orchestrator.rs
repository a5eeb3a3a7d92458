//! 作业编排器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责一个作业（一个文件）的完整生命周期，是作业级别的状态机：
//!
//! ```text
//! Parsing → Generating → Aggregating → WritingBack → Done
//!    └──────────┴─────────────────────────┴────────→ Failed
//! ```
//!
//! 1. **解析**：读取原始字节，抽取题目；失败后不再执行任何阶段
//! 2. **生成**：按订阅等级限制并发，单题失败不影响作业
//! 3. **汇总**：纯计算，不会失败
//! 4. **写回**：序列化并写入输出文件；失败则作业失败，不产生输出
//! 5. **结果**：无论成功失败，每个作业恰好产生一个 `JobResult`

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::extraction::{extract, Extraction};
use crate::formats::{self, FormatRegistry};
use crate::generation::AnswerEngine;
use crate::infrastructure::FileStore;
use crate::models::{
    Answer, CompletionJob, JobResult, JobStatus, ProcessingMetadata, Section, ValidationSummary,
};
use crate::orchestrator::section_pool::{self, cancellation, CancelSignal};
use crate::services::TextGenerator;
use crate::validation::aggregate;
use crate::writeback::{derive_output_reference, write_back, WriteBackOptions};

/// 作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Parsing,
    Generating,
    Aggregating,
    WritingBack,
    Done,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Parsing => "Parsing",
            JobState::Generating => "Generating",
            JobState::Aggregating => "Aggregating",
            JobState::WritingBack => "WritingBack",
            JobState::Done => "Done",
            JobState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// 作业编排器
///
/// 持有作业开始前就构建好的无状态服务，可以依次（或并发）运行多个作业。
pub struct JobOrchestrator {
    config: Config,
    registry: FormatRegistry,
    engine: Arc<AnswerEngine>,
    store: Arc<dyn FileStore>,
    writeback: WriteBackOptions,
}

/// 作业执行过程中逐步积累的结果
#[derive(Default)]
struct Progress {
    state: Option<JobState>,
    metadata: ProcessingMetadata,
    summary: ValidationSummary,
    /// (输出引用, 是否加了水印)
    output: Option<(String, bool)>,
}

impl JobOrchestrator {
    /// 使用内置格式创建编排器
    pub fn new(config: Config, generator: Arc<dyn TextGenerator>, store: Arc<dyn FileStore>) -> Self {
        let engine = Arc::new(AnswerEngine::new(generator, &config));
        let writeback = WriteBackOptions {
            watermark_text: config.watermark_text.clone(),
        };
        Self {
            config,
            registry: FormatRegistry::with_defaults(),
            engine,
            store,
            writeback,
        }
    }

    /// 替换格式注册表
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// 替换生成引擎（例如使用不同的重试策略）
    pub fn with_engine(mut self, engine: AnswerEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// 运行作业（不可取消）
    pub async fn run(&self, job: &CompletionJob) -> JobResult {
        let (_handle, signal) = cancellation();
        self.run_with_cancellation(job, signal, false).await
    }

    /// 运行作业
    ///
    /// # 参数
    /// - `job`: 作业描述
    /// - `cancel`: 取消信号，只在生成阶段生效
    /// - `partial_on_cancel`: 取消后是否把未完成的题目记为失败并继续写回
    ///
    /// # 返回
    /// 作业结果；失败时 `completed_file` 为空，`error` 写明原因
    pub async fn run_with_cancellation(
        &self,
        job: &CompletionJob,
        mut cancel: CancelSignal,
        partial_on_cancel: bool,
    ) -> JobResult {
        log_job_start(job);

        let mut progress = Progress::default();
        let outcome = self
            .execute(job, &mut cancel, partial_on_cancel, &mut progress)
            .await;

        match outcome {
            Ok(()) => {
                let result = build_result(job, progress, None);
                log_job_done(&result);
                result
            }
            Err(e) => {
                log_job_failed(job, progress.state, &e);
                transition(job, &mut progress, JobState::Failed);
                build_result(job, progress, Some(e.to_string()))
            }
        }
    }

    async fn execute(
        &self,
        job: &CompletionJob,
        cancel: &mut CancelSignal,
        partial_on_cancel: bool,
        progress: &mut Progress,
    ) -> PipelineResult<()> {
        // 1. 解析
        transition(job, progress, JobState::Parsing);
        let format = formats::normalize(&job.file_type);
        if self.registry.parser(&format).is_none() {
            return Err(PipelineError::no_parser(format));
        }
        let bytes = self.store.read(&job.file_reference).await?;
        let Extraction { document, sections } = extract(&bytes, &format, &self.registry)?;
        progress.metadata.analysis_completed = true;

        // 2. 生成
        transition(job, progress, JobState::Generating);
        let outcomes = section_pool::solve_all(
            self.engine.clone(),
            &sections,
            self.config.concurrency_for(job.subscription_tier),
            cancel,
            partial_on_cancel,
            &job.file_reference,
        )
        .await?;
        progress.metadata.content_filled = true;

        // 3. 汇总
        transition(job, progress, JobState::Aggregating);
        progress.summary = aggregate(&sections, &outcomes, &self.config.thresholds());

        // 4. 写回
        transition(job, progress, JobState::WritingBack);
        let answers = pair_by_index(&sections, outcomes.into_iter().map(|o| (o.index, o.answer)));
        let output = write_back(
            &document,
            &answers,
            job.subscription_tier,
            &self.writeback,
            &self.registry,
        )?;

        let reference = derive_output_reference(&job.file_reference);
        self.store.write(&reference, &output.bytes).await?;
        progress.metadata.write_back_completed = true;
        progress.metadata.file_size_bytes = output.bytes.len() as u64;
        progress.output = Some((reference, output.watermark_applied));

        transition(job, progress, JobState::Done);
        Ok(())
    }
}

/// 按题目编号把答案对应回题目
fn pair_by_index(
    sections: &[Section],
    answers: impl IntoIterator<Item = (usize, Answer)>,
) -> Vec<(Section, Answer)> {
    let mut by_index: std::collections::HashMap<usize, Answer> = answers.into_iter().collect();
    sections
        .iter()
        .filter_map(|section| {
            by_index
                .remove(&section.index)
                .map(|answer| (section.clone(), answer))
        })
        .collect()
}

fn transition(job: &CompletionJob, progress: &mut Progress, next: JobState) {
    match progress.state {
        Some(prev) => info!("[作业 {}] 🔄 {} → {}", job.file_reference, prev, next),
        None => info!("[作业 {}] 🔄 {}", job.file_reference, next),
    }
    progress.state = Some(next);
}

fn build_result(job: &CompletionJob, progress: Progress, error: Option<String>) -> JobResult {
    let (completed_file, watermark_applied) = match (&error, progress.output) {
        (None, Some((reference, watermark))) => (Some(reference), watermark),
        _ => (None, false),
    };

    JobResult {
        status: if completed_file.is_some() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        },
        original_file: job.file_reference.clone(),
        completed_file,
        file_type: job.file_type.clone(),
        subscription_tier: job.subscription_tier,
        watermark_applied,
        sections_processed: progress.summary.total_sections,
        validation_results: progress.summary,
        processing_metadata: progress.metadata,
        error,
        user_id: job.user_id.clone(),
        processing_type: job.processing_type.clone(),
        completed_at: chrono::Local::now().to_rfc3339(),
    }
}

// ========== 日志辅助函数 ==========

fn log_job_start(job: &CompletionJob) {
    info!("\n{}", "=".repeat(60));
    info!("[作业 {}] 🚀 开始处理", job.file_reference);
    info!(
        "  格式: {} | 等级: {:?} | 用户: {} | 类型: {}",
        job.file_type, job.subscription_tier, job.user_id, job.processing_type
    );
    info!("{}", "=".repeat(60));
}

fn log_job_done(result: &JobResult) {
    let summary = &result.validation_results;
    info!("\n{}", "─".repeat(60));
    info!("[作业 {}] ✅ 处理完成", result.original_file);
    info!(
        "  题目: {} | 合格: {} | 高/中/低: {}/{}/{} | 总置信度: {:.2}",
        summary.total_sections,
        summary.validated_sections,
        summary.high_confidence_sections,
        summary.medium_confidence_sections,
        summary.low_confidence_sections,
        summary.overall_confidence
    );
    if let Some(file) = &result.completed_file {
        info!(
            "  输出: {} ({} 字节, 水印 {})",
            file,
            result.processing_metadata.file_size_bytes,
            if result.watermark_applied { "是" } else { "否" }
        );
    }
    info!("{}", "─".repeat(60));
}

fn log_job_failed(job: &CompletionJob, state: Option<JobState>, e: &PipelineError) {
    let stage = state.map(|s| s.to_string()).unwrap_or_default();
    error!("[作业 {}] ❌ 在 {} 阶段失败: {}", job.file_reference, stage, e);
}
