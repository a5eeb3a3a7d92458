//! 日志工具模块
//!
//! 提供日志初始化、日志文件和格式化输出的辅助函数

use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::JobResult;

/// 初始化 tracing 订阅器
///
/// `RUST_LOG` 优先；没有设置时默认 `info`，详细模式下为 `debug`。
/// 重复调用不会报错（测试中常见）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n作业处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 把作业结果追加到日志文件（一行一个作业）
pub fn append_job_record(log_file_path: &str, result: &JobResult) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;

    let summary = &result.validation_results;
    writeln!(
        file,
        "[{}] {} -> {} | {:?} | 题目 {} | 合格 {} | 置信度 {:.2}{}",
        result.completed_at,
        result.original_file,
        result.completed_file.as_deref().unwrap_or("-"),
        result.status,
        summary.total_sections,
        summary.validated_sections,
        summary.overall_confidence,
        result
            .error
            .as_deref()
            .map(|e| format!(" | 错误: {}", e))
            .unwrap_or_default()
    )?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 作业自动填写");
    info!("🤖 模型: {}", config.llm_model_name);
    info!(
        "📊 最大并发数: 免费 {} / 付费 {}",
        config.max_concurrent_sections_free, config.max_concurrent_sections_paid
    );
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(result: &JobResult, log_file_path: &str) {
    let summary = &result.validation_results;
    info!("\n{}", "=".repeat(60));
    info!("📊 处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    if result.is_completed() {
        info!("✅ 合格: {}/{}", summary.validated_sections, summary.total_sections);
    } else {
        info!("❌ 失败: {}", result.error.as_deref().unwrap_or("未知错误"));
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionJob, JobStatus, ProcessingMetadata, SubscriptionTier, ValidationSummary};

    fn failed_result() -> JobResult {
        let job = CompletionJob::for_file("hw.pdf", "u1", SubscriptionTier::Free);
        JobResult {
            status: JobStatus::Failed,
            original_file: job.file_reference,
            completed_file: None,
            file_type: job.file_type,
            subscription_tier: job.subscription_tier,
            watermark_applied: false,
            sections_processed: 0,
            validation_results: ValidationSummary::default(),
            processing_metadata: ProcessingMetadata::default(),
            error: Some("不支持的文件格式".to_string()),
            user_id: job.user_id,
            processing_type: job.processing_type,
            completed_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_log_file_header_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autofill.log");
        let path = path.to_str().unwrap();

        init_log_file(path).unwrap();
        append_job_record(path, &failed_result()).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.contains("作业处理日志"));
        assert!(content.contains("hw.pdf -> - | Failed | 题目 0"));
        assert!(content.trim_end().ends_with("错误: 不支持的文件格式"));
    }
}
