//! 题目并发池 - 编排层
//!
//! ## 职责
//!
//! 1. **并发控制**：使用 Semaphore 限制同时生成的题目数量
//! 2. **任务隔离**：每道题一个 `tokio::spawn` 任务，任务 panic 只影响该题
//! 3. **取消传播**：收到取消信号后中止所有未完成的任务
//! 4. **结果对齐**：返回的结果与输入题目一一对应

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::generation::AnswerEngine;
use crate::models::{Section, SectionOutcome};

/// 取消信号（接收端）
pub type CancelSignal = watch::Receiver<bool>;

/// 取消句柄（发送端）
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// 请求取消，正在进行的生成任务会被中止
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// 创建一对取消句柄和信号
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle {
            sender: Arc::new(sender),
        },
        receiver,
    )
}

/// 等待取消；发送端被丢弃时永远不会返回
async fn wait_cancelled(signal: &mut CancelSignal) {
    if signal.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// 并发生成所有题目的答案
///
/// # 参数
/// - `engine`: 答案生成引擎
/// - `sections`: 待生成的题目
/// - `concurrency`: 最大并发数
/// - `cancel`: 取消信号
/// - `partial_on_cancel`: 取消后是否继续输出部分结果
///
/// # 返回
/// 与 `sections` 一一对应的结果；取消且不要求部分结果时返回 `Cancelled`
pub async fn solve_all(
    engine: Arc<AnswerEngine>,
    sections: &[Section],
    concurrency: usize,
    cancel: &mut CancelSignal,
    partial_on_cancel: bool,
    job_label: &str,
) -> PipelineResult<Vec<SectionOutcome>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    info!(
        "[作业 {}] 🚀 开始生成 {} 道题目 (并发数 {})",
        job_label,
        sections.len(),
        concurrency.max(1)
    );

    // 为每道题创建任务，许可在任务内部获取，方便取消时直接中止
    let handles: Vec<JoinHandle<SectionOutcome>> = sections
        .iter()
        .cloned()
        .map(|section| {
            let engine = engine.clone();
            let semaphore = semaphore.clone();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                engine.solve(&section).await
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(sections.len());
    let mut cancelled = false;

    for (section, mut handle) in sections.iter().zip(handles) {
        if !cancelled {
            tokio::select! {
                joined = &mut handle => {
                    outcomes.push(joined_outcome(section, joined, job_label));
                    continue;
                }
                _ = wait_cancelled(cancel) => {
                    warn!("[作业 {}] ⚠️ 收到取消信号，中止未完成的题目", job_label);
                    cancelled = true;
                }
            }
        }

        // 已经完成的任务保留结果，其余中止
        if handle.is_finished() {
            outcomes.push(joined_outcome(section, handle.await, job_label));
        } else {
            handle.abort();
            outcomes.push(AnswerEngine::failed(section, "cancelled", 0));
        }
    }

    if cancelled && !partial_on_cancel {
        return Err(PipelineError::Cancelled);
    }
    Ok(outcomes)
}

fn joined_outcome(
    section: &Section,
    joined: Result<SectionOutcome, tokio::task::JoinError>,
    job_label: &str,
) -> SectionOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("[作业 {}] 题目 #{} 任务执行失败: {}", job_label, section.index, e);
            let cause = if e.is_panic() {
                "generation task panicked"
            } else {
                "generation task cancelled"
            };
            AnswerEngine::failed(section, cause, 0)
        }
    }
}
