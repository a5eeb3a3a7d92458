//! 答案生成层
//!
//! ## 职责
//!
//! - 按题型选择策略（封闭枚举 `Strategy`）
//! - 通过 `TextGenerator` 调用模型，统一的重试 / 超时包装
//! - 整理答案并自检，给出 `ValidationResult`
//!
//! ## 失败隔离
//!
//! `AnswerEngine::solve` 永远不返回错误：重试耗尽后得到
//! `Answer { error }` + `ValidationResult { is_valid: false, confidence: 0.0 }`，
//! 单题失败不会影响其他题目。

pub mod retry;
pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::models::{Answer, Section, SectionOutcome, ValidationResult};
use crate::services::TextGenerator;

pub use retry::{with_retry, RetryPolicy};
pub use strategies::{AnswerStrategy, Strategy, StrategySettings};

/// 答案生成引擎
///
/// 无内部可变状态，可以在多个任务间共享（`Arc<AnswerEngine>`）。
pub struct AnswerEngine {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
    timeout: Duration,
    settings: StrategySettings,
}

impl AnswerEngine {
    /// 按配置创建引擎
    pub fn new(generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        Self {
            generator,
            policy: config.retry_policy(),
            timeout: config.request_timeout(),
            settings: StrategySettings {
                default_essay_words: config.default_essay_words,
            },
        }
    }

    /// 替换重试策略和单次调用超时
    pub fn with_retry_policy(mut self, policy: RetryPolicy, timeout: Duration) -> Self {
        self.policy = policy;
        self.timeout = timeout;
        self
    }

    /// 为一道题生成答案并自检
    pub async fn solve(&self, section: &Section) -> SectionOutcome {
        let strategy = Strategy::for_content_type(section.content_type, &self.settings);
        let instruction = strategy.build_prompt(section);

        let generator = &self.generator;
        let instruction = &instruction;
        let strategy = &strategy;
        let (result, attempts) = with_retry(&self.policy, self.timeout, |attempt| async move {
            debug!("  题目 #{} 第 {} 次生成 ({})", section.index, attempt, section.content_type);
            let generation = generator.generate(instruction).await?;
            // 整理后为空（例如只有一个空的代码围栏）同样按空内容重试
            let text = strategy.finalize(&generation.text, section);
            if text.trim().is_empty() {
                return Err(GenerationError::EmptyContent {
                    model: generator.model_name().to_string(),
                });
            }
            Ok((generation, text))
        })
        .await;

        match result {
            Ok((generation, text)) => {
                let validation = strategy
                    .assess(&generation.text, &text, section)
                    .with_detail("attempts", attempts);
                debug!(
                    "  题目 #{} ✓ 生成完成 (置信度 {:.2}, {} tokens)",
                    section.index, validation.confidence, generation.tokens_used
                );
                SectionOutcome {
                    index: section.index,
                    answer: Answer {
                        text,
                        content_type: section.content_type,
                        tokens_used: generation.tokens_used,
                        error: None,
                        attempts,
                    },
                    validation,
                }
            }
            Err(e) => {
                warn!("  题目 #{} ❌ 生成失败: {}", section.index, e);
                Self::failed(section, e.to_string(), attempts)
            }
        }
    }

    /// 生成失败时的降级结果
    pub fn failed(section: &Section, cause: impl Into<String>, attempts: u32) -> SectionOutcome {
        let cause = cause.into();
        SectionOutcome {
            index: section.index,
            answer: Answer::failed(section.content_type, cause.clone(), attempts),
            validation: ValidationResult::generation_failed(cause),
        }
    }
}
