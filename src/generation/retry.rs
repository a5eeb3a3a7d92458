//! 重试策略
//!
//! 所有题型共用同一个重试包装：超时、接口错误、空内容都会重试，
//! 间隔按 `min(base * 2^(n-1), max)` 递增，重试耗尽后返回 `Exhausted`。

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::GenerationError;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次），至少为 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// 不等待的策略（测试用）
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// 第 `attempt` 次失败后等待多久（attempt 从 1 开始）
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// 带超时和重试地执行一次生成
///
/// 返回最终结果和实际尝试次数。
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    timeout: Duration,
    mut operation: F,
) -> (Result<T, GenerationError>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(timeout, operation(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        };

        match result {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if attempt >= max_attempts => {
                let exhausted = GenerationError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                };
                return (Err(exhausted), attempt);
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "⚠️ 第 {}/{} 次生成失败: {}，{} 毫秒后重试",
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
