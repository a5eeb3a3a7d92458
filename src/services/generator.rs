//! 文本生成能力的抽象
//!
//! 生成引擎只依赖这个 trait；生产环境用 `LlmService`，测试用脚本化的假实现。

use async_trait::async_trait;

use crate::error::GenerationError;

/// 一次生成请求
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    /// 为空时使用配置中的默认温度
    pub temperature: Option<f32>,
}

/// 一次生成的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u32,
}

/// 文本生成能力
///
/// 实现必须可以被多个任务并发调用。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instruction: &Instruction) -> Result<Generation, GenerationError>;

    /// 模型名称，仅用于日志和错误信息
    fn model_name(&self) -> &str;
}
