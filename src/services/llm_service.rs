//! LLM 服务 - 业务能力层
//!
//! 只负责"调用模型拿到文本"这一个能力，不关心题型和流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::services::generator::{Generation, Instruction, TextGenerator};

/// LLM 服务
///
/// 职责：
/// - 把 `Instruction` 转换成 Chat Completion 请求
/// - 返回模型输出和消耗的 token 数
/// - 不做重试、不做超时（由生成引擎统一处理）
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    default_temperature: f32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            default_temperature: config.llm_temperature,
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `max_tokens`: 最大输出 token 数
    /// - `temperature`: 采样温度
    ///
    /// # 返回
    /// 返回 LLM 的响应内容和 token 用量
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Generation, GenerationError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let fail = |e: &dyn std::fmt::Display| GenerationError::transport(&self.model_name, e);

        // 构建消息列表
        let mut messages = Vec::new();

        // 添加系统消息（如果提供）
        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| fail(&e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| fail(&e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| fail(&e))?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            fail(&e)
        })?;

        debug!("LLM API 调用成功");

        let tokens_used = response
            .usage
            .as_ref()
            .map(|usage| usage.total_tokens)
            .unwrap_or_default();

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyContent {
                model: self.model_name.clone(),
            });
        }

        Ok(Generation {
            text: content.trim().to_string(),
            tokens_used,
        })
    }
}

#[async_trait]
impl TextGenerator for LlmService {
    async fn generate(&self, instruction: &Instruction) -> Result<Generation, GenerationError> {
        self.send_to_llm(
            &instruction.user,
            Some(&instruction.system),
            instruction.max_tokens,
            instruction.temperature.unwrap_or(self.default_temperature),
        )
        .await
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 创建测试用的 LlmService（读取环境变量）
    fn create_test_service() -> LlmService {
        LlmService::new(&Config::from_env())
    }

    #[test]
    fn test_default_temperature_from_config() {
        let config = Config {
            llm_temperature: 0.7,
            ..Config::default()
        };
        let service = LlmService::new(&config);
        assert_eq!(service.default_temperature, 0.7);
        assert_eq!(service.model_name(), config.llm_model_name);
    }

    /// 测试通用 LLM 调用
    #[tokio::test]
    #[ignore]
    async fn test_send_to_llm_simple() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();

        println!("\n========== 测试通用 LLM 调用 ==========");
        let instruction = Instruction {
            system: "You are a concise assistant.".to_string(),
            user: "The capital of France is ____. Reply with the missing word only.".to_string(),
            max_tokens: 16,
            temperature: Some(0.0),
        };

        match service.generate(&instruction).await {
            Ok(generation) => {
                println!("\n========== LLM 响应 ==========");
                println!("{} ({} tokens)", generation.text, generation.tokens_used);
                println!("==============================\n");
                println!("✅ 通用 LLM 调用成功！");
                assert!(!generation.text.is_empty());
            }
            Err(e) => {
                println!("❌ LLM 调用失败: {}", e);
                panic!("测试失败: {}", e);
            }
        }
    }
}
