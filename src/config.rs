use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::generation::RetryPolicy;
use crate::models::SubscriptionTier;
use crate::validation::ConfidenceThresholds;

/// 程序配置
///
/// 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 免费用户同时生成的题目数量
    pub max_concurrent_sections_free: usize,
    /// 付费用户同时生成的题目数量
    pub max_concurrent_sections_paid: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    // --- 重试配置 ---
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub request_timeout_secs: u64,
    // --- 校验配置 ---
    pub high_confidence_threshold: f64,
    pub medium_confidence_threshold: f64,
    /// 题目没有写明字数时的作文目标字数
    pub default_essay_words: usize,
    // --- 写回配置 ---
    pub watermark_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_sections_free: 2,
            max_concurrent_sections_paid: 8,
            verbose_logging: false,
            output_log_file: "autofill.log".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.3,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            request_timeout_secs: 60,
            high_confidence_threshold: 0.8,
            medium_confidence_threshold: 0.6,
            default_essay_words: 300,
            watermark_text: "Completed with Assignment Autofill (free tier)".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// 配置文件（可选）+ 环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        let d = self;
        Self {
            max_concurrent_sections_free: env_parse("MAX_CONCURRENT_SECTIONS_FREE").unwrap_or(d.max_concurrent_sections_free),
            max_concurrent_sections_paid: env_parse("MAX_CONCURRENT_SECTIONS_PAID").unwrap_or(d.max_concurrent_sections_paid),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(d.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(d.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(d.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(d.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(d.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(d.llm_temperature),
            max_attempts: env_parse("MAX_ATTEMPTS").unwrap_or(d.max_attempts),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS").unwrap_or(d.retry_base_delay_ms),
            retry_max_delay_ms: env_parse("RETRY_MAX_DELAY_MS").unwrap_or(d.retry_max_delay_ms),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(d.request_timeout_secs),
            high_confidence_threshold: env_parse("HIGH_CONFIDENCE_THRESHOLD").unwrap_or(d.high_confidence_threshold),
            medium_confidence_threshold: env_parse("MEDIUM_CONFIDENCE_THRESHOLD").unwrap_or(d.medium_confidence_threshold),
            default_essay_words: env_parse("DEFAULT_ESSAY_WORDS").unwrap_or(d.default_essay_words),
            watermark_text: std::env::var("WATERMARK_TEXT").unwrap_or(d.watermark_text),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "至少为 1"));
        }
        if self.max_concurrent_sections_free == 0 || self.max_concurrent_sections_paid == 0 {
            return Err(invalid("max_concurrent_sections_*", "并发数至少为 1"));
        }
        let (high, medium) = (self.high_confidence_threshold, self.medium_confidence_threshold);
        if !(0.0..=1.0).contains(&high) || !(0.0..=1.0).contains(&medium) || medium > high {
            return Err(invalid(
                "confidence thresholds",
                format!("需要 0 <= medium ({}) <= high ({}) <= 1", medium, high),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn thresholds(&self) -> ConfidenceThresholds {
        ConfidenceThresholds {
            high: self.high_confidence_threshold,
            medium: self.medium_confidence_threshold,
        }
    }

    /// 按订阅等级决定生成并发数
    pub fn concurrency_for(&self, tier: SubscriptionTier) -> usize {
        match tier {
            SubscriptionTier::Free => self.max_concurrent_sections_free,
            SubscriptionTier::Paid => self.max_concurrent_sections_paid,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}
