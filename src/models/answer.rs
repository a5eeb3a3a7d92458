use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::section::ContentType;

/// 单题生成结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub content_type: ContentType,
    pub tokens_used: u32,
    /// 仅在生成失败时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

impl Answer {
    pub fn failed(content_type: ContentType, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            text: String::new(),
            content_type,
            tokens_used: 0,
            error: Some(error.into()),
            attempts,
        }
    }

    /// 是否有可写回的内容
    pub fn has_content(&self) -> bool {
        self.error.is_none() && !self.text.trim().is_empty()
    }
}

/// 单题校验结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub verification_details: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl ValidationResult {
    /// 通过校验，置信度会被截断到 [0, 1]
    pub fn passed(confidence: f64) -> Self {
        Self {
            is_valid: true,
            confidence: clamp_unit(confidence),
            verification_details: BTreeMap::new(),
            validation_error: None,
        }
    }

    /// 未通过校验（仍有内容，只是不合格）
    pub fn rejected(confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            confidence: clamp_unit(confidence),
            verification_details: BTreeMap::new(),
            validation_error: Some(reason.into()),
        }
    }

    /// 生成彻底失败
    pub fn generation_failed(cause: impl Into<String>) -> Self {
        Self::rejected(0.0, cause)
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.verification_details.insert(key.to_string(), value.into());
        self
    }
}

/// 一道题的完整处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutcome {
    pub index: usize,
    pub answer: Answer,
    pub validation: ValidationResult,
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
