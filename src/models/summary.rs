use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::section::ContentType;

/// 置信度分档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    High,
    Medium,
    Low,
}

/// 单题校验明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDetail {
    pub section_index: usize,
    pub content_type: ContentType,
    pub is_valid: bool,
    pub confidence: f64,
    /// 无内容（生成失败）时为空，不参与分档
    pub confidence_bucket: Option<ConfidenceBucket>,
    pub has_content: bool,
    pub tokens_used: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub verification_details: BTreeMap<String, JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

/// 作业级校验汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_sections: usize,
    pub validated_sections: usize,
    pub high_confidence_sections: usize,
    pub medium_confidence_sections: usize,
    pub low_confidence_sections: usize,
    pub overall_confidence: f64,
    pub section_details: Vec<SectionDetail>,
}
