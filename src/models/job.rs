use serde::{Deserialize, Serialize};

use crate::models::summary::ValidationSummary;

/// 订阅等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Paid,
}

impl SubscriptionTier {
    pub fn is_free(self) -> bool {
        self == SubscriptionTier::Free
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "paid" | "pro" | "premium" => Ok(SubscriptionTier::Paid),
            other => Err(format!("未知的订阅等级: {}", other)),
        }
    }
}

/// 作业描述（提交后不再修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionJob {
    pub file_reference: String,
    /// 声明的扩展名，如 `docx`
    pub file_type: String,
    pub user_id: String,
    pub subscription_tier: SubscriptionTier,
    /// 仅作记录
    pub processing_type: String,
}

impl CompletionJob {
    /// 扩展名取自文件路径
    pub fn for_file(
        file_reference: impl Into<String>,
        user_id: impl Into<String>,
        subscription_tier: SubscriptionTier,
    ) -> Self {
        let file_reference = file_reference.into();
        let file_type = std::path::Path::new(&file_reference)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self {
            file_reference,
            file_type,
            user_id: user_id.into(),
            subscription_tier,
            processing_type: "complete_assignment".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
}

/// 各阶段完成标记
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub analysis_completed: bool,
    pub content_filled: bool,
    pub write_back_completed: bool,
    pub file_size_bytes: u64,
}

/// 作业最终结果（每个作业恰好生成一次）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub original_file: String,
    pub completed_file: Option<String>,
    pub file_type: String,
    pub subscription_tier: SubscriptionTier,
    pub watermark_applied: bool,
    pub sections_processed: usize,
    pub validation_results: ValidationSummary,
    pub processing_metadata: ProcessingMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub user_id: String,
    pub processing_type: String,
    pub completed_at: String,
}

impl JobResult {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }
}
