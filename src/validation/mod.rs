//! 校验汇总层
//!
//! 纯函数：把每道题的校验结果汇总成作业级别的置信度统计。
//! 结果按 `Section.index` 对应，输入顺序无关；缺失或重复的结果
//! 只记录在明细里，不会让作业失败。

use std::collections::HashMap;

use serde_json::json;
use tracing::warn;

use crate::models::answer::clamp_unit;
use crate::models::{ConfidenceBucket, Section, SectionDetail, SectionOutcome, ValidationSummary};

/// 置信度分档阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThresholds {
    /// 不低于该值为高置信度
    pub high: f64,
    /// 不低于该值（且低于 high）为中置信度
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self { high: 0.8, medium: 0.6 }
    }
}

impl ConfidenceThresholds {
    pub fn bucket(&self, confidence: f64) -> ConfidenceBucket {
        if confidence >= self.high {
            ConfidenceBucket::High
        } else if confidence >= self.medium {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}

/// 汇总所有题目的校验结果
pub fn aggregate(
    sections: &[Section],
    outcomes: &[SectionOutcome],
    thresholds: &ConfidenceThresholds,
) -> ValidationSummary {
    let mut by_index: HashMap<usize, (&SectionOutcome, usize)> = HashMap::new();
    for outcome in outcomes {
        by_index
            .entry(outcome.index)
            .and_modify(|(_, count)| *count += 1)
            .or_insert((outcome, 1));
    }

    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let mut summary = ValidationSummary {
        total_sections: sections.len(),
        ..ValidationSummary::default()
    };
    let mut confidence_sum = 0.0;

    for section in ordered {
        let Some((outcome, count)) = by_index.remove(&section.index) else {
            warn!("⚠️ 题目 #{} 没有生成结果", section.index);
            summary.section_details.push(missing_detail(section));
            continue;
        };

        let has_content = outcome.answer.has_content();
        let confidence = clamp_unit(outcome.validation.confidence);
        let bucket = has_content.then(|| thresholds.bucket(confidence));

        if let Some(bucket) = bucket {
            summary.validated_sections += 1;
            confidence_sum += confidence;
            match bucket {
                ConfidenceBucket::High => summary.high_confidence_sections += 1,
                ConfidenceBucket::Medium => summary.medium_confidence_sections += 1,
                ConfidenceBucket::Low => summary.low_confidence_sections += 1,
            }
        }

        let mut verification_details = outcome.validation.verification_details.clone();
        if count > 1 {
            warn!("⚠️ 题目 #{} 有 {} 个生成结果，只使用第一个", section.index, count);
            verification_details.insert("anomaly".to_string(), json!("duplicate_outcome"));
            verification_details.insert("outcome_count".to_string(), json!(count));
        }

        summary.section_details.push(SectionDetail {
            section_index: section.index,
            content_type: section.content_type,
            is_valid: outcome.validation.is_valid && has_content,
            confidence,
            confidence_bucket: bucket,
            has_content,
            tokens_used: outcome.answer.tokens_used,
            verification_details,
            validation_error: outcome
                .validation
                .validation_error
                .clone()
                .or_else(|| outcome.answer.error.clone()),
        });
    }

    if !by_index.is_empty() {
        let mut orphans: Vec<usize> = by_index.into_keys().collect();
        orphans.sort_unstable();
        warn!("⚠️ 忽略没有对应题目的生成结果: {:?}", orphans);
    }

    summary.overall_confidence = if summary.validated_sections == 0 {
        0.0
    } else {
        clamp_unit(confidence_sum / summary.validated_sections as f64)
    };
    summary
}

fn missing_detail(section: &Section) -> SectionDetail {
    SectionDetail {
        section_index: section.index,
        content_type: section.content_type,
        is_valid: false,
        confidence: 0.0,
        confidence_bucket: None,
        has_content: false,
        tokens_used: 0,
        verification_details: [("anomaly".to_string(), json!("missing_outcome"))]
            .into_iter()
            .collect(),
        validation_error: Some("缺少生成结果".to_string()),
    }
}
