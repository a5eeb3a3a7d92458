//! 简答题：一到三句话，写在同一行

use super::{compose_user_message, strip_answer_prefix, AnswerStrategy};
use crate::extraction::word_count;
use crate::models::{Section, ValidationResult};
use crate::services::Instruction;

/// 合理的词数区间
const MIN_WORDS: usize = 1;
const MAX_WORDS: usize = 60;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShortAnswerStrategy;

impl AnswerStrategy for ShortAnswerStrategy {
    fn build_prompt(&self, section: &Section) -> Instruction {
        let mut task = "Answer concisely in one to three sentences. Reply with the answer only.".to_string();
        if let Some(bank) = &section.word_bank {
            task.push_str(&format!(" Use terms from the word bank where they fit: {}.", bank.join(", ")));
        }
        Instruction {
            system: "You are a knowledgeable student answering homework questions accurately and briefly."
                .to_string(),
            user: compose_user_message(section, &task),
            max_tokens: 200,
            temperature: None,
        }
    }

    fn finalize(&self, raw: &str, _section: &Section) -> String {
        let joined = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        strip_answer_prefix(&joined).trim().to_string()
    }

    fn self_validate(&self, answer: &str, _section: &Section) -> ValidationResult {
        let words = word_count(answer);
        if words < MIN_WORDS {
            return ValidationResult::rejected(0.0, "答案为空");
        }

        // 超出区间后每多一个词降低 0.01，最低 0.3
        let confidence = if words <= MAX_WORDS {
            0.9
        } else {
            (0.9 - (words - MAX_WORDS) as f64 * 0.01).max(0.3)
        };
        ValidationResult::passed(confidence).with_detail("word_count", words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::strategies::tests::section;
    use crate::models::ContentType;

    #[test]
    fn test_finalize_single_line() {
        let s = section(ContentType::ShortAnswer, "Who wrote Hamlet?");
        assert_eq!(
            ShortAnswerStrategy.finalize("Answer: William\nShakespeare.", &s),
            "William Shakespeare."
        );
    }

    #[test]
    fn test_confidence_falls_outside_band() {
        let s = section(ContentType::ShortAnswer, "Explain osmosis.");
        let concise = ShortAnswerStrategy.self_validate("Water moves across a membrane.", &s);
        let rambling = ShortAnswerStrategy.self_validate(&vec!["word"; 100].join(" "), &s);
        assert!(concise.is_valid && rambling.is_valid);
        assert!(concise.confidence > rambling.confidence);
        assert!(!ShortAnswerStrategy.self_validate("  ", &s).is_valid);
    }
}
