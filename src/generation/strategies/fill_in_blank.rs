//! 填空题：简短的词或短语；有词库时答案必须来自词库

use std::sync::LazyLock;

use regex::Regex;

use super::{compose_user_message, first_line, strip_answer_prefix, strip_decorations, AnswerStrategy};
use crate::extraction::word_count;
use crate::models::{Section, ValidationResult};
use crate::services::Instruction;

static RE_LEFTOVER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)_{3,}|\[(?:answer|blank)\]|\{\{\s*answer\s*\}\}").expect("valid leftover marker regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct FillInBlankStrategy;

fn bank_match<'a>(answer: &str, bank: &'a [String]) -> Option<&'a String> {
    bank.iter().find(|w| w.trim().eq_ignore_ascii_case(answer.trim()))
}

impl AnswerStrategy for FillInBlankStrategy {
    fn build_prompt(&self, section: &Section) -> Instruction {
        let mut task =
            "Fill in the blank marked ____ with a short word or phrase. Reply with the missing text only.".to_string();
        if let Some(bank) = &section.word_bank {
            task.push_str(&format!(" Choose exactly one entry from this word bank: {}.", bank.join(", ")));
        }
        Instruction {
            system: "You are a careful student completing fill-in-the-blank exercises.".to_string(),
            user: compose_user_message(section, &task),
            max_tokens: 30,
            temperature: Some(0.1),
        }
    }

    fn finalize(&self, raw: &str, section: &Section) -> String {
        let answer = strip_decorations(strip_answer_prefix(first_line(raw))).to_string();
        // 词库里的写法优先
        match section.word_bank.as_deref().and_then(|bank| bank_match(&answer, bank)) {
            Some(word) => word.trim().to_string(),
            None => answer,
        }
    }

    fn self_validate(&self, answer: &str, section: &Section) -> ValidationResult {
        let words = word_count(answer);
        if words == 0 {
            return ValidationResult::rejected(0.0, "答案为空");
        }
        if RE_LEFTOVER_MARKER.is_match(answer) {
            return ValidationResult::rejected(0.1, "答案中仍有空白标记");
        }

        if let Some(bank) = section.word_bank.as_deref() {
            return match bank_match(answer, bank) {
                Some(_) => ValidationResult::passed(0.95).with_detail("in_word_bank", true),
                None => ValidationResult::rejected(0.4, format!("'{}' 不在词库中", answer))
                    .with_detail("in_word_bank", false),
            };
        }

        let confidence = match words {
            1..=5 => 0.85,
            6..=10 => 0.7,
            _ => 0.5,
        };
        ValidationResult::passed(confidence).with_detail("word_count", words)
    }
}
