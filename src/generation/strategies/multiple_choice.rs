//! 选择题：只回答选项字母，写回时也只写字母

use std::sync::LazyLock;

use regex::Regex;

use super::{compose_user_message, strip_answer_prefix, strip_decorations, AnswerStrategy};
use crate::models::{Section, ValidationResult};
use crate::services::Instruction;

static RE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z])\b").expect("valid option letter regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct MultipleChoiceStrategy;

/// 把模型输出对应到选项字母
fn resolve_letter(raw: &str, section: &Section) -> Option<char> {
    let cleaned = strip_decorations(strip_answer_prefix(raw.trim()));
    let letters: Vec<char> = section.options.iter().map(|(letter, _)| *letter).collect();

    // 先找明确的字母
    let by_letter = RE_LETTER
        .captures_iter(cleaned)
        .filter_map(|caps| caps.get(1)?.as_str().chars().next())
        .find(|c| letters.contains(c));
    if by_letter.is_some() {
        return by_letter;
    }

    // 再按选项文本匹配
    let lowered = cleaned.to_lowercase();
    section
        .options
        .iter()
        .find(|(_, text)| {
            let text = text.trim().to_lowercase();
            !text.is_empty() && (lowered == text || lowered.contains(&text))
        })
        .map(|(letter, _)| *letter)
}

impl AnswerStrategy for MultipleChoiceStrategy {
    fn build_prompt(&self, section: &Section) -> Instruction {
        let options = section
            .options
            .iter()
            .map(|(letter, text)| format!("{}) {}", letter, text))
            .collect::<Vec<_>>()
            .join("\n");
        let task = format!(
            "Options:\n{}\n\nChoose the single best option. Reply with the option letter only.",
            options
        );
        Instruction {
            system: "You are a careful student answering multiple-choice questions.".to_string(),
            user: compose_user_message(section, &task),
            max_tokens: 10,
            temperature: Some(0.0),
        }
    }

    fn finalize(&self, raw: &str, section: &Section) -> String {
        match resolve_letter(raw, section) {
            Some(letter) => letter.to_string(),
            None => strip_decorations(raw).to_string(),
        }
    }

    fn self_validate(&self, answer: &str, section: &Section) -> ValidationResult {
        if section.options.is_empty() {
            return ValidationResult::rejected(0.3, "题目中没有解析出选项");
        }
        let answer = answer.trim();
        let exact = answer.len() == 1 && section.options.iter().any(|(l, _)| answer.starts_with(*l));
        match resolve_letter(answer, section) {
            Some(letter) => {
                // 模型只回了字母时最可信
                let confidence = if exact { 0.95 } else { 0.75 };
                ValidationResult::passed(confidence)
                    .with_detail("selected", letter.to_string())
                    .with_detail("options", section.options.len())
            }
            None => ValidationResult::rejected(0.1, format!("答案 '{}' 不是任何选项", answer)),
        }
    }
}
