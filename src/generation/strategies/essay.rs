//! 作文 / 长文本：引言、主体、结论，按目标字数校验

use std::sync::LazyLock;

use regex::Regex;

use super::{compose_user_message, AnswerStrategy};
use crate::extraction::word_count;
use crate::models::{Section, ValidationResult};
use crate::services::Instruction;

static RE_TARGET_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{2,5})\s*(?:-|to)?\s*(?:\d{2,5}\s*)?words?\b").expect("valid word target regex")
});
static RE_WANTS_CITATIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cite|citations?|references?|sources|bibliography|works\s+cited)\b")
        .expect("valid citation request regex")
});
static RE_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\([A-Z][A-Za-z&.\s]+,?\s+\d{4}[a-z]?\)|\[\d+\]|(?i)\breferences?\s*:|(?i)\bworks\s+cited\b")
        .expect("valid citation regex")
});

#[derive(Debug, Clone, Copy)]
pub struct EssayStrategy {
    /// 题目没有写明字数时的目标字数
    pub default_words: usize,
}

impl EssayStrategy {
    /// 目标字数：题目中写明的数字优先
    pub fn target_words(&self, section: &Section) -> usize {
        RE_TARGET_WORDS
            .captures(&section.prompt_text)
            .and_then(|caps| caps.get(1)?.as_str().parse().ok())
            .unwrap_or(self.default_words)
            .max(1)
    }
}

fn wants_citations(section: &Section) -> bool {
    RE_WANTS_CITATIONS.is_match(&section.prompt_text)
}

fn paragraph_count(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}

impl AnswerStrategy for EssayStrategy {
    fn build_prompt(&self, section: &Section) -> Instruction {
        let target = self.target_words(section);
        let mut task = format!(
            "Write a response of at least {} words with an introduction, body paragraphs and a conclusion. \
             Separate paragraphs with a blank line. Plain text only, no headings or markdown.",
            target
        );
        if wants_citations(section) {
            task.push_str(" Support the argument with in-text citations such as (Author, 2020) and end with a References list.");
        }
        Instruction {
            system: "You are an experienced academic writer. Write clear, well-organised prose in the student's voice."
                .to_string(),
            user: compose_user_message(section, &task),
            max_tokens: u32::try_from(target)
                .unwrap_or(u32::MAX)
                .saturating_mul(2)
                .saturating_add(200)
                .min(4000),
            temperature: None,
        }
    }

    fn finalize(&self, raw: &str, _section: &Section) -> String {
        raw.replace("\r\n", "\n")
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    fn self_validate(&self, answer: &str, section: &Section) -> ValidationResult {
        let target = self.target_words(section);
        let words = word_count(answer);
        let ratio = words as f64 / target as f64;
        let paragraphs = paragraph_count(answer);
        let wants = wants_citations(section);
        let has_citations = RE_CITATION.is_match(answer);

        let length_score = if ratio < 1.0 {
            ratio
        } else if ratio <= 1.5 {
            1.0
        } else {
            (2.5 - ratio).max(0.0)
        };
        let structure_score = paragraphs.min(3) as f64 / 3.0;
        let citation_score = match (wants, has_citations) {
            (false, _) | (true, true) => 1.0,
            (true, false) => 0.0,
        };
        let confidence = 0.5 * length_score + 0.3 * structure_score + 0.2 * citation_score;

        let result = if ratio >= 0.8 {
            ValidationResult::passed(confidence)
        } else {
            ValidationResult::rejected(
                confidence,
                format!("字数不足: {} / {}", words, target),
            )
        };
        result
            .with_detail("word_count", words)
            .with_detail("target_words", target)
            .with_detail("paragraphs", paragraphs)
            .with_detail("citations_requested", wants)
            .with_detail("citations_present", has_citations)
    }
}
