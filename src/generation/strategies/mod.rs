//! 各题型的作答策略
//!
//! 每种 `ContentType` 对应一个策略，`Strategy` 是封闭枚举，
//! 新增题型时编译器会检查所有分派点。

pub mod code;
pub mod essay;
pub mod fill_in_blank;
pub mod math;
pub mod multiple_choice;
pub mod short_answer;
pub mod spreadsheet;

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ContentType, Section, ValidationResult};
use crate::services::Instruction;

pub use code::CodeStrategy;
pub use essay::EssayStrategy;
pub use fill_in_blank::FillInBlankStrategy;
pub use math::MathStrategy;
pub use multiple_choice::MultipleChoiceStrategy;
pub use short_answer::ShortAnswerStrategy;
pub use spreadsheet::SpreadsheetStrategy;

static RE_ANSWER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:final\s+)?answer\s*[:：]\s*").expect("valid answer prefix regex")
});

/// 单个题型的作答能力
pub trait AnswerStrategy {
    /// 构造生成请求
    fn build_prompt(&self, section: &Section) -> Instruction;

    /// 把模型原始输出整理成可写回的答案
    fn finalize(&self, raw: &str, section: &Section) -> String;

    /// 按题型规则自检，给出置信度
    fn self_validate(&self, answer: &str, section: &Section) -> ValidationResult;

    /// 对一次生成打分：`raw` 是模型原始输出，`answer` 是整理后要写回的文本
    ///
    /// 默认只看写回的文本；整理时会丢掉推导过程的题型可以改为按原始输出评分。
    fn assess(&self, _raw: &str, answer: &str, section: &Section) -> ValidationResult {
        self.self_validate(answer, section)
    }
}

/// 策略需要的可配置参数
#[derive(Debug, Clone, Copy)]
pub struct StrategySettings {
    /// 题目没有写明字数时的作文目标字数
    pub default_essay_words: usize,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            default_essay_words: 300,
        }
    }
}

/// 题型策略（封闭枚举）
#[derive(Debug, Clone)]
pub enum Strategy {
    ShortAnswer(ShortAnswerStrategy),
    Text(EssayStrategy),
    Math(MathStrategy),
    Code(CodeStrategy),
    Spreadsheet(SpreadsheetStrategy),
    MultipleChoice(MultipleChoiceStrategy),
    FillInBlank(FillInBlankStrategy),
}

impl Strategy {
    pub fn for_content_type(content_type: ContentType, settings: &StrategySettings) -> Self {
        match content_type {
            ContentType::ShortAnswer => Strategy::ShortAnswer(ShortAnswerStrategy),
            ContentType::Text => Strategy::Text(EssayStrategy {
                default_words: settings.default_essay_words,
            }),
            ContentType::Math => Strategy::Math(MathStrategy),
            ContentType::Code => Strategy::Code(CodeStrategy),
            ContentType::Spreadsheet => Strategy::Spreadsheet(SpreadsheetStrategy),
            ContentType::MultipleChoice => Strategy::MultipleChoice(MultipleChoiceStrategy),
            ContentType::FillInBlank => Strategy::FillInBlank(FillInBlankStrategy),
        }
    }

    fn inner(&self) -> &dyn AnswerStrategy {
        match self {
            Strategy::ShortAnswer(s) => s,
            Strategy::Text(s) => s,
            Strategy::Math(s) => s,
            Strategy::Code(s) => s,
            Strategy::Spreadsheet(s) => s,
            Strategy::MultipleChoice(s) => s,
            Strategy::FillInBlank(s) => s,
        }
    }
}

impl AnswerStrategy for Strategy {
    fn build_prompt(&self, section: &Section) -> Instruction {
        self.inner().build_prompt(section)
    }

    fn finalize(&self, raw: &str, section: &Section) -> String {
        self.inner().finalize(raw, section)
    }

    fn self_validate(&self, answer: &str, section: &Section) -> ValidationResult {
        self.inner().self_validate(answer, section)
    }

    fn assess(&self, raw: &str, answer: &str, section: &Section) -> ValidationResult {
        self.inner().assess(raw, answer, section)
    }
}

// ========== 共用辅助函数 ==========

/// 用户消息：上下文 + 题目 + 作答要求
pub(crate) fn compose_user_message(section: &Section, task: &str) -> String {
    let mut message = String::new();
    if !section.context.trim().is_empty() {
        message.push_str("Context:\n");
        message.push_str(section.context.trim());
        message.push_str("\n\n");
    }
    message.push_str("Question:\n");
    message.push_str(section.prompt_text.trim());
    message.push_str("\n\n");
    message.push_str(task);
    message
}

/// 去掉开头的 `Answer:` 前缀
pub(crate) fn strip_answer_prefix(text: &str) -> &str {
    match RE_ANSWER_PREFIX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// 第一行非空文本
pub(crate) fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default()
}

/// 去掉成对的引号和末尾句号
pub(crate) fn strip_decorations(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix(['"', '\'', '`', '“'])
        .and_then(|t| t.strip_suffix(['"', '\'', '`', '”']))
        .unwrap_or(text);
    text.trim_end_matches('.').trim()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::BlankKind;

    /// 构造测试题目
    pub(crate) fn section(content_type: ContentType, prompt: &str) -> Section {
        Section::new(0, content_type, prompt)
    }

    pub(crate) fn with_kind(mut section: Section, kind: BlankKind) -> Section {
        section.blank_kind = kind;
        section
    }

    #[test]
    fn test_every_content_type_has_a_strategy() {
        let settings = StrategySettings::default();
        for content_type in ContentType::ALL {
            let strategy = Strategy::for_content_type(content_type, &settings);
            let instruction = strategy.build_prompt(&section(content_type, "What is it?"));
            assert!(instruction.user.contains("What is it?"));
            assert!(instruction.max_tokens > 0);
        }
    }

    #[test]
    fn test_helpers() {
        assert_eq!(strip_answer_prefix("Answer: Paris"), "Paris");
        assert_eq!(strip_answer_prefix("Final answer: 4"), "4");
        assert_eq!(first_line("\n  Paris \nFrance"), "Paris");
        assert_eq!(strip_decorations("\"Paris.\""), "Paris");
        assert_eq!(strip_decorations("Paris."), "Paris");
    }
}
