//! 表格公式题：以 `=` 开头、括号配对的公式，或者一个数值

use std::sync::LazyLock;

use regex::Regex;

use super::{compose_user_message, first_line, AnswerStrategy};
use crate::models::{Section, ValidationResult};
use crate::services::Instruction;

static RE_FUNCTION_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][A-Z0-9.]*\(").expect("valid function call regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetStrategy;

fn parens_balanced(formula: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    for c in formula.chars() {
        match c {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !in_string
}

fn is_numeric_value(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%' | ' '))
        .collect();
    !cleaned.is_empty() && cleaned.parse::<f64>().is_ok()
}

impl AnswerStrategy for SpreadsheetStrategy {
    fn build_prompt(&self, section: &Section) -> Instruction {
        Instruction {
            system: "You are a spreadsheet expert familiar with Excel and Google Sheets formulas.".to_string(),
            user: compose_user_message(
                section,
                "Reply with a single spreadsheet formula starting with '=' (or a single value if no formula is needed). \
                 No explanation, no code fences.",
            ),
            max_tokens: 60,
            temperature: Some(0.0),
        }
    }

    fn finalize(&self, raw: &str, _section: &Section) -> String {
        let line = raw
            .lines()
            .map(|l| l.trim().trim_matches('`').trim())
            .find(|l| l.starts_with('='))
            .unwrap_or_else(|| first_line(raw).trim_matches('`').trim());
        line.to_string()
    }

    fn self_validate(&self, answer: &str, _section: &Section) -> ValidationResult {
        let answer = answer.trim();
        if answer.starts_with('=') {
            if !parens_balanced(answer) {
                return ValidationResult::rejected(0.3, "公式括号不匹配").with_detail("formula", true);
            }
            let uses_function = RE_FUNCTION_CALL.is_match(answer);
            let confidence = if uses_function { 0.9 } else { 0.8 };
            return ValidationResult::passed(confidence)
                .with_detail("formula", true)
                .with_detail("uses_function", uses_function);
        }
        if is_numeric_value(answer) {
            return ValidationResult::passed(0.7).with_detail("formula", false);
        }
        ValidationResult::rejected(0.2, "既不是公式也不是数值")
    }
}
