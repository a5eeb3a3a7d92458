//! 题型分类
//!
//! 固定顺序的级联规则，命中第一条即返回：
//! 1. 数学：运算式 + 求解类关键词
//! 2. 代码：语言结构关键词，或空白本身就是代码占位
//! 3. 表格公式：`=SUM(`、`A1:B3`、formula
//! 4. 选择题：至少两行以 `A)` / `A.` / `A:` 开头的选项
//! 5. 下划线 / 表格单元格 → 填空
//! 6. 长度超过 50 词或带有作文提示 → 长文本，否则简答

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BlankKind, ContentType};

/// 超过该词数的题目按长文本处理
pub const ESSAY_WORD_THRESHOLD: usize = 50;

static RE_MATH_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d\s*[-+*/^×÷=]\s*[\d(a-z]|\b[a-z]\s*[=^]\s*[-\d(]|\d[a-z]\b|\b(?:sqrt|sin|cos|tan|log)\s*\(")
        .expect("valid math expression regex")
});
static RE_MATH_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:solve|calculate|compute|evaluate|simplify|equations?|derivative|integral|factor(?:ise|ize)?)\b")
        .expect("valid math keyword regex")
});
static RE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?imx)
          \bdef\s+\w+\s*\(
        | \bfunction\s*\w*\s*\(
        | \bfn\s+\w+\s*[(<]
        | \bfunc\s+\w+\s*\(
        | \bclass\s+[A-Z]\w*
        | \#include\s*<
        | \bpublic\s+(?:static\s+)?[\w<>\[\]]+\s+\w+\s*\(
        | \b(?:for|while|if)\s*\(.*\)\s*\{
        | ^\s*(?:import|from)\s+[\w.]+
        | ```
        | \b(?:write|implement|complete)\s+(?:a|an|the)\s+(?:\w+\s+)?(?:function|method|program|script|class)\b
        ",
    )
    .expect("valid code keyword regex")
});
static RE_SPREADSHEET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)=\s*[A-Z]+\(|\b[A-Z]{1,3}\d+:[A-Z]{1,3}\d+\b|\bformula\b")
        .expect("valid spreadsheet regex")
});
static RE_OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Z])[).:]\s+(\S.*?)\s*$").expect("valid option regex"));
static RE_ESSAY_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bessay\b|\bwrite\b.{0,80}?\b\d+\s+words\b|\bparagraphs?\b")
        .expect("valid essay cue regex")
});

/// 按级联规则分类
pub fn classify(prompt: &str, blank_kind: BlankKind) -> ContentType {
    if RE_MATH_EXPR.is_match(prompt) && RE_MATH_KEYWORD.is_match(prompt) {
        return ContentType::Math;
    }
    if blank_kind == BlankKind::CodeStub || RE_CODE.is_match(prompt) {
        return ContentType::Code;
    }
    if RE_SPREADSHEET.is_match(prompt) {
        return ContentType::Spreadsheet;
    }
    if parse_options(prompt).len() >= 2 {
        return ContentType::MultipleChoice;
    }
    if matches!(blank_kind, BlankKind::Underline | BlankKind::TableCell) {
        return ContentType::FillInBlank;
    }
    if word_count(prompt) > ESSAY_WORD_THRESHOLD || RE_ESSAY_CUE.is_match(prompt) {
        return ContentType::Text;
    }
    ContentType::ShortAnswer
}

/// 解析选择题选项：`(字母, 选项文本)`
pub fn parse_options(prompt: &str) -> Vec<(char, String)> {
    prompt
        .lines()
        .filter_map(|line| {
            let caps = RE_OPTION_LINE.captures(line)?;
            let letter = caps.get(1)?.as_str().chars().next()?;
            Some((letter, caps.get(2)?.as_str().to_string()))
        })
        .collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
