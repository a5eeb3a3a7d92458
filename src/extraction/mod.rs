//! 题目抽取层
//!
//! ## 职责
//!
//! - 按扩展名找到解析器，把原始字节转换成 `Document`
//! - 按文档顺序找出所有空白位置，每个空白生成一个 `Section`
//! - 为每个 `Section` 组装题干、上下文、词库和选项，并完成分类
//!
//! 抽取是纯函数：同样的字节总是得到同样的题目列表。

pub mod classifier;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::formats::{self, FormatRegistry};
use crate::models::{BlankKind, Block, Cell, ContentType, Document, LocationHandle, Section, Segment, TextRun};

pub use classifier::{classify, parse_options, word_count};

/// 上下文最大字符数
const CONTEXT_LIMIT: usize = 1200;
/// 单个相邻块在上下文中的最大字符数
const NEIGHBOUR_LIMIT: usize = 400;
/// 代码文件头部取多少行作为上下文
const CODE_HEAD_LINES: usize = 20;
/// 题干自身词数少于该值时拼接上一段
const MIN_OWN_WORDS: usize = 3;

static RE_WORD_BANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*word\s+bank\s*:\s*(.*)$").expect("valid word bank regex"));
static RE_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:pub(?:\(\w+\))?\s+)?(?:async\s+)?(?:def|fn|func|function|class|impl)\b|(?:public|private|protected|static)\b|[\w<>\[\]*&:]+\s+\w+\s*\([^;]*\)\s*\{?\s*$)",
    )
    .expect("valid definition regex")
});

/// 抽取结果
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: Document,
    pub sections: Vec<Section>,
}

/// 解析文档并抽取所有待填写的题目
pub fn extract(bytes: &[u8], format: &str, registry: &FormatRegistry) -> PipelineResult<Extraction> {
    let format = formats::normalize(format);
    let parser = registry
        .parser(&format)
        .ok_or_else(|| PipelineError::no_parser(&format))?;

    let document = parser.parse(bytes, &format)?;
    debug!("📄 解析完成: {} 个块 ({})", document.blocks.len(), format);

    let sections = discover_sections(&document);
    info!(
        "🔎 共发现 {} 道待填写题目 ({} 字节, 格式 {})",
        sections.len(),
        bytes.len(),
        format
    );

    Ok(Extraction { document, sections })
}

/// 按文档顺序遍历所有空白位置
pub fn discover_sections(document: &Document) -> Vec<Section> {
    let word_bank = find_word_bank(document);
    let mut sections = Vec::new();

    for (b, block) in document.blocks.iter().enumerate() {
        match block {
            Block::Paragraph { content, .. } => {
                let prompt = paragraph_prompt(document, b, content);
                let context = surrounding_context(document, b);
                for blank in blank_positions(content) {
                    sections.push(build_section(
                        sections.len(),
                        blank.label(&prompt),
                        context.clone(),
                        LocationHandle::paragraph(b, blank.segment),
                        blank.kind,
                        None,
                        &word_bank,
                    ));
                }
            }
            Block::Table { rows } => {
                let context = surrounding_context(document, b);
                for (r, row) in rows.iter().enumerate() {
                    for (c, cell) in row.iter().enumerate() {
                        let prompt = cell_prompt(rows, r, c);
                        for blank in blank_positions(&cell.content) {
                            sections.push(build_section(
                                sections.len(),
                                blank.label(&prompt),
                                context.clone(),
                                LocationHandle::cell(b, r, c, blank.segment),
                                blank.kind,
                                None,
                                &word_bank,
                            ));
                        }
                    }
                }
            }
            Block::Code { language, lines } => {
                let context = code_head(lines);
                for (l, line) in lines.iter().enumerate() {
                    for blank in blank_positions(line) {
                        sections.push(build_section(
                            sections.len(),
                            enclosing_definition(lines, l),
                            context.clone(),
                            LocationHandle::code_line(b, l, blank.segment),
                            blank.kind,
                            Some(language.as_str()),
                            &word_bank,
                        ));
                    }
                }
            }
        }
    }

    sections
}

fn build_section(
    index: usize,
    prompt_text: String,
    context: String,
    location: LocationHandle,
    blank_kind: BlankKind,
    language: Option<&str>,
    word_bank: &Option<Vec<String>>,
) -> Section {
    let content_type = classify(&prompt_text, blank_kind);
    let options = if content_type == ContentType::MultipleChoice {
        parse_options(&prompt_text)
    } else {
        Vec::new()
    };
    let word_bank = match content_type {
        ContentType::FillInBlank | ContentType::ShortAnswer => word_bank.clone(),
        _ => None,
    };

    debug!(
        "  题目 #{} -> {} ({:?}): {}",
        index,
        content_type,
        blank_kind,
        preview(&prompt_text, 60)
    );

    Section {
        index,
        content_type,
        prompt_text,
        context,
        word_bank,
        location,
        blank_kind,
        options,
        language: language.map(str::to_string),
    }
}

/// 叶子中的一个空白
struct BlankAt {
    segment: usize,
    kind: BlankKind,
    /// 第几个空白（从 1 开始）
    nth: usize,
    total: usize,
}

impl BlankAt {
    /// 同一叶子有多个空白时注明是第几个
    fn label(&self, prompt: &str) -> String {
        if self.total > 1 {
            format!("{}\n(Blank {} of {})", prompt, self.nth, self.total)
        } else {
            prompt.to_string()
        }
    }
}

fn blank_positions(run: &TextRun) -> Vec<BlankAt> {
    let blanks: Vec<(usize, BlankKind)> = run
        .segments
        .iter()
        .enumerate()
        .filter_map(|(i, s)| match s {
            Segment::Blank { kind, .. } => Some((i, *kind)),
            _ => None,
        })
        .collect();
    let total = blanks.len();
    blanks
        .into_iter()
        .enumerate()
        .map(|(n, (segment, kind))| BlankAt {
            segment,
            kind,
            nth: n + 1,
            total,
        })
        .collect()
}

// ========== 题干 ==========

fn paragraph_prompt(document: &Document, b: usize, content: &TextRun) -> String {
    let own = content.prompt_text().trim().to_string();
    if word_count(&content.own_text()) >= MIN_OWN_WORDS {
        return own;
    }
    match previous_paragraph(document, b) {
        Some(previous) => format!("{}\n{}", previous, own),
        None => own,
    }
}

/// 表格题干：行标签 + 列标题（以及单元格自身的文字）
fn cell_prompt(rows: &[Vec<Cell>], r: usize, c: usize) -> String {
    let text_of = |cell: Option<&Cell>| {
        cell.map(|cell| cell.content.prompt_text().trim().to_string())
            .unwrap_or_default()
    };
    let mut parts = Vec::new();
    if c > 0 {
        let label = text_of(rows[r].first());
        if !label.is_empty() {
            parts.push(format!("Row: {}", label));
        }
    }
    if r > 0 {
        let header = text_of(rows[0].get(c));
        if !header.is_empty() {
            parts.push(format!("Column: {}", header));
        }
    }
    let own = &rows[r][c].content;
    if !own.own_text().trim().is_empty() {
        parts.push(format!("Cell: {}", own.prompt_text().trim()));
    }
    parts.join("; ")
}

/// 代码题干：所在定义的签名和文档注释
fn enclosing_definition(lines: &[TextRun], l: usize) -> String {
    let indent_of = |run: &TextRun| {
        let text = run.source_text();
        text.len() - text.trim_start().len()
    };
    let stub_indent = indent_of(&lines[l]);

    let start = (0..l)
        .rev()
        .find(|&i| {
            let text = lines[i].source_text();
            !text.trim().is_empty() && indent_of(&lines[i]) < stub_indent && RE_DEFINITION.is_match(&text)
        })
        .unwrap_or_else(|| l.saturating_sub(5));

    let mut prompt: Vec<String> = lines[start..l]
        .iter()
        .map(|run| run.prompt_text())
        .collect();
    prompt.push(lines[l].prompt_text());
    prompt.join("\n").trim_matches('\n').to_string()
}

fn previous_paragraph(document: &Document, b: usize) -> Option<String> {
    document.blocks[..b].iter().rev().find_map(|block| match block {
        Block::Paragraph { content, .. } if !content.is_empty() => Some(content.prompt_text().trim().to_string()),
        _ => None,
    })
}

// ========== 上下文 ==========

/// 最近的标题 + 前后相邻块
fn surrounding_context(document: &Document, b: usize) -> String {
    let mut parts = Vec::new();

    let heading = document.blocks[..b]
        .iter()
        .rev()
        .find(|block| block.is_heading())
        .map(|block| block.prompt_text().trim().to_string());
    if let Some(heading) = &heading {
        parts.push(heading.clone());
    }

    let non_empty = |block: &&Block| !block.prompt_text().trim().is_empty();
    if let Some(previous) = document.blocks[..b].iter().rev().find(non_empty) {
        let text = previous.prompt_text().trim().to_string();
        if heading.as_deref() != Some(text.as_str()) {
            parts.push(truncate(&text, NEIGHBOUR_LIMIT));
        }
    }
    if let Some(next) = document.blocks.iter().skip(b + 1).find(non_empty) {
        parts.push(truncate(next.prompt_text().trim(), NEIGHBOUR_LIMIT));
    }

    truncate(&parts.join("\n\n"), CONTEXT_LIMIT)
}

fn code_head(lines: &[TextRun]) -> String {
    let head: Vec<String> = lines
        .iter()
        .take(CODE_HEAD_LINES)
        .map(|run| run.prompt_text())
        .collect();
    truncate(head.join("\n").trim_end(), CONTEXT_LIMIT)
}

/// 词库：以 `Word bank:` 开头的段落，逗号或分号分隔
fn find_word_bank(document: &Document) -> Option<Vec<String>> {
    document.blocks.iter().find_map(|block| {
        let Block::Paragraph { content, .. } = block else {
            return None;
        };
        let text = content.own_text();
        let caps = RE_WORD_BANK.captures(text.trim())?;
        let words: Vec<String> = caps
            .get(1)?
            .as_str()
            .split([',', ';'])
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        (!words.is_empty()).then_some(words)
    })
}

// ========== 辅助函数 ==========

/// 按字符截断
fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn preview(text: &str, limit: usize) -> String {
    truncate(&text.replace('\n', " "), limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ: &str = "# Geography\n\nWord bank: Paris, Rome; Madrid\n\nThe capital of France is _____.\nThe capital of Italy is _____.\n\nWhich ocean is largest?\nA) Atlantic\nB) Pacific\nAnswer: ____\n\nExplain why rivers flood.\n\nAnswer:\n";

    #[test]
    fn test_extract_text_quiz() {
        let registry = FormatRegistry::with_defaults();
        let extraction = extract(QUIZ.as_bytes(), "MD", &registry).unwrap();
        let sections = &extraction.sections;

        assert_eq!(sections.len(), 4);
        assert_eq!(
            sections.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(sections[0].content_type, ContentType::FillInBlank);
        assert_eq!(sections[1].content_type, ContentType::FillInBlank);
        assert!(sections[0].prompt_text.contains("(Blank 1 of 2)"));
        assert_eq!(
            sections[0].word_bank.as_deref(),
            Some(&["Paris".to_string(), "Rome".to_string(), "Madrid".to_string()][..])
        );
        assert!(sections[0].context.starts_with("# Geography"));

        assert_eq!(sections[2].content_type, ContentType::MultipleChoice);
        assert_eq!(sections[2].options.len(), 2);
        assert!(sections[2].word_bank.is_none());

        // 只有 "Answer:" 的段落会拼接上一段作为题干
        assert_eq!(sections[3].content_type, ContentType::ShortAnswer);
        assert!(sections[3].prompt_text.starts_with("Explain why rivers flood."));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let registry = FormatRegistry::with_defaults();
        let first = extract(QUIZ.as_bytes(), "md", &registry).unwrap();
        let second = extract(QUIZ.as_bytes(), "md", &registry).unwrap();
        assert_eq!(first.sections, second.sections);
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let registry = FormatRegistry::with_defaults();
        let err = extract(b"%PDF-1.4", "pdf", &registry).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
        assert!(err.is_parsing());
    }

    #[test]
    fn test_code_stub_prompt_is_enclosing_definition() {
        let source = "import math\n\n\ndef area(r):\n    \"\"\"Area of a circle.\"\"\"\n    # TODO: implement\n";
        let registry = FormatRegistry::with_defaults();
        let extraction = extract(source.as_bytes(), "py", &registry).unwrap();
        assert_eq!(extraction.sections.len(), 1);

        let section = &extraction.sections[0];
        assert_eq!(section.content_type, ContentType::Code);
        assert!(section.prompt_text.starts_with("def area(r):"));
        assert!(section.context.starts_with("import math"));
        assert_eq!(section.location, LocationHandle::code_line(0, 5, 1));
    }

    #[test]
    fn test_table_cell_prompt() {
        let registry = FormatRegistry::with_defaults();
        let extraction = extract(b"Term,Meaning\nOsmosis,\n", "csv", &registry).unwrap();
        assert_eq!(extraction.sections.len(), 1);
        assert_eq!(
            extraction.sections[0].prompt_text,
            "Row: Osmosis; Column: Meaning"
        );
        assert_eq!(extraction.sections[0].content_type, ContentType::FillInBlank);
    }
}
