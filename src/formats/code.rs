//! 源代码文件
//!
//! 整个文件是一个代码块，只有“未完成标记”所在的行是待填写位置；
//! 标记前的缩进作为文本保留，写回时用于重新缩进答案。

use phf::phf_map;

use crate::error::{PipelineError, PipelineResult};
use crate::formats::markers::is_code_stub;
use crate::formats::{DocumentParser, DocumentWriter};
use crate::models::{BlankKind, Block, Document, ParagraphStyle, Segment, TextRun};

/// 扩展名 → 语言名
pub static CODE_LANGUAGES: phf::Map<&'static str, &'static str> = phf_map! {
    "py" => "python",
    "js" => "javascript",
    "ts" => "typescript",
    "java" => "java",
    "c" => "c",
    "cpp" => "cpp",
    "cs" => "csharp",
    "go" => "go",
    "rs" => "rust",
    "rb" => "ruby",
    "php" => "php",
};

/// 行注释前缀
pub fn comment_prefix(language: &str) -> &'static str {
    match language {
        "python" | "ruby" => "#",
        _ => "//",
    }
}

pub struct CodeFormat;

impl DocumentParser for CodeFormat {
    fn parse(&self, bytes: &[u8], format: &str) -> PipelineResult<Document> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::parse_failed(format, format!("源文件不是合法的 UTF-8: {}", e)))?;
        let language = CODE_LANGUAGES.get(format).copied().unwrap_or("text");

        let lines = content
            .split('\n')
            .map(|line| {
                // CRLF 的 \r 不属于标记
                let (code, line_end) = match line.strip_suffix('\r') {
                    Some(code) => (code, "\r"),
                    None => (line, ""),
                };
                if is_code_stub(code) {
                    let body = code.trim_start();
                    let indent = &code[..code.len() - body.len()];
                    let mut segments = vec![Segment::text(indent), Segment::blank(body, BlankKind::CodeStub)];
                    if !line_end.is_empty() {
                        segments.push(Segment::text(line_end));
                    }
                    TextRun::new(segments)
                } else {
                    TextRun::plain(line)
                }
            })
            .collect();

        Ok(Document::new(
            format,
            vec![Block::Code {
                language: language.to_string(),
                lines,
            }],
        ))
    }
}

impl DocumentWriter for CodeFormat {
    fn write(&self, document: &Document) -> PipelineResult<Vec<u8>> {
        let mut language = "text";
        let mut out: Vec<String> = Vec::new();

        for block in &document.blocks {
            match block {
                Block::Code { language: lang, lines } => {
                    language = lang.as_str();
                    out.extend(lines.iter().map(TextRun::source_text));
                }
                Block::Paragraph {
                    content,
                    style: ParagraphStyle::Watermark,
                    ..
                } => {
                    let prefix = comment_prefix(language);
                    let line_end = if out.iter().any(|l| l.ends_with('\r')) { "\r" } else { "" };
                    if out.last().is_some_and(|l| l.is_empty()) {
                        out.pop();
                    }
                    out.push(format!("{} {}{}", prefix, content.source_text(), line_end));
                    out.push(String::new());
                }
                _ => {
                    return Err(PipelineError::write_back_failed(
                        &document.format,
                        "源代码文件只支持代码块",
                    ))
                }
            }
        }

        Ok(out.join("\n").into_bytes())
    }
}
