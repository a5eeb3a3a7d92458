//! 纯文本 / Markdown
//!
//! 连续的非空行组成一个段落，每个空行单独成为一个空段落，
//! 写回时用 `\n` 重新拼接，可以逐字节还原未修改的内容。

use crate::error::{PipelineError, PipelineResult};
use crate::formats::markers::split_blanks;
use crate::formats::{DocumentParser, DocumentWriter};
use crate::models::{Block, Document, ParagraphStyle, Segment, TextRun};

pub struct PlainTextFormat;

impl DocumentParser for PlainTextFormat {
    fn parse(&self, bytes: &[u8], format: &str) -> PipelineResult<Document> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::parse_failed(format, format!("不是合法的 UTF-8 文本: {}", e)))?;

        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in content.split('\n') {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    blocks.push(paragraph_from_lines(&current));
                    current.clear();
                }
                blocks.push(Block::paragraph(TextRun::plain(line)));
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            blocks.push(paragraph_from_lines(&current));
        }

        Ok(Document::new(format, blocks))
    }
}

fn paragraph_from_lines(lines: &[&str]) -> Block {
    let mut segments = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            segments.push(Segment::text("\n"));
        }
        segments.extend(split_blanks(line).segments);
    }

    let style = if lines.len() == 1 && lines[0].trim_start().starts_with('#') {
        ParagraphStyle::Heading
    } else {
        ParagraphStyle::Body
    };

    Block::Paragraph {
        content: TextRun::new(segments),
        style,
        anchor: None,
    }
}

impl DocumentWriter for PlainTextFormat {
    fn write(&self, document: &Document) -> PipelineResult<Vec<u8>> {
        let mut parts = Vec::with_capacity(document.blocks.len());
        for block in &document.blocks {
            match block {
                Block::Paragraph {
                    content,
                    style: ParagraphStyle::Watermark,
                    ..
                } => parts.push(format!("\n---\n{}\n", content.source_text())),
                Block::Paragraph { content, .. } => parts.push(content.source_text()),
                _ => {
                    return Err(PipelineError::write_back_failed(
                        &document.format,
                        "纯文本不支持表格或代码块",
                    ))
                }
            }
        }
        Ok(parts.join("\n").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_is_byte_identical() {
        let source = "# Quiz\n\n1. The sky is ____.\r\n2. Grass is ___.\n\n\nAnswer:\n";
        let doc = PlainTextFormat.parse(source.as_bytes(), "md").unwrap();
        let out = PlainTextFormat.write(&doc).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), source);
        assert!(doc.blocks[0].is_heading());
        assert_eq!(doc.remaining_blanks(), 3);
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let err = PlainTextFormat.parse(&[0xff, 0xfe, 0x00], "txt").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }
}
