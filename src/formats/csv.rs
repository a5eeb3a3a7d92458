//! CSV 表格
//!
//! 整个文件解析为一个表格。左侧有标签的空单元格是待填写位置；
//! 单元格内的空白标记同样识别。

use csv::{ReaderBuilder, Terminator, WriterBuilder};

use crate::error::{PipelineError, PipelineResult};
use crate::formats::markers::split_blanks;
use crate::formats::{DocumentParser, DocumentWriter};
use crate::models::{BlankKind, Block, Cell, Document, ParagraphStyle, Segment, TextRun};

const LINE_ENDING: &str = "line_ending";

pub struct CsvFormat;

impl DocumentParser for CsvFormat {
    fn parse(&self, bytes: &[u8], format: &str) -> PipelineResult<Document> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| PipelineError::parse_failed(format, e))?;
            raw_rows.push(record.iter().map(str::to_string).collect());
        }

        let has_header = raw_rows.len() > 1;
        let rows = raw_rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, value)| {
                        let labeled = c > 0 && !row[c - 1].trim().is_empty();
                        let data_row = !has_header || r > 0;
                        let content = if value.trim().is_empty() && labeled && data_row {
                            TextRun::new(vec![Segment::blank(value.as_str(), BlankKind::TableCell)])
                        } else {
                            split_blanks(value)
                        };
                        Cell {
                            content,
                            ..Cell::default()
                        }
                    })
                    .collect()
            })
            .collect();

        let line_ending = if bytes.windows(2).any(|w| w == b"\r\n") {
            "\r\n"
        } else {
            "\n"
        };

        Ok(Document::new(format, vec![Block::Table { rows }]).with_attribute(LINE_ENDING, line_ending))
    }
}

impl DocumentWriter for CsvFormat {
    fn write(&self, document: &Document) -> PipelineResult<Vec<u8>> {
        let terminator = match document.attribute(LINE_ENDING) {
            Some("\r\n") => Terminator::CRLF,
            _ => Terminator::Any(b'\n'),
        };
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .terminator(terminator)
            .from_writer(Vec::new());

        let fail = |e: &dyn std::fmt::Display| PipelineError::write_back_failed(&document.format, e);

        for block in &document.blocks {
            match block {
                Block::Table { rows } => {
                    for row in rows {
                        let record: Vec<String> = row.iter().map(|c| c.content.source_text()).collect();
                        writer.write_record(&record).map_err(|e| fail(&e))?;
                    }
                }
                Block::Paragraph {
                    content,
                    style: ParagraphStyle::Watermark,
                    ..
                } => {
                    writer.write_record([content.source_text()]).map_err(|e| fail(&e))?;
                }
                _ => return Err(fail(&"CSV 只支持表格结构")),
            }
        }

        writer.into_inner().map_err(|e| fail(&e))
    }
}
