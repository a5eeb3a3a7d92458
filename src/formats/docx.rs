//! DOCX (Office Open XML)
//!
//! 解析：读取 `word/document.xml`，按出现顺序给每个 `w:p` 编号（锚点），
//! 正文段落和表格单元格分别映射为 `Block::Paragraph` / `Block::Table`。
//!
//! 写回：重新流式读取原始 XML，含有答案的段落逐个事件原样输出，只改写
//! 空白标记所在的 `w:t` 文本，run 格式、图片、超链接都保留；
//! 压缩包里的其他条目按原始字节复制。
//!
//! 图片、文本框等嵌入对象（`w:drawing` / `w:pict` / `mc:AlternateContent`）
//! 中的段落不参与编号，解析和写回使用同样的规则。

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{PipelineError, PipelineResult};
use crate::formats::markers::split_blanks;
use crate::formats::{DocumentParser, DocumentWriter};
use crate::models::{BlankKind, Block, Cell, Document, ParagraphStyle, Segment, TextRun};

const DOCUMENT_XML: &str = "word/document.xml";

pub struct DocxFormat;

// ========== 解析 ==========

/// 解析过程中的表格状态
#[derive(Default)]
struct TableState {
    rows: Vec<Vec<Cell>>,
    /// 当前单元格中各段落的 (锚点, 文本)
    cell_paragraphs: Vec<(usize, String)>,
    in_cell: bool,
}

impl DocumentParser for DocxFormat {
    fn parse(&self, bytes: &[u8], format: &str) -> PipelineResult<Document> {
        let xml = read_document_xml(bytes).map_err(|e| PipelineError::parse_failed(format, e))?;

        let mut reader = Reader::from_str(&xml);
        let mut blocks = Vec::new();
        let mut ordinal = 0usize;
        // 当前段落：(锚点, 文本, 是否标题)
        let mut paragraph: Option<(usize, String, bool)> = None;
        let mut in_text = false;
        let mut run_depth = 0usize;
        let mut embedded = 0usize;
        let mut table_depth = 0usize;
        let mut table = TableState::default();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| PipelineError::parse_failed(format, e))?;
            if matches!(event, Event::Eof) {
                break;
            }
            if embedded_step(&event, &mut embedded) {
                continue;
            }
            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:r" => run_depth += 1,
                    b"w:p" => {
                        paragraph = Some((ordinal, String::new(), false));
                        ordinal += 1;
                    }
                    b"w:t" => in_text = true,
                    b"w:tbl" => {
                        table_depth += 1;
                        if table_depth == 1 {
                            table = TableState::default();
                        }
                    }
                    b"w:tr" if table_depth == 1 => table.rows.push(Vec::new()),
                    b"w:tc" if table_depth == 1 => {
                        table.in_cell = true;
                        table.cell_paragraphs.clear();
                    }
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:p" => {
                        let p = (ordinal, String::new(), false);
                        ordinal += 1;
                        finish_paragraph(p, table_depth, &mut table, &mut blocks);
                    }
                    b"w:tab" if run_depth > 0 => push_text(&mut paragraph, "\t"),
                    b"w:br" | b"w:cr" if run_depth > 0 => push_text(&mut paragraph, "\n"),
                    b"w:pStyle" => {
                        let heading = e.attributes().flatten().any(|a| {
                            a.key.as_ref() == b"w:val" && {
                                let val = String::from_utf8_lossy(&a.value).to_ascii_lowercase();
                                val.starts_with("heading") || val == "title"
                            }
                        });
                        if let Some(p) = paragraph.as_mut() {
                            p.2 |= heading;
                        }
                    }
                    _ => {}
                },
                Event::Text(t) if in_text => {
                    let text = t.unescape().map_err(|e| PipelineError::parse_failed(format, e))?;
                    push_text(&mut paragraph, &text);
                }
                Event::End(e) => match e.name().as_ref() {
                    b"w:r" => run_depth = run_depth.saturating_sub(1),
                    b"w:t" => in_text = false,
                    b"w:p" => {
                        if let Some(p) = paragraph.take() {
                            finish_paragraph(p, table_depth, &mut table, &mut blocks);
                        }
                    }
                    b"w:tc" if table_depth == 1 => {
                        let cell = cell_from_paragraphs(&table.cell_paragraphs);
                        if let Some(row) = table.rows.last_mut() {
                            row.push(cell);
                        }
                        table.in_cell = false;
                    }
                    b"w:tbl" => {
                        if table_depth == 1 {
                            let rows = std::mem::take(&mut table.rows);
                            blocks.push(Block::Table {
                                rows: mark_labeled_cells(rows),
                            });
                        }
                        table_depth = table_depth.saturating_sub(1);
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        Ok(Document::new(format, blocks).with_container(bytes.to_vec()))
    }
}

/// 嵌入对象：其中的段落和文字不属于正文
const EMBEDDED: [&[u8]; 4] = [b"w:drawing", b"w:pict", b"w:object", b"mc:AlternateContent"];

/// 更新嵌入对象深度，返回该事件是否属于嵌入对象
fn embedded_step(event: &Event, depth: &mut usize) -> bool {
    let is_embedded = |name: &[u8]| EMBEDDED.contains(&name);
    match event {
        Event::Start(e) if is_embedded(e.name().as_ref()) => {
            *depth += 1;
            true
        }
        Event::End(e) if *depth > 0 && is_embedded(e.name().as_ref()) => {
            *depth -= 1;
            true
        }
        Event::Empty(e) if is_embedded(e.name().as_ref()) => true,
        _ => *depth > 0,
    }
}

fn push_text(paragraph: &mut Option<(usize, String, bool)>, text: &str) {
    if let Some(p) = paragraph.as_mut() {
        p.1.push_str(text);
    }
}

fn finish_paragraph(
    (anchor, text, heading): (usize, String, bool),
    table_depth: usize,
    table: &mut TableState,
    blocks: &mut Vec<Block>,
) {
    if table_depth > 0 {
        if table.in_cell {
            table.cell_paragraphs.push((anchor, text));
        }
        return;
    }
    blocks.push(Block::Paragraph {
        content: split_lines(&text),
        style: if heading {
            ParagraphStyle::Heading
        } else {
            ParagraphStyle::Body
        },
        anchor: Some(anchor),
    });
}

fn split_lines(text: &str) -> TextRun {
    let mut segments = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            segments.push(Segment::text("\n"));
        }
        segments.extend(split_blanks(line).segments);
    }
    TextRun::new(segments)
}

fn cell_from_paragraphs(paragraphs: &[(usize, String)]) -> Cell {
    let text = paragraphs
        .iter()
        .map(|(_, t)| t.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Cell {
        content: split_lines(&text),
        anchor: paragraphs.first().map(|(a, _)| *a),
        span: paragraphs.len(),
    }
}

/// 左侧有标签的空单元格标记为待填写（表头行除外）
fn mark_labeled_cells(mut rows: Vec<Vec<Cell>>) -> Vec<Vec<Cell>> {
    let has_header = rows.len() > 1;
    for r in 0..rows.len() {
        if has_header && r == 0 {
            continue;
        }
        for c in 1..rows[r].len() {
            let labeled = !rows[r][c - 1].content.is_empty();
            let cell = &mut rows[r][c];
            if labeled && cell.content.is_empty() && cell.anchor.is_some() {
                cell.content = TextRun::new(vec![Segment::blank("", BlankKind::TableCell)]);
            }
        }
    }
    rows
}

fn read_document_xml(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("不是合法的 DOCX 压缩包: {}", e))?;
    let mut file = archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| format!("缺少 {}: {}", DOCUMENT_XML, e))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| format!("读取 {} 失败: {}", DOCUMENT_XML, e))?;
    Ok(xml)
}

// ========== 写回 ==========

/// 一处答案在叶子原文中的位置
struct Fill {
    start: usize,
    /// 原标记长度（字节）
    len: usize,
    text: String,
    placed: bool,
}

/// 一个含有答案的文本叶子（段落或单元格）
struct LeafEdit {
    fills: Vec<Fill>,
    /// 已经走过的原文字节数；单元格内的段落之间按一个 `\n` 计
    cursor: usize,
}

impl LeafEdit {
    fn from_run(run: &TextRun) -> Option<Self> {
        let mut offset = 0;
        let mut fills = Vec::new();
        for segment in &run.segments {
            match segment {
                Segment::Text(t) => offset += t.len(),
                Segment::Blank { marker, .. } => offset += marker.len(),
                Segment::Filled { text, marker } => {
                    fills.push(Fill {
                        start: offset,
                        len: marker.len(),
                        text: text.clone(),
                        placed: false,
                    });
                    offset += marker.len();
                }
            }
        }
        (!fills.is_empty()).then_some(Self { fills, cursor: 0 })
    }

    /// 改写从 `cursor` 开始的一段原文；返回 `None` 表示这段文本不变
    ///
    /// 答案放在标记起点所在的文本里，跨 run 的标记其余部分直接删除。
    /// 零长度标记（`Answer:` 标签、空单元格）放在第一个覆盖该位置的文本末尾。
    fn splice(&mut self, chunk: &str) -> Option<String> {
        let (a, b) = (self.cursor, self.cursor + chunk.len());
        self.cursor = b;

        let mut edits: Vec<(usize, usize, Option<String>)> = Vec::new();
        for fill in &mut self.fills {
            let end = fill.start + fill.len;
            let insert = !fill.placed
                && fill.start >= a
                && (fill.start < b || (fill.len == 0 && fill.start == b));
            let (from, to) = (fill.start.max(a), end.min(b));
            if !insert && from >= to {
                continue;
            }
            fill.placed |= insert;
            edits.push((from - a, to.max(from) - a, insert.then(|| fill.text.clone())));
        }
        if edits.is_empty() {
            return None;
        }

        edits.sort_by_key(|(from, _, _)| *from);
        let mut out = String::with_capacity(chunk.len());
        let mut pos = 0;
        for (from, to, insert) in edits {
            let from = from.max(pos);
            out.push_str(&chunk[pos..from]);
            if let Some(text) = insert {
                out.push_str(&text);
            }
            pos = to.max(from);
        }
        out.push_str(&chunk[pos..]);
        Some(out)
    }

    /// 段落结束：取出落在本段范围内、还没有放下的答案
    fn finish_paragraph(&mut self) -> String {
        let end = self.cursor;
        self.cursor += 1;
        self.fills
            .iter_mut()
            .filter(|f| !f.placed && f.start <= end)
            .map(|f| {
                f.placed = true;
                f.text.clone()
            })
            .collect()
    }
}

/// 写回计划
struct Rewrites {
    leaves: Vec<LeafEdit>,
    /// 段落锚点 → 所属叶子
    by_anchor: HashMap<usize, usize>,
    /// 水印文本
    watermark: Option<String>,
}

impl Rewrites {
    fn collect(document: &Document) -> Self {
        let mut leaves = Vec::new();
        let mut by_anchor = HashMap::new();
        let mut watermark = None;

        for block in &document.blocks {
            match block {
                Block::Paragraph {
                    content,
                    style: ParagraphStyle::Watermark,
                    ..
                } => watermark = Some(content.source_text()),
                Block::Paragraph {
                    content,
                    anchor: Some(anchor),
                    ..
                } => {
                    if let Some(leaf) = LeafEdit::from_run(content) {
                        by_anchor.insert(*anchor, leaves.len());
                        leaves.push(leaf);
                    }
                }
                Block::Table { rows } => {
                    for cell in rows.iter().flatten() {
                        let (Some(anchor), Some(leaf)) = (cell.anchor, LeafEdit::from_run(&cell.content)) else {
                            continue;
                        };
                        for paragraph in anchor..anchor + cell.span.max(1) {
                            by_anchor.insert(paragraph, leaves.len());
                        }
                        leaves.push(leaf);
                    }
                }
                _ => {}
            }
        }

        Self {
            leaves,
            by_anchor,
            watermark,
        }
    }
}

impl DocumentWriter for DocxFormat {
    fn write(&self, document: &Document) -> PipelineResult<Vec<u8>> {
        let fail = |e: &dyn std::fmt::Display| PipelineError::write_back_failed(&document.format, e);

        let container = document
            .container
            .as_deref()
            .ok_or_else(|| fail(&"文档缺少原始 DOCX 容器"))?;
        let xml = read_document_xml(container).map_err(|e| fail(&e))?;
        let mut rewrites = Rewrites::collect(document);
        let new_xml = rewrite_document_xml(&xml, &mut rewrites).map_err(|e| fail(&e))?;

        let mut archive = ZipArchive::new(Cursor::new(container)).map_err(|e| fail(&e))?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(|e| fail(&e))?;
            if file.name() == DOCUMENT_XML {
                drop(file);
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                zip.start_file(DOCUMENT_XML, options).map_err(|e| fail(&e))?;
                zip.write_all(&new_xml).map_err(|e| fail(&e))?;
            } else {
                zip.raw_copy_file(file).map_err(|e| fail(&e))?;
            }
        }

        let cursor = zip.finish().map_err(|e| fail(&e))?;
        Ok(cursor.into_inner())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Start,
    Empty,
    End,
    Other,
}

fn kind_of(event: &Event) -> (Kind, Vec<u8>) {
    match event {
        Event::Start(e) => (Kind::Start, e.name().as_ref().to_vec()),
        Event::Empty(e) => (Kind::Empty, e.name().as_ref().to_vec()),
        Event::End(e) => (Kind::End, e.name().as_ref().to_vec()),
        _ => (Kind::Other, Vec::new()),
    }
}

fn track_depth(event: &Event, depth: &mut usize) {
    match event {
        Event::Start(_) => *depth += 1,
        Event::End(_) => *depth = depth.saturating_sub(1),
        _ => {}
    }
}

fn rewrite_document_xml(xml: &str, rewrites: &mut Rewrites) -> Result<Vec<u8>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut ordinal = 0usize;
    let mut depth = 0usize;
    let mut embedded = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut watermark_written = rewrites.watermark.is_none();
    // 正在缓存的段落：(叶子, 事件, 嵌入对象深度)
    let mut pending: Option<(usize, Vec<Event>, usize)> = None;

    loop {
        let event = reader.read_event()?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some((_, buffer, nested)) = pending.as_mut() {
            let inside = embedded_step(&event, nested);
            let closes = !inside && matches!(&event, Event::End(e) if e.name().as_ref() == b"w:p");
            track_depth(&event, &mut depth);
            buffer.push(event);
            if closes {
                if let Some((leaf, buffer, _)) = pending.take() {
                    rewrite_paragraph(&mut writer, buffer, &mut rewrites.leaves[leaf])?;
                }
            }
            continue;
        }

        if embedded_step(&event, &mut embedded) {
            track_depth(&event, &mut depth);
            writer.write_event(event)?;
            continue;
        }

        let (kind, name) = kind_of(&event);
        let at_body_level = body_depth == Some(depth);

        match (kind, name.as_slice()) {
            (Kind::Start | Kind::Empty, b"w:p") => {
                let anchor = ordinal;
                ordinal += 1;
                let opens = kind == Kind::Start;
                if opens {
                    depth += 1;
                }
                if let Some(&leaf) = rewrites.by_anchor.get(&anchor) {
                    if opens {
                        pending = Some((leaf, vec![event], 0));
                    } else {
                        rewrite_paragraph(&mut writer, vec![event], &mut rewrites.leaves[leaf])?;
                    }
                    continue;
                }
            }
            (Kind::Start | Kind::Empty, b"w:sectPr") if at_body_level && !watermark_written => {
                write_watermark(&mut writer, rewrites)?;
                watermark_written = true;
                if kind == Kind::Start {
                    depth += 1;
                }
            }
            (Kind::Start, element) => {
                depth += 1;
                if element == b"w:body" {
                    body_depth = Some(depth);
                }
            }
            (Kind::End, element) => {
                if element == b"w:body" && !watermark_written {
                    write_watermark(&mut writer, rewrites)?;
                    watermark_written = true;
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }

        writer.write_event(event)?;
    }

    Ok(writer.into_inner())
}

/// 输出含有答案的段落：除了标记所在的文本，其余事件原样写出
fn rewrite_paragraph(
    writer: &mut Writer<Vec<u8>>,
    buffer: Vec<Event>,
    leaf: &mut LeafEdit,
) -> Result<(), quick_xml::Error> {
    // 没有文本可以承载答案时，新 run 沿用段落里第一个 rPr
    let run_properties = capture_element(&buffer, b"w:rPr");
    let mut embedded = 0usize;
    let mut run_depth = 0usize;
    let mut events = buffer.into_iter().peekable();

    while let Some(event) = events.next() {
        if embedded_step(&event, &mut embedded) {
            writer.write_event(event)?;
            continue;
        }

        let (kind, name) = kind_of(&event);
        match (kind, name.as_slice()) {
            (Kind::Empty, b"w:p") => {
                // 空段落（例如空单元格）展开后补一个 run
                let rest = leaf.finish_paragraph();
                if rest.is_empty() {
                    writer.write_event(event)?;
                } else if let Event::Empty(start) = event {
                    writer.write_event(Event::Start(start))?;
                    write_run(writer, &run_properties, &rest)?;
                    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
                }
                continue;
            }
            (Kind::Start, b"w:r") => run_depth += 1,
            (Kind::End, b"w:r") => run_depth = run_depth.saturating_sub(1),
            (Kind::Empty, b"w:tab" | b"w:br" | b"w:cr") if run_depth > 0 => leaf.cursor += 1,
            (Kind::Start, b"w:t") => {
                let original = match events.peek() {
                    Some(Event::Text(t)) => Some(t.unescape()?.into_owned()),
                    _ => None,
                };
                if let Some(text) = leaf.splice(original.as_deref().unwrap_or_default()) {
                    if original.is_some() {
                        events.next();
                    }
                    if let Event::Start(start) = event {
                        write_text(writer, start, &text)?;
                    }
                    continue;
                }
            }
            (Kind::End, b"w:p") => {
                let rest = leaf.finish_paragraph();
                if !rest.is_empty() {
                    write_run(writer, &run_properties, &rest)?;
                }
            }
            _ => {}
        }
        writer.write_event(event)?;
    }
    Ok(())
}

/// 写出改写后的 `w:t`，换行转为 `w:br`；原来的 `</w:t>` 由调用方照常输出
fn write_text(writer: &mut Writer<Vec<u8>>, start: BytesStart, text: &str) -> Result<(), quick_xml::Error> {
    let mut start = start.into_owned();
    if !start
        .attributes()
        .flatten()
        .any(|a| a.key.as_ref() == b"xml:space")
    {
        start.push_attribute(("xml:space", "preserve"));
    }

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            writer.write_event(Event::End(BytesEnd::new("w:t")))?;
            writer.write_event(Event::Empty(BytesStart::new("w:br")))?;
        }
        writer.write_event(Event::Start(start.clone()))?;
        writer.write_event(Event::Text(BytesText::new(line)))?;
    }
    Ok(())
}

/// 取出缓存中第一个指定元素（含子元素）的事件
fn capture_element<'a>(buffer: &[Event<'a>], name: &[u8]) -> Vec<Event<'a>> {
    let mut captured = Vec::new();
    let mut depth = 0usize;
    for event in buffer {
        match event {
            Event::Empty(e) if depth == 0 && e.name().as_ref() == name => {
                return vec![event.clone()];
            }
            Event::Start(e) if depth == 0 && e.name().as_ref() == name => {
                depth = 1;
                captured.push(event.clone());
            }
            _ if depth > 0 => {
                captured.push(event.clone());
                match event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => {
                        depth -= 1;
                        if depth == 0 {
                            return captured;
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    captured
}

fn write_run(
    writer: &mut Writer<Vec<u8>>,
    run_properties: &[Event],
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    for event in run_properties {
        writer.write_event(event.clone())?;
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            writer.write_event(Event::Empty(BytesStart::new("w:br")))?;
        }
        writer.write_event(Event::Start(
            BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
        ))?;
        writer.write_event(Event::Text(BytesText::new(line)))?;
        writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    Ok(())
}

fn write_watermark(writer: &mut Writer<Vec<u8>>, rewrites: &Rewrites) -> Result<(), quick_xml::Error> {
    let Some(text) = rewrites.watermark.as_deref() else {
        return Ok(());
    };
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    let run_properties = vec![
        Event::Start(BytesStart::new("w:rPr")),
        Event::Empty(BytesStart::new("w:i")),
        Event::Empty(BytesStart::new("w:color").with_attributes([("w:val", "808080")])),
        Event::End(BytesEnd::new("w:rPr")),
    ];
    write_run(writer, &run_properties, text)?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 构造一个最小的 DOCX
    pub(crate) fn build_docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#,
            body
        );
        let options = || SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("[Content_Types].xml", options()).unwrap();
        zip.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
        zip.start_file(DOCUMENT_XML, options()).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn body() -> &'static str {
        concat!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Quiz</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Red and </w:t></w:r><w:r><w:t>_____</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Term</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Meaning</w:t></w:r></w:p></w:tc></w:tr>"#,
            r#"<w:tr><w:tc><w:p><w:r><w:t>Photosynthesis</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr></w:tbl>"#,
        )
    }

    #[test]
    fn test_parse_paragraphs_and_table() {
        let doc = DocxFormat.parse(&build_docx(body()), "docx").unwrap();
        assert_eq!(doc.blocks.len(), 3);
        assert!(doc.blocks[0].is_heading());
        assert_eq!(doc.remaining_blanks(), 2);
        match &doc.blocks[2] {
            Block::Table { rows } => {
                assert_eq!(rows.len(), 2);
                assert!(rows[1][1].content.segments[0].is_blank());
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_write_replaces_only_filled_paragraphs() {
        let mut doc = DocxFormat.parse(&build_docx(body()), "docx").unwrap();
        if let Block::Paragraph { content, .. } = &mut doc.blocks[1] {
            content.segments[1] = Segment::Filled {
                text: "blue".to_string(),
                marker: "_____".to_string(),
            };
        }
        doc.blocks.push(Block::Paragraph {
            content: TextRun::plain("watermark"),
            style: ParagraphStyle::Watermark,
            anchor: None,
        });

        let out = DocxFormat.write(&doc).unwrap();
        let xml = read_document_xml(&out).unwrap();
        assert!(xml.contains(r#"<w:b/></w:rPr><w:t xml:space="preserve">Red and </w:t>"#));
        assert!(xml.contains(r#"<w:t xml:space="preserve">blue</w:t>"#));
        assert!(!xml.contains("_____"));
        assert!(xml.contains("<w:t>Quiz</w:t>"));
        // 水印在 sectPr 之前
        let wm = xml.find("watermark").unwrap();
        assert!(wm < xml.find("<w:sectPr>").unwrap());

        let reparsed = DocxFormat.parse(&out, "docx").unwrap();
        assert_eq!(reparsed.remaining_blanks(), 1);
    }

    /// 把第一个空白替换为答案
    fn fill_first_blank(run: &mut TextRun, answer: &str) {
        let index = run.segments.iter().position(Segment::is_blank).unwrap();
        let marker = match &run.segments[index] {
            Segment::Blank { marker, .. } => marker.clone(),
            other => panic!("unexpected segment {:?}", other),
        };
        run.segments[index] = Segment::Filled {
            text: answer.to_string(),
            marker,
        };
    }

    #[test]
    fn test_write_keeps_runs_and_drawings() {
        let body = concat!(
            // 文本框里的段落不参与编号
            r#"<w:p><w:r><w:drawing><wp:anchor><wps:txbx><w:txbxContent><w:p><w:r><w:t>caption</w:t></w:r></w:p></w:txbxContent></wps:txbx></wp:anchor></w:drawing></w:r><w:r><w:t>Figure 1</w:t></w:r></w:p>"#,
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>"#,
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Red and </w:t></w:r>"#,
            r#"<w:r><w:rPr><w:i/></w:rPr><w:t>___</w:t></w:r>"#,
            r#"<w:r><w:rPr><w:i/></w:rPr><w:t>__ shine</w:t></w:r>"#,
            r#"<w:r><w:drawing><wp:inline><wp:docPr id="2" name="Picture 2"/></wp:inline></w:drawing></w:r></w:p>"#,
        );
        let mut doc = DocxFormat.parse(&build_docx(body), "docx").unwrap();
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[0].prompt_text(), "Figure 1");
        match &mut doc.blocks[1] {
            Block::Paragraph { content, .. } => {
                assert_eq!(content.source_text(), "Red and _____ shine");
                fill_first_blank(content, "blue");
            }
            other => panic!("unexpected block {:?}", other),
        }

        let out = DocxFormat.write(&doc).unwrap();
        let xml = read_document_xml(&out).unwrap();
        assert!(xml.contains(r#"<w:b/></w:rPr><w:t xml:space="preserve">Red and </w:t>"#));
        assert!(xml.contains(r#"<w:i/></w:rPr><w:t xml:space="preserve">blue</w:t>"#));
        assert!(xml.contains(r#"<w:i/></w:rPr><w:t xml:space="preserve"> shine</w:t>"#));
        assert!(xml.contains(r#"<wp:docPr id="2" name="Picture 2"/>"#));
        assert!(xml.contains("<w:t>caption</w:t>"));
        assert_eq!(xml.matches("<w:drawing>").count(), 2);
        assert!(xml.contains(r#"<w:tab w:val="left" w:pos="720"/>"#));

        let reparsed = DocxFormat.parse(&out, "docx").unwrap();
        assert_eq!(reparsed.remaining_blanks(), 0);
        match &reparsed.blocks[1] {
            Block::Paragraph { content, .. } => assert_eq!(content.source_text(), "Red and blue shine"),
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_write_fills_empty_table_cell() {
        let mut doc = DocxFormat.parse(&build_docx(body()), "docx").unwrap();
        if let Block::Table { rows } = &mut doc.blocks[2] {
            fill_first_blank(&mut rows[1][1].content, "light\nto sugar");
        }

        let out = DocxFormat.write(&doc).unwrap();
        let xml = read_document_xml(&out).unwrap();
        assert!(xml.contains(r#"<w:tc><w:p><w:r><w:t xml:space="preserve">light</w:t><w:br/>"#));
        // 未填写的段落原样保留
        assert!(xml.contains("<w:r><w:t>_____</w:t></w:r>"));

        let reparsed = DocxFormat.parse(&out, "docx").unwrap();
        match &reparsed.blocks[2] {
            Block::Table { rows } => assert_eq!(rows[1][1].content.source_text(), "light\nto sugar"),
            other => panic!("unexpected block {:?}", other),
        }
    }
}
