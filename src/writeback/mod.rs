//! 写回层
//!
//! ## 职责
//!
//! - 按 `LocationHandle` 把答案替换进文档结构（结构替换，从不做字符串查找）
//! - 免费版追加水印，付费版不加
//! - 交给对应格式的写入器序列化；失败则整个作业失败，不产生半成品
//!
//! 原始文档保持只读，写回在克隆出的副本上进行。

use std::path::Path;

use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::formats::{self, FormatRegistry};
use crate::models::{
    Answer, BlankKind, Block, ContentType, Document, ParagraphStyle, Section, Segment, SubscriptionTier,
    TextRun,
};

/// 写回选项
#[derive(Debug, Clone)]
pub struct WriteBackOptions {
    pub watermark_text: String,
}

impl Default for WriteBackOptions {
    fn default() -> Self {
        Self {
            watermark_text: "Completed with Assignment Autofill (free tier)".to_string(),
        }
    }
}

/// 写回结果
#[derive(Debug, Clone)]
pub struct WriteBackOutput {
    pub bytes: Vec<u8>,
    pub watermark_applied: bool,
}

/// 把答案写回文档并序列化
pub fn write_back(
    document: &Document,
    answers: &[(Section, Answer)],
    tier: SubscriptionTier,
    options: &WriteBackOptions,
    registry: &FormatRegistry,
) -> PipelineResult<WriteBackOutput> {
    let writer = registry
        .writer(&document.format)
        .ok_or_else(|| PipelineError::no_writer(&document.format))?;

    let filled = fill_document(document, answers)?;
    let (filled, watermark_applied) = if tier.is_free() {
        (apply_watermark(filled, &options.watermark_text), true)
    } else {
        (filled, false)
    };

    let bytes = writer.write(&filled)?;
    info!(
        "💾 写回完成: {} 字节, 剩余空白 {}, 水印 {}",
        bytes.len(),
        filled.remaining_blanks(),
        if watermark_applied { "是" } else { "否" }
    );

    Ok(WriteBackOutput {
        bytes,
        watermark_applied,
    })
}

/// 在文档副本上完成所有替换
pub fn fill_document(document: &Document, answers: &[(Section, Answer)]) -> PipelineResult<Document> {
    let mut filled = document.clone();

    for (section, answer) in answers {
        // 生成失败的题目保留原标记
        if !answer.has_content() {
            debug!("  题目 #{} 无答案，保留原空白", section.index);
            continue;
        }

        let run = filled.run_at_mut(&section.location).ok_or_else(|| {
            PipelineError::write_back_failed(
                &document.format,
                format!("题目 #{} 的位置 {:?} 不存在", section.index, section.location),
            )
        })?;
        substitute(run, section, answer).map_err(|reason| {
            PipelineError::write_back_failed(&document.format, format!("题目 #{}: {}", section.index, reason))
        })?;
    }

    Ok(filled)
}

/// 把一个空白片段替换成答案
fn substitute(run: &mut TextRun, section: &Section, answer: &Answer) -> Result<(), String> {
    let index = section.location.segment;
    let indent = match index.checked_sub(1).and_then(|i| run.segments.get(i)) {
        Some(Segment::Text(t)) if t.trim().is_empty() => t.clone(),
        _ => String::new(),
    };
    // CRLF 文件里多行答案也用 \r\n
    let crlf = matches!(run.segments.get(index + 1), Some(Segment::Text(t)) if t.starts_with('\r'));

    let segment = run
        .segments
        .get_mut(index)
        .ok_or_else(|| format!("片段 {} 不存在", index))?;
    let Segment::Blank { marker, kind } = segment else {
        return Err(format!("片段 {} 不是空白（可能已被替换）", index));
    };

    let mut text = render_answer(answer, section, *kind, &indent);
    if crlf {
        text = text.replace("\r\n", "\n").replace('\n', "\r\n");
    }
    *segment = Segment::Filled {
        text,
        marker: marker.clone(),
    };
    Ok(())
}

/// 按空白类型调整答案的排版
fn render_answer(answer: &Answer, section: &Section, kind: BlankKind, indent: &str) -> String {
    let text = answer.text.trim();
    let text = match section.content_type {
        // 选择题只写字母
        ContentType::MultipleChoice => match text.chars().next() {
            Some(letter) if section.options.iter().any(|(l, _)| *l == letter) => letter.to_string(),
            _ => text.to_string(),
        },
        _ => text.to_string(),
    };

    match kind {
        // 标记前的缩进已经保留，从第二行开始补缩进
        BlankKind::CodeStub => text
            .lines()
            .enumerate()
            .map(|(i, line)| match (i, line.is_empty()) {
                (0, _) | (_, true) => line.to_string(),
                _ => format!("{}{}", indent, line),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        BlankKind::AnswerLabel => format!(" {}", text),
        // 单元格和行内空白不能换行
        BlankKind::TableCell | BlankKind::Underline | BlankKind::Placeholder
            if section.content_type != ContentType::Text && section.content_type != ContentType::Code =>
        {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        }
        _ => text,
    }
}

/// 追加水印块
fn apply_watermark(mut document: Document, text: &str) -> Document {
    document.blocks.push(Block::Paragraph {
        content: TextRun::plain(text),
        style: ParagraphStyle::Watermark,
        anchor: None,
    });
    document
}

/// 输出文件名：`<目录>/<文件名>_completed.<扩展名>`
pub fn derive_output_reference(input: &str) -> String {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{}_completed.{}", stem, formats::normalize(&ext.to_string_lossy())),
        None => format!("{}_completed", stem),
    };
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name).to_string_lossy().into_owned(),
        _ => file_name,
    }
}
