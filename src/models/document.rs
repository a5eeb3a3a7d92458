//! 文档结构模型
//!
//! 解析器把原始字节转换成有序的 `Block` 列表；所有可填写的位置都是
//! 某个文本叶子里的 `Segment::Blank`，由 `LocationHandle` 精确指向。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::section::{BlankKind, LocationHandle};

/// 文本叶子中的一个片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    /// 原样保留的文本
    Text(String),
    /// 待填写的位置，`marker` 是原文中的标记字符串
    Blank { marker: String, kind: BlankKind },
    /// 写回之后的答案，保留原标记便于追溯
    Filled { text: String, marker: String },
}

impl Segment {
    pub fn text(s: impl Into<String>) -> Self {
        Segment::Text(s.into())
    }

    pub fn blank(marker: impl Into<String>, kind: BlankKind) -> Self {
        Segment::Blank {
            marker: marker.into(),
            kind,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Segment::Blank { .. })
    }
}

/// 一段连续文本（段落、单元格、代码行）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub segments: Vec<Segment>,
}

impl TextRun {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Text(text.into())],
        }
    }

    /// 原始文本：空白位置还原为原标记
    pub fn source_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => t.as_str(),
                Segment::Blank { marker, .. } => marker.as_str(),
                Segment::Filled { text, .. } => text.as_str(),
            })
            .collect()
    }

    /// 给模型看的文本：空白位置统一显示为 `____`
    pub fn prompt_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => t.as_str(),
                Segment::Blank { .. } => "____",
                Segment::Filled { text, .. } => text.as_str(),
            })
            .collect()
    }

    /// 去掉空白标记后的纯文本
    pub fn own_text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t.as_str()),
                Segment::Filled { text, .. } => Some(text.as_str()),
                Segment::Blank { .. } => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| match s {
            Segment::Text(t) => t.trim().is_empty(),
            _ => false,
        })
    }
}

/// 表格单元格
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub content: TextRun,
    /// 来源格式中的锚点（DOCX 中为段落序号）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<usize>,
    /// 单元格跨越的源段落数量（DOCX）
    #[serde(default)]
    pub span: usize,
}

/// 段落样式，只区分写回时需要的信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParagraphStyle {
    #[default]
    Body,
    Heading,
    /// 免费版水印
    Watermark,
}

/// 文档块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Paragraph {
        content: TextRun,
        style: ParagraphStyle,
        #[serde(skip_serializing_if = "Option::is_none")]
        anchor: Option<usize>,
    },
    Table {
        rows: Vec<Vec<Cell>>,
    },
    Code {
        language: String,
        lines: Vec<TextRun>,
    },
}

impl Block {
    pub fn paragraph(content: TextRun) -> Self {
        Block::Paragraph {
            content,
            style: ParagraphStyle::Body,
            anchor: None,
        }
    }

    /// 块的可读文本（用于上下文）
    pub fn prompt_text(&self) -> String {
        match self {
            Block::Paragraph { content, .. } => content.prompt_text(),
            Block::Table { rows } => rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|c| c.content.prompt_text())
                        .collect::<Vec<_>>()
                        .join(" | ")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Code { lines, .. } => lines
                .iter()
                .map(|l| l.prompt_text())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(
            self,
            Block::Paragraph {
                style: ParagraphStyle::Heading,
                ..
            }
        )
    }
}

/// 文档
///
/// 抽取完成后只读；写回阶段克隆出一份新文档再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 小写扩展名，如 `docx`
    pub format: String,
    pub blocks: Vec<Block>,
    /// 格式相关的透传属性（换行符、代码语言等）
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// 需要原样保留的容器字节（DOCX 压缩包）
    #[serde(skip)]
    pub container: Option<Vec<u8>>,
}

impl Document {
    pub fn new(format: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            format: format.into(),
            blocks,
            attributes: BTreeMap::new(),
            container: None,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn with_container(mut self, bytes: Vec<u8>) -> Self {
        self.container = Some(bytes);
        self
    }

    /// 按位置句柄取得文本叶子
    pub fn run_at(&self, handle: &LocationHandle) -> Option<&TextRun> {
        let block = self.blocks.get(handle.block)?;
        match (block, handle.cell, handle.line) {
            (Block::Paragraph { content, .. }, None, None) => Some(content),
            (Block::Table { rows }, Some((r, c)), None) => rows.get(r)?.get(c).map(|cell| &cell.content),
            (Block::Code { lines, .. }, None, Some(l)) => lines.get(l),
            _ => None,
        }
    }

    pub fn run_at_mut(&mut self, handle: &LocationHandle) -> Option<&mut TextRun> {
        let block = self.blocks.get_mut(handle.block)?;
        match (block, handle.cell, handle.line) {
            (Block::Paragraph { content, .. }, None, None) => Some(content),
            (Block::Table { rows }, Some((r, c)), None) => {
                rows.get_mut(r)?.get_mut(c).map(|cell| &mut cell.content)
            }
            (Block::Code { lines, .. }, None, Some(l)) => lines.get_mut(l),
            _ => None,
        }
    }

    /// 按位置句柄取得片段
    pub fn segment_at(&self, handle: &LocationHandle) -> Option<&Segment> {
        self.run_at(handle)?.segments.get(handle.segment)
    }

    /// 文档中剩余的空白位置数量
    pub fn remaining_blanks(&self) -> usize {
        let count = |run: &TextRun| run.segments.iter().filter(|s| s.is_blank()).count();
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Paragraph { content, .. } => count(content),
                Block::Table { rows } => rows.iter().flatten().map(|c| count(&c.content)).sum(),
                Block::Code { lines, .. } => lines.iter().map(count).sum(),
            })
            .sum()
    }
}
