use serde::{Deserialize, Serialize};

/// 题目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    ShortAnswer,
    /// 作文 / 长文本
    Text,
    Math,
    Code,
    Spreadsheet,
    MultipleChoice,
    FillInBlank,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::ShortAnswer,
        ContentType::Text,
        ContentType::Math,
        ContentType::Code,
        ContentType::Spreadsheet,
        ContentType::MultipleChoice,
        ContentType::FillInBlank,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::ShortAnswer => "short_answer",
            ContentType::Text => "text",
            ContentType::Math => "math",
            ContentType::Code => "code",
            ContentType::Spreadsheet => "spreadsheet",
            ContentType::MultipleChoice => "multiple_choice",
            ContentType::FillInBlank => "fill_in_blank",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 空白位置的来源标记类型（抽取阶段确定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankKind {
    /// 下划线 `_____`
    Underline,
    /// `[ANSWER]` / `{{answer}}` 之类的占位符
    Placeholder,
    /// 行尾的 `Answer:`
    AnswerLabel,
    /// 有标签的空单元格
    TableCell,
    /// 代码中的未完成标记
    CodeStub,
}

/// 指回文档结构的位置句柄
///
/// `block` 是块序号；表格用 `cell = (row, col)`，代码用 `line`，
/// `segment` 是文本叶子内的片段序号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationHandle {
    pub block: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<(usize, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub segment: usize,
}

impl LocationHandle {
    pub fn paragraph(block: usize, segment: usize) -> Self {
        Self {
            block,
            cell: None,
            line: None,
            segment,
        }
    }

    pub fn cell(block: usize, row: usize, col: usize, segment: usize) -> Self {
        Self {
            block,
            cell: Some((row, col)),
            line: None,
            segment,
        }
    }

    pub fn code_line(block: usize, line: usize, segment: usize) -> Self {
        Self {
            block,
            cell: None,
            line: Some(line),
            segment,
        }
    }
}

/// 分类后的待填写位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// 发现顺序，从 0 开始连续编号
    pub index: usize,
    pub content_type: ContentType,
    pub prompt_text: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_bank: Option<Vec<String>>,
    pub location: LocationHandle,
    pub blank_kind: BlankKind,
    /// 选择题选项（字母, 选项文本）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<(char, String)>,
    /// 代码块的语言
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Section {
    /// 最简单的题目：段落中的一个空白
    pub fn new(index: usize, content_type: ContentType, prompt_text: impl Into<String>) -> Self {
        Self {
            index,
            content_type,
            prompt_text: prompt_text.into(),
            context: String::new(),
            word_bank: None,
            location: LocationHandle::paragraph(index, 0),
            blank_kind: BlankKind::Placeholder,
            options: Vec::new(),
            language: None,
        }
    }
}
