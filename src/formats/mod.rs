//! 文件格式注册表
//!
//! 每种容器格式由一个解析器和一个写入器组成，按小写扩展名注册。
//! 只注册了其中一个的格式不算端到端支持：解析阶段缺解析器、写回阶段
//! 缺写入器都会得到 `UnsupportedFormat`。

pub mod code;
pub mod csv;
pub mod docx;
pub mod markers;
pub mod text;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PipelineResult;
use crate::models::Document;

pub use code::CodeFormat;
pub use csv::CsvFormat;
pub use docx::DocxFormat;
pub use text::PlainTextFormat;

/// 原始字节 → 文档结构
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8], format: &str) -> PipelineResult<Document>;
}

/// 文档结构 → 原始字节
pub trait DocumentWriter: Send + Sync {
    fn write(&self, document: &Document) -> PipelineResult<Vec<u8>>;
}

/// 格式注册表
#[derive(Clone, Default)]
pub struct FormatRegistry {
    parsers: HashMap<String, Arc<dyn DocumentParser>>,
    writers: HashMap<String, Arc<dyn DocumentWriter>>,
}

impl FormatRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置格式：txt / md / csv / docx / 常见源代码
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let text = Arc::new(PlainTextFormat);
        for ext in ["txt", "md"] {
            registry.register_format(ext, text.clone());
        }
        registry.register_format("csv", Arc::new(CsvFormat));
        registry.register_format("docx", Arc::new(DocxFormat));
        let code = Arc::new(CodeFormat);
        for ext in code::CODE_LANGUAGES.keys() {
            registry.register_format(ext, code.clone());
        }
        registry
    }

    pub fn register_parser(&mut self, ext: &str, parser: Arc<dyn DocumentParser>) {
        self.parsers.insert(normalize(ext), parser);
    }

    pub fn register_writer(&mut self, ext: &str, writer: Arc<dyn DocumentWriter>) {
        self.writers.insert(normalize(ext), writer);
    }

    /// 同时注册解析器和写入器
    pub fn register_format<F>(&mut self, ext: &str, format: Arc<F>)
    where
        F: DocumentParser + DocumentWriter + 'static,
    {
        self.register_parser(ext, format.clone());
        self.register_writer(ext, format);
    }

    pub fn parser(&self, ext: &str) -> Option<Arc<dyn DocumentParser>> {
        self.parsers.get(&normalize(ext)).cloned()
    }

    pub fn writer(&self, ext: &str) -> Option<Arc<dyn DocumentWriter>> {
        self.writers.get(&normalize(ext)).cloned()
    }

    /// 是否端到端支持（解析 + 写回）
    pub fn supports(&self, ext: &str) -> bool {
        let ext = normalize(ext);
        self.parsers.contains_key(&ext) && self.writers.contains_key(&ext)
    }

    /// 所有端到端支持的扩展名（排序后）
    pub fn supported_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self
            .parsers
            .keys()
            .filter(|ext| self.writers.contains_key(*ext))
            .cloned()
            .collect();
        formats.sort();
        formats
    }
}

pub(crate) fn normalize(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}
