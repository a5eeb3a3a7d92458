//! 错误类型
//!
//! 作业级别的致命错误（解析 / 写回）和单题级别的生成错误分开定义：
//! - `PipelineError` 会让整个作业进入 `Failed`
//! - `GenerationError` 只在单题内部流转，重试耗尽后降级为零置信度答案，
//!   永远不会越过生成引擎向上传播
//!
//! 校验失败（低置信度 / 不合格）是数据而不是错误，见 `models::ValidationResult`。

use thiserror::Error;

/// 流水线致命错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 没有为该扩展名注册解析器或写入器
    #[error("不支持的文件格式 '{format}' ({stage})")]
    UnsupportedFormat { format: String, stage: Stage },

    /// 输入内容格式错误
    #[error("解析 {format} 文件失败: {message}")]
    Parse { format: String, message: String },

    /// 写入器存在，但序列化失败
    #[error("写回 {format} 文件失败: {message}")]
    WriteBack { format: String, message: String },

    /// 存储读写失败
    #[error("存储操作失败 ({path}): {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 作业在生成阶段被取消
    #[error("cancelled: 作业在生成阶段被取消")]
    Cancelled,
}

/// 出错的流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    WritingBack,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Parsing => write!(f, "parsing"),
            Stage::WritingBack => write!(f, "writing back"),
        }
    }
}

/// 文本生成错误（单题级别，可重试）
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// 调用超时
    #[error("生成调用超时 ({timeout_secs} 秒)")]
    Timeout { timeout_secs: u64 },

    /// API 调用失败
    #[error("生成接口调用失败 (模型: {model}): {message}")]
    Transport { model: String, message: String },

    /// 返回内容为空
    #[error("生成接口返回内容为空 (模型: {model})")]
    EmptyContent { model: String },

    /// 重试次数耗尽
    #[error("已重试 {attempts} 次仍失败: {last}")]
    Exhausted { attempts: u32, last: Box<GenerationError> },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML 解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl PipelineError {
    /// 解析阶段找不到解析器
    pub fn no_parser(format: impl Into<String>) -> Self {
        PipelineError::UnsupportedFormat {
            format: format.into(),
            stage: Stage::Parsing,
        }
    }

    /// 写回阶段找不到写入器
    pub fn no_writer(format: impl Into<String>) -> Self {
        PipelineError::UnsupportedFormat {
            format: format.into(),
            stage: Stage::WritingBack,
        }
    }

    /// 创建解析错误
    pub fn parse_failed(format: impl Into<String>, message: impl std::fmt::Display) -> Self {
        PipelineError::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    /// 创建写回错误
    pub fn write_back_failed(format: impl Into<String>, message: impl std::fmt::Display) -> Self {
        PipelineError::WriteBack {
            format: format.into(),
            message: message.to_string(),
        }
    }

    /// 创建存储错误
    pub fn storage(path: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Storage {
            path: path.into(),
            source,
        }
    }

    /// 该错误是否发生在解析阶段
    pub fn is_parsing(&self) -> bool {
        matches!(
            self,
            PipelineError::Parse { .. }
                | PipelineError::UnsupportedFormat {
                    stage: Stage::Parsing,
                    ..
                }
        )
    }
}

impl GenerationError {
    /// 创建 API 调用错误
    pub fn transport(model: impl Into<String>, message: impl std::fmt::Display) -> Self {
        GenerationError::Transport {
            model: model.into(),
            message: message.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 流水线结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;
