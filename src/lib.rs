//! # Assignment Autofill
//!
//! 自动填写作业文档：找出文档中所有待填写的位置，按题型生成答案，
//! 校验后原样写回，只替换空白处。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露"读写原始字节"的能力
//! - `formats/` - 各容器格式的解析器和写入器（txt / md / csv / docx / 源代码）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `TextGenerator` - 文本生成能力（trait）
//! - `LlmService` - 基于 OpenAI 兼容接口的实现
//!
//! ### ③ 流程层（Pipeline）
//! - `extraction/` - 抽取题目并按固定优先级分类
//! - `generation/` - 按题型选择策略，重试、整理、自检
//! - `validation/` - 汇总校验结果
//! - `writeback/` - 结构替换写回，免费版加水印
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_orchestrator` - 作业状态机
//! - `orchestrator/section_pool` - 题目并发池，支持取消
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod generation;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod validation;
pub mod writeback;

// 重新导出常用类型
pub use config::Config;
pub use error::{GenerationError, PipelineError, PipelineResult};
pub use formats::FormatRegistry;
pub use generation::AnswerEngine;
pub use infrastructure::{FileStore, LocalFileStore};
pub use models::{CompletionJob, JobResult, JobStatus, Section, SubscriptionTier};
pub use orchestrator::{cancellation, CancelHandle, JobOrchestrator};
pub use services::{LlmService, TextGenerator};
