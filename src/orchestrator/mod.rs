//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责作业的流程调度和并发控制，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `job_orchestrator` - 作业编排器
//! - 驱动单个作业的状态机（解析 → 生成 → 汇总 → 写回）
//! - 任何致命错误都会让作业进入 `Failed`，且不产生输出文件
//! - 组装最终的 `JobResult`
//!
//! ### `section_pool` - 题目并发池
//! - 每道题一个任务，Semaphore 控制并发数量
//! - 传播取消信号，任务 panic 降级为单题失败
//!
//! ## 层次关系
//!
//! ```text
//! job_orchestrator (处理一个文件)
//!     ↓
//! section_pool (处理 Vec<Section>)
//!     ↓
//! generation::AnswerEngine (处理单个 Section)
//!     ↓
//! services (能力层：TextGenerator)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：job_orchestrator 管流程，section_pool 管并发
//! 2. **向下依赖**：编排层 → generation → services
//! 3. **无业务逻辑**：只做调度和状态记录，不做题型判断

pub mod job_orchestrator;
pub mod section_pool;

// 重新导出主要类型
pub use job_orchestrator::{JobOrchestrator, JobState};
pub use section_pool::{cancellation, solve_all, CancelHandle, CancelSignal};
