pub mod generator;
pub mod llm_service;

pub use generator::{Generation, Instruction, TextGenerator};
pub use llm_service::LlmService;
