//! Weaver - WF-Builder 对话式工作流构建引擎
//!
//! 模块划分：
//! - **audit**: 审计日志（tracing / JSONL 追加）
//! - **builder**: 工作流构建器接口与内存实现（外部动作执行器）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **dialogue**: 核心——意图抽取、探询循环、会话存储、动作分发
//! - **llm**: 上游分类器客户端抽象与实现（Gemini / Mock）
//! - **observability**: tracing 初始化

pub mod audit;
pub mod builder;
pub mod config;
pub mod dialogue;
pub mod llm;
pub mod observability;

pub use dialogue::{ActionResponse, ChatRequest, DialogueEngine, ResponseStatus};
