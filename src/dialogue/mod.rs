//! 会话级对话解析引擎
//!
//! 把一条自由文本变成一个结构化动作（或一个澄清问题）的控制逻辑：
//!
//! - **intent**: 意图抽取——上游分类器 + 确定性回退，带置信度
//! - **probing**: 探询判定——纯函数，决定是否追问并给出模板问题
//! - **session**: 会话存储——逐会话探询计数与最近意图，过期清扫
//! - **engine**: 动作分发——受限澄清循环、实体校验、执行器调用与审计
//!
//! 传输层、画布渲染与图持久化都是外部协作者，不在本模块范围内。

mod engine;
mod intent;
mod message;
mod probing;
mod session;

pub use engine::{DialogueEngine, ValidationError};
pub use intent::{fallback_classify, Confidence, IntentExtractor, IntentKind, IntentResult};
pub use message::{ActionResponse, CanvasCommand, ChatRequest, ResponseStatus};
pub use probing::{decide, template_question, ProbingOutcome};
pub use session::{Session, SessionId, SessionManager, SweeperHandle, MAX_PROBING_ATTEMPTS};
