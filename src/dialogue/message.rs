//! 对话边界值定义
//!
//! 引擎入口与出口的统一消息格式，由传输层（不在本 crate 范围内）序列化收发。

use serde::{Deserialize, Serialize};

/// 一次用户输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// 会话标识（调用方提供，按对话唯一）
    pub session_id: String,
    /// 发起者标识
    pub actor_id: String,
    /// 自由文本
    pub utterance: String,
}

impl ChatRequest {
    pub fn new(
        session_id: impl Into<String>,
        actor_id: impl Into<String>,
        utterance: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            actor_id: actor_id.into(),
            utterance: utterance.into(),
        }
    }
}

/// 响应状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    ClarificationNeeded,
    Info,
}

/// 画布指令：成功分发的旁路产物，描述可视化工作流图的一次变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasCommand {
    /// 意图名（如 CREATE_WORKFLOW）
    pub action: String,
    pub payload: serde_json::Value,
}

/// 返回给调用方的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ResponseStatus,
    pub message_for_user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas_command: Option<CanvasCommand>,
}

impl ActionResponse {
    pub fn success(message: impl Into<String>, command: CanvasCommand) -> Self {
        Self {
            status: ResponseStatus::Success,
            message_for_user: message.into(),
            canvas_command: Some(command),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message_for_user: message.into(),
            canvas_command: None,
        }
    }

    pub fn clarification(question: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::ClarificationNeeded,
            message_for_user: question.into(),
            canvas_command: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Info,
            message_for_user: message.into(),
            canvas_command: None,
        }
    }
}
