//! 工作流构建器接口（外部动作执行器）
//!
//! 对话引擎只依赖 WorkflowBackend trait；画布渲染与图持久化都在此边界之外。
//! 执行器的失败以不透明的消息文本呈现，分发器按子串（already exists / not found）
//! 映射为面向用户的错误提示。

mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryBuilder;

/// 创建工作流的返回值
#[derive(Debug, Clone)]
pub struct WorkflowCreated {
    pub workflow_id: String,
    pub status: String,
}

/// 添加步骤的返回值
#[derive(Debug, Clone)]
pub struct StepAdded {
    pub step_id: String,
    pub status: String,
}

/// 步骤详情
#[derive(Debug, Clone)]
pub struct StepDetails {
    pub name: String,
    /// 节点类型，当前恒为 step
    pub kind: String,
    pub created_by: String,
    /// RFC 3339 时间戳
    pub created_at: String,
}

/// 执行器错误：对核心不透明的消息文本
#[derive(Error, Debug)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 工作流构建器 trait
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// 创建一个空工作流
    async fn create_workflow(&self, name: &str) -> Result<WorkflowCreated, BackendError>;

    /// 向指定工作流（按名称或 ID）添加步骤
    async fn add_step(&self, workflow_target: &str, step: StepDetails)
        -> Result<StepAdded, BackendError>;
}
