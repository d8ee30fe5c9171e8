//! 内存版工作流构建器
//!
//! 测试与离线运行用的默认执行器：按名称登记工作流，重名与缺失目标
//! 产生与真实后端相同措辞的失败消息。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BackendError, StepAdded, StepDetails, WorkflowBackend, WorkflowCreated};

struct StoredWorkflow {
    workflow_id: String,
    steps: Vec<StepDetails>,
}

/// 内存工作流注册表
#[derive(Default)]
pub struct InMemoryBuilder {
    /// 工作流名 -> 定义
    workflows: RwLock<HashMap<String, StoredWorkflow>>,
}

impl InMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已登记的工作流数
    pub async fn workflow_count(&self) -> usize {
        self.workflows.read().await.len()
    }
}

#[async_trait]
impl WorkflowBackend for InMemoryBuilder {
    async fn create_workflow(&self, name: &str) -> Result<WorkflowCreated, BackendError> {
        let mut workflows = self.workflows.write().await;
        if workflows.contains_key(name) {
            return Err(BackendError::new(format!(
                "workflow '{}' already exists",
                name
            )));
        }

        let workflow_id = format!("wf_{}", uuid::Uuid::new_v4());
        workflows.insert(
            name.to_string(),
            StoredWorkflow {
                workflow_id: workflow_id.clone(),
                steps: Vec::new(),
            },
        );

        tracing::debug!("created workflow '{}' ({})", name, workflow_id);
        Ok(WorkflowCreated {
            workflow_id,
            status: "created".to_string(),
        })
    }

    async fn add_step(
        &self,
        workflow_target: &str,
        step: StepDetails,
    ) -> Result<StepAdded, BackendError> {
        let mut workflows = self.workflows.write().await;

        // 目标既可以是名称也可以是 wf_ 前缀的 ID
        let key = workflows
            .iter()
            .find(|(name, wf)| name.as_str() == workflow_target || wf.workflow_id == workflow_target)
            .map(|(name, _)| name.clone());
        let Some(workflow) = key.and_then(|k| workflows.get_mut(&k)) else {
            return Err(BackendError::new(format!(
                "workflow '{}' not found",
                workflow_target
            )));
        };

        if workflow.steps.iter().any(|s| s.name == step.name) {
            return Err(BackendError::new(format!(
                "step '{}' already exists",
                step.name
            )));
        }

        let step_id = format!("step_{}", uuid::Uuid::new_v4());
        workflow.steps.push(step);

        Ok(StepAdded {
            step_id,
            status: "added".to_string(),
        })
    }
}
