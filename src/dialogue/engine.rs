//! 对话引擎：探询循环与动作分发
//!
//! 状态机：AWAITING_INTENT →（需要澄清）CLARIFYING → AWAITING_INTENT（受
//! MAX_PROBING_ATTEMPTS 约束的循环）→（意图明确）DISPATCHING → 成功/失败。
//! 所有公共操作都返回类型化响应，不向调用方抛错。

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::audit::{AuditEntry, AuditSink};
use crate::builder::{StepDetails, WorkflowBackend};
use crate::llm::ClassifierClient;

use super::intent::{IntentExtractor, IntentKind, IntentResult};
use super::message::{ActionResponse, CanvasCommand, ChatRequest};
use super::probing::{self, ProbingOutcome};
use super::session::SessionManager;

/// 探询计数饱和后的恢复提示
const RECOVERY_HINTS: &str = "I'm still having trouble understanding. You could try:\n\
    1. Rephrasing your request\n\
    2. Type 'help' to see what I can do\n\
    3. Start with a simple command like 'Create a workflow'";

/// HELP 意图的静态菜单
const HELP_MENU: &str = "I can help you with the following:\n\n\
    1. Create workflows:\n\
    \x20  - 'Create a workflow called Monthly Report'\n\
    \x20  - 'Make a new workflow for Data Processing'\n\n\
    2. Add steps to workflows:\n\
    \x20  - 'Add a data input step to Monthly Report'\n\
    \x20  - 'Add a validation step'\n\n\
    3. Get help:\n\
    \x20  - Type 'help' anytime to see this message\n\n\
    What would you like to do?";

/// 澄清问题润色提示词
const PROBING_QUESTION_PROMPT: &str = r#"You are an AI assistant for WF-Builder. The user's previous request was not fully understood.
Their original message was: "{ORIGINAL_USER_UTTERANCE}"

WF-Builder can help users:
- Create new workflows (e.g., "Create a financial report workflow")
- Add steps to existing workflows (e.g., "Add a data validation step to my report")
- Define parameters for these steps
- Connect steps in a sequence
- And generally manage their automated business processes.

Your task is to generate a SINGLE, clear, and helpful question to ask the user to clarify their intention or provide missing information relevant to these workflow capabilities.
Focus on understanding what the user wants to *do* with a workflow.
Do not try to complete the task yourself, only ask one clarifying question.
If the user's request seems completely unrelated to workflow building, you can ask a more general clarifying question like 'How can I help you with workflows today?'
Respond ONLY with the question."#;

/// 名称非法字符（文件系统保留字符集）
const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_NAME_LEN: usize = 100;

/// 实体校验错误：本地可恢复，只转成 Error 响应
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The {0} name cannot be empty. Please try again.")]
    EmptyName(&'static str),
    #[error("The {0} name contains invalid characters. Please use only letters, numbers, spaces, and basic punctuation.")]
    InvalidCharacters(&'static str),
    #[error("The {0} name is too long. Please use a name with 100 characters or less.")]
    TooLong(&'static str),
    #[error("Please specify which workflow to add the step to.")]
    MissingWorkflowTarget,
}

/// 校验名称，返回 trim 后的值
fn validate_name(kind: &'static str, raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName(kind));
    }
    if name.contains(INVALID_NAME_CHARS) {
        return Err(ValidationError::InvalidCharacters(kind));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong(kind));
    }
    Ok(name.to_string())
}

/// 对话引擎
pub struct DialogueEngine {
    sessions: Arc<SessionManager>,
    backend: Arc<dyn WorkflowBackend>,
    audit: Arc<dyn AuditSink>,
    extractor: IntentExtractor,
    /// 澄清问题润色用的上游客户端；失败或缺席时用规范模板
    question_client: Option<Arc<dyn ClassifierClient>>,
    question_timeout: Duration,
}

impl DialogueEngine {
    pub fn new(
        sessions: Arc<SessionManager>,
        backend: Arc<dyn WorkflowBackend>,
        audit: Arc<dyn AuditSink>,
        extractor: IntentExtractor,
    ) -> Self {
        Self {
            sessions,
            backend,
            audit,
            extractor,
            question_client: None,
            question_timeout: Duration::from_secs(15),
        }
    }

    /// 注入澄清问题润色客户端
    pub fn with_question_client(
        mut self,
        client: Arc<dyn ClassifierClient>,
        timeout: Duration,
    ) -> Self {
        self.question_client = Some(client);
        self.question_timeout = timeout;
        self
    }

    /// 处理一条用户输入
    pub async fn process(&self, req: &ChatRequest) -> ActionResponse {
        if req.utterance.trim().is_empty() {
            return ActionResponse::error("Message cannot be empty.");
        }

        let request_id = uuid::Uuid::new_v4();
        tracing::info!(
            %request_id,
            session_id = %req.session_id,
            actor_id = %req.actor_id,
            "received utterance: {:?}",
            req.utterance
        );

        let result = self.extractor.extract(&req.utterance).await;
        let outcome = probing::decide(result);

        if outcome.needs_probing {
            self.clarify(req, outcome).await
        } else {
            self.dispatch(req, outcome.intent).await
        }
    }

    /// 澄清分支：计数饱和则给恢复提示，否则计数加一并回问
    async fn clarify(&self, req: &ChatRequest, outcome: ProbingOutcome) -> ActionResponse {
        if self.sessions.has_reached_max(&req.session_id).await {
            tracing::info!(
                session_id = %req.session_id,
                "max probing attempts reached, returning recovery hints"
            );
            return ActionResponse::info(RECOVERY_HINTS);
        }

        let attempt = self.sessions.increment_probing_attempts(&req.session_id).await;
        self.audit.log(AuditEntry::new(
            "system",
            "PROBING",
            serde_json::json!({
                "utterance": req.utterance,
                "attempt": attempt,
                "intent": outcome.intent.intent.as_str(),
            }),
            &req.actor_id,
            Some("clarification_needed"),
        ));

        // decide() 保证 needs_probing 时必有模板问题
        let template = outcome
            .question
            .unwrap_or_else(|| probing::template_question(&outcome.intent));
        let question = self
            .phrase_question(&req.utterance)
            .await
            .unwrap_or(template);

        tracing::info!(
            session_id = %req.session_id,
            attempt,
            "asking clarification: {:?}",
            question
        );
        ActionResponse::clarification(question)
    }

    /// 向润色客户端要一个更贴合原话的问题；任何失败都回到模板
    async fn phrase_question(&self, utterance: &str) -> Option<String> {
        let client = self.question_client.as_ref()?;
        let prompt = PROBING_QUESTION_PROMPT.replace("{ORIGINAL_USER_UTTERANCE}", utterance);

        match tokio::time::timeout(self.question_timeout, client.classify(&prompt)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Ok(Err(e)) => {
                tracing::warn!("probing question generator failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("probing question generator timed out");
                None
            }
        }
    }

    /// 分发分支：清零计数、记录意图、按封闭枚举派发
    async fn dispatch(&self, req: &ChatRequest, intent: IntentResult) -> ActionResponse {
        self.sessions.reset_probing_attempts(&req.session_id).await;
        self.sessions
            .update(&req.session_id, intent.intent, intent.entities.clone())
            .await;

        self.audit.log(AuditEntry::new(
            "system",
            intent.intent.as_str(),
            serde_json::to_value(&intent.entities).unwrap_or_default(),
            &req.actor_id,
            None,
        ));

        match intent.intent {
            IntentKind::CreateWorkflow => self.create_workflow(req, &intent).await,
            IntentKind::AddStep => self.add_step(req, &intent).await,
            IntentKind::Help => ActionResponse::info(HELP_MENU),
            // decide() 下 Unknown 必走澄清分支；保留此臂维持穷尽派发
            IntentKind::Unknown => ActionResponse::error(format!(
                "I understood you wanted to '{}', but I don't know how to do that yet.",
                intent.intent
            )),
        }
    }

    async fn create_workflow(&self, req: &ChatRequest, intent: &IntentResult) -> ActionResponse {
        let raw = intent.entity("workflow_name").unwrap_or("");
        let name = match validate_name("workflow", raw) {
            Ok(name) => name,
            Err(e) => return self.validation_failure(req, intent.intent, raw, e),
        };

        match self.backend.create_workflow(&name).await {
            Ok(created) => {
                tracing::info!(
                    session_id = %req.session_id,
                    workflow_id = %created.workflow_id,
                    "created workflow {:?}",
                    name
                );
                let created_at = chrono::Utc::now().to_rfc3339();
                self.audit.log(AuditEntry::new(
                    "system",
                    IntentKind::CreateWorkflow.as_str(),
                    serde_json::json!({
                        "workflowId": created.workflow_id,
                        "workflowName": name,
                        "sessionId": req.session_id,
                    }),
                    &req.actor_id,
                    Some("success"),
                ));
                ActionResponse::success(
                    format!(
                        "I've created a new workflow called \"{}\". What would you like to do next?",
                        name
                    ),
                    CanvasCommand {
                        action: IntentKind::CreateWorkflow.as_str().to_string(),
                        payload: serde_json::json!({
                            "workflowId": created.workflow_id,
                            "name": name,
                            "createdAt": created_at,
                            "createdBy": req.actor_id,
                        }),
                    },
                )
            }
            Err(e) => {
                tracing::error!("error creating workflow {:?}: {}", name, e);
                self.audit.log(AuditEntry::new(
                    "system",
                    IntentKind::CreateWorkflow.as_str(),
                    serde_json::json!({ "workflowName": name, "error": e.to_string() }),
                    &req.actor_id,
                    Some("error"),
                ));
                if e.message().contains("already exists") {
                    ActionResponse::error(format!(
                        "A workflow named \"{}\" already exists. Please choose a different name.",
                        name
                    ))
                } else {
                    ActionResponse::error("Failed to create the workflow. Please try again.")
                }
            }
        }
    }

    async fn add_step(&self, req: &ChatRequest, intent: &IntentResult) -> ActionResponse {
        let raw_step = intent.entity("step_name").unwrap_or("");
        let step_name = match validate_name("step", raw_step) {
            Ok(name) => name,
            Err(e) => return self.validation_failure(req, intent.intent, raw_step, e),
        };

        let Some(target) = intent.entity("workflow_target").map(String::from) else {
            return self.validation_failure(
                req,
                intent.intent,
                raw_step,
                ValidationError::MissingWorkflowTarget,
            );
        };

        let created_at = chrono::Utc::now().to_rfc3339();
        let details = StepDetails {
            name: step_name.clone(),
            kind: "step".to_string(),
            created_by: req.actor_id.clone(),
            created_at: created_at.clone(),
        };

        match self.backend.add_step(&target, details).await {
            Ok(added) => {
                tracing::info!(
                    session_id = %req.session_id,
                    step_id = %added.step_id,
                    "added step {:?} to workflow {:?}",
                    step_name,
                    target
                );
                self.audit.log(AuditEntry::new(
                    "system",
                    IntentKind::AddStep.as_str(),
                    serde_json::json!({
                        "stepId": added.step_id,
                        "stepName": step_name,
                        "workflowId": target,
                        "sessionId": req.session_id,
                    }),
                    &req.actor_id,
                    Some("success"),
                ));
                ActionResponse::success(
                    format!(
                        "I've added a step called \"{}\" to the workflow \"{}\". What should this step do?",
                        step_name, target
                    ),
                    CanvasCommand {
                        action: IntentKind::AddStep.as_str().to_string(),
                        payload: serde_json::json!({
                            "stepId": added.step_id,
                            "workflowId": target,
                            "name": step_name,
                            "createdAt": created_at,
                            "createdBy": req.actor_id,
                        }),
                    },
                )
            }
            Err(e) => {
                tracing::error!(
                    "error adding step {:?} to workflow {:?}: {}",
                    step_name,
                    target,
                    e
                );
                self.audit.log(AuditEntry::new(
                    "system",
                    IntentKind::AddStep.as_str(),
                    serde_json::json!({
                        "stepName": step_name,
                        "workflowId": target,
                        "error": e.to_string(),
                    }),
                    &req.actor_id,
                    Some("error"),
                ));
                let message = e.message();
                if message.contains("not found") {
                    ActionResponse::error(format!(
                        "The workflow \"{}\" was not found. Please check the workflow name and try again.",
                        target
                    ))
                } else if message.contains("already exists") {
                    ActionResponse::error(format!(
                        "A step named \"{}\" already exists in this workflow. Please choose a different name.",
                        step_name
                    ))
                } else {
                    ActionResponse::error("Failed to add the step. Please try again.")
                }
            }
        }
    }

    /// 校验失败：记审计、出 Error 响应，不触达执行器
    fn validation_failure(
        &self,
        req: &ChatRequest,
        intent: IntentKind,
        raw_value: &str,
        error: ValidationError,
    ) -> ActionResponse {
        tracing::warn!(
            session_id = %req.session_id,
            intent = %intent,
            "entity validation failed for {:?}: {}",
            raw_value,
            error
        );
        self.audit.log(AuditEntry::new(
            "system",
            intent.as_str(),
            serde_json::json!({ "value": raw_value, "error": error.to_string() }),
            &req.actor_id,
            Some("error"),
        ));
        ActionResponse::error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::builder::{BackendError, InMemoryBuilder, StepAdded, WorkflowCreated};
    use crate::dialogue::message::ResponseStatus;

    #[test]
    fn test_validate_name_accepts_plain_names() {
        assert_eq!(
            validate_name("workflow", "  Monthly Report "),
            Ok("Monthly Report".to_string())
        );
    }

    #[test]
    fn test_validate_name_rejects_empty() {
        assert_eq!(
            validate_name("workflow", "   "),
            Err(ValidationError::EmptyName("workflow"))
        );
    }

    #[test]
    fn test_validate_name_rejects_reserved_characters() {
        for bad in ["Report/2024", "a<b", "what?", "pipe|line", "C:\\temp"] {
            assert_eq!(
                validate_name("workflow", bad),
                Err(ValidationError::InvalidCharacters("workflow")),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_validate_name_rejects_overlong() {
        let long = "x".repeat(101);
        assert_eq!(
            validate_name("step", &long),
            Err(ValidationError::TooLong("step"))
        );
        let exact = "x".repeat(100);
        assert!(validate_name("step", &exact).is_ok());
    }

    /// 收集审计记录的测试端
    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl AuditSink for RecordingSink {
        fn log(&self, entry: AuditEntry) {
            self.entries.lock().unwrap().push(entry);
        }
    }

    impl RecordingSink {
        fn statuses(&self) -> Vec<Option<String>> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.status.clone())
                .collect()
        }
    }

    fn engine_with(
        backend: Arc<dyn WorkflowBackend>,
    ) -> (DialogueEngine, Arc<SessionManager>, Arc<RecordingSink>) {
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(60)));
        let audit = Arc::new(RecordingSink::default());
        let engine = DialogueEngine::new(
            Arc::clone(&sessions),
            backend,
            Arc::clone(&audit) as Arc<dyn AuditSink>,
            IntentExtractor::offline(),
        );
        (engine, sessions, audit)
    }

    #[tokio::test]
    async fn test_empty_utterance_is_rejected() {
        let (engine, _, _) = engine_with(Arc::new(InMemoryBuilder::new()));
        let resp = engine.process(&ChatRequest::new("s1", "u1", "   ")).await;
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(resp.message_for_user, "Message cannot be empty.");
    }

    #[tokio::test]
    async fn test_help_returns_static_menu() {
        let (engine, _, _) = engine_with(Arc::new(InMemoryBuilder::new()));
        let resp = engine.process(&ChatRequest::new("s1", "u1", "help")).await;
        assert_eq!(resp.status, ResponseStatus::Info);
        assert!(resp.message_for_user.contains("Create workflows"));
        assert!(resp.canvas_command.is_none());
    }

    struct ExplodingBackend {
        message: &'static str,
    }

    #[async_trait]
    impl WorkflowBackend for ExplodingBackend {
        async fn create_workflow(&self, _name: &str) -> Result<WorkflowCreated, BackendError> {
            Err(BackendError::new(self.message))
        }

        async fn add_step(
            &self,
            _workflow_target: &str,
            _step: StepDetails,
        ) -> Result<StepAdded, BackendError> {
            Err(BackendError::new(self.message))
        }
    }

    #[tokio::test]
    async fn test_duplicate_workflow_maps_to_specific_message() {
        let (engine, _, _) = engine_with(Arc::new(ExplodingBackend {
            message: "workflow 'Report' already exists",
        }));
        let resp = engine
            .process(&ChatRequest::new("s1", "u1", "create a workflow called Report"))
            .await;
        assert_eq!(resp.status, ResponseStatus::Error);
        assert!(resp
            .message_for_user
            .contains("already exists. Please choose a different name."));
    }

    #[tokio::test]
    async fn test_missing_target_maps_to_specific_message() {
        let (engine, _, _) = engine_with(Arc::new(ExplodingBackend {
            message: "workflow 'Ghost' not found",
        }));
        let resp = engine
            .process(&ChatRequest::new(
                "s1",
                "u1",
                "add a data validation step to Ghost",
            ))
            .await;
        assert_eq!(resp.status, ResponseStatus::Error);
        assert!(resp.message_for_user.contains("was not found"));
    }

    #[tokio::test]
    async fn test_generic_backend_failure() {
        let (engine, _, audit) = engine_with(Arc::new(ExplodingBackend {
            message: "disk on fire",
        }));
        let resp = engine
            .process(&ChatRequest::new("s1", "u1", "create a workflow called Report"))
            .await;
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(
            resp.message_for_user,
            "Failed to create the workflow. Please try again."
        );
        // 底层原因不外露，但进了审计
        assert!(!resp.message_for_user.contains("disk on fire"));
        assert!(audit.statuses().contains(&Some("error".to_string())));
    }

    #[tokio::test]
    async fn test_add_step_without_target_short_circuits() {
        let (engine, _, audit) = engine_with(Arc::new(InMemoryBuilder::new()));
        let resp = engine
            .process(&ChatRequest::new("s1", "u1", "add a validation step"))
            .await;
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(
            resp.message_for_user,
            "Please specify which workflow to add the step to."
        );
        assert!(!audit.statuses().contains(&Some("success".to_string())));
    }

    struct PhrasingClient;

    #[async_trait]
    impl ClassifierClient for PhrasingClient {
        async fn classify(&self, _prompt: &str) -> Result<String, String> {
            Ok("  Which business process should this workflow automate?  ".to_string())
        }
    }

    #[tokio::test]
    async fn test_clarification_uses_phrased_question_when_available() {
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(60)));
        let engine = DialogueEngine::new(
            Arc::clone(&sessions),
            Arc::new(InMemoryBuilder::new()),
            Arc::new(RecordingSink::default()),
            IntentExtractor::offline(),
        )
        .with_question_client(Arc::new(PhrasingClient), Duration::from_secs(5));

        let resp = engine
            .process(&ChatRequest::new("s1", "u1", "create a workflow"))
            .await;
        assert_eq!(resp.status, ResponseStatus::ClarificationNeeded);
        assert_eq!(
            resp.message_for_user,
            "Which business process should this workflow automate?"
        );
        // 生成器成功与否都计数
        assert_eq!(sessions.get("s1").await.probing_attempt_count, 1);
    }

    struct BrokenPhrasingClient;

    #[async_trait]
    impl ClassifierClient for BrokenPhrasingClient {
        async fn classify(&self, _prompt: &str) -> Result<String, String> {
            Err("quota exceeded".to_string())
        }
    }

    #[tokio::test]
    async fn test_clarification_falls_back_to_template_and_still_counts() {
        let sessions = Arc::new(SessionManager::new(Duration::from_secs(60)));
        let engine = DialogueEngine::new(
            Arc::clone(&sessions),
            Arc::new(InMemoryBuilder::new()),
            Arc::new(RecordingSink::default()),
            IntentExtractor::offline(),
        )
        .with_question_client(Arc::new(BrokenPhrasingClient), Duration::from_secs(5));

        let resp = engine
            .process(&ChatRequest::new("s1", "u1", "create a workflow"))
            .await;
        assert_eq!(resp.status, ResponseStatus::ClarificationNeeded);
        assert_eq!(
            resp.message_for_user,
            "What would you like to name your new workflow?"
        );
        assert_eq!(sessions.get("s1").await.probing_attempt_count, 1);
    }
}
