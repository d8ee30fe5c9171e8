//! 意图抽取
//!
//! 把用户的自由文本映射为类型化意图 + 实体 + 置信度。上游分类器调用有超时上限，
//! 任何失败（超时、传输错误、JSON 不合法、结构不符）都透明退化为确定性的
//! 关键词/正则回退分类器，对调用方绝不抛错。

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::ClassifierClient;

/// 意图类别（封闭集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    CreateWorkflow,
    AddStep,
    Help,
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::CreateWorkflow => "CREATE_WORKFLOW",
            IntentKind::AddStep => "ADD_STEP",
            IntentKind::Help => "HELP",
            IntentKind::Unknown => "UNKNOWN",
        }
    }

    /// 探询判定所需的必要实体
    pub fn required_entity(&self) -> Option<&'static str> {
        match self {
            IntentKind::CreateWorkflow => Some("workflow_name"),
            IntentKind::AddStep => Some("step_name"),
            IntentKind::Help | IntentKind::Unknown => None,
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 置信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// 单次话语的抽取结果（不可变值，每条话语只产生一次）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: IntentKind,
    #[serde(default)]
    pub entities: HashMap<String, String>,
    pub confidence: Confidence,
}

impl IntentResult {
    /// 取非空实体（trim 后为空视为缺失）
    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// 结构化意图提示词
const STRUCTURED_INTENT_PROMPT: &str = r#"You are an AI assistant for WF-Builder, a tool that creates business workflows.
Your primary task is to understand user requests and identify their intent and any relevant details (entities) for predefined actions.
Supported actions and their required entities are:
1.  CREATE_WORKFLOW: User wants to make a new workflow.
    - Entities: {"workflow_name": "The name of the new workflow"}
2.  ADD_STEP: User wants to add a step to a workflow.
    - Entities: {"step_name": "Name of the step", "workflow_target": "Optional: Name of workflow to add to"}
3.  HELP: User wants to get help with a workflow.
    - Entities: {}
4.  UNKNOWN: If the intent is unclear or not one of the supported actions.
    - Entities: {}

Respond ONLY with a single JSON object containing "intent", "entities", and a "confidence" ("high", "medium", "low").
Example for creating a workflow: {"intent": "CREATE_WORKFLOW", "entities": {"workflow_name": "My New Report"}, "confidence": "high"}
Example for unknown: {"intent": "UNKNOWN", "entities": {}, "confidence": "low"}"#;

/// 意图抽取器
pub struct IntentExtractor {
    classifier: Option<Arc<dyn ClassifierClient>>,
    request_timeout: Duration,
}

impl IntentExtractor {
    pub fn new(classifier: Option<Arc<dyn ClassifierClient>>, request_timeout: Duration) -> Self {
        Self {
            classifier,
            request_timeout,
        }
    }

    /// 无上游分类器，只用启发式回退
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(15))
    }

    /// 抽取意图；对调用方永不失败
    pub async fn extract(&self, utterance: &str) -> IntentResult {
        if let Some(client) = &self.classifier {
            let prompt = format!("{}\n\nUser request: {}", STRUCTURED_INTENT_PROMPT, utterance);
            match tokio::time::timeout(self.request_timeout, client.classify(&prompt)).await {
                Ok(Ok(raw)) => {
                    if let Some(result) = parse_intent_reply(&raw) {
                        tracing::debug!(
                            intent = %result.intent,
                            "classifier produced structured intent"
                        );
                        return result;
                    }
                    tracing::warn!("classifier reply not parseable, using fallback: {}", raw);
                }
                Ok(Err(e)) => {
                    tracing::warn!("classifier call failed, using fallback: {}", e);
                }
                Err(_) => {
                    tracing::warn!(
                        "classifier timed out after {:?}, using fallback",
                        self.request_timeout
                    );
                }
            }
        }

        fallback_classify(utterance)
    }
}

/// 从模型原始文本中解出意图 JSON
///
/// 上游常把 JSON 包进 Markdown 代码围栏，先按首/尾花括号截取再解析；
/// 意图与置信度取值不在封闭集内时整体判为不可解析。
fn parse_intent_reply(raw: &str) -> Option<IntentResult> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

static QUOTED_NAME_RE: OnceLock<Regex> = OnceLock::new();
static BARE_NAME_RE: OnceLock<Regex> = OnceLock::new();
static STEP_EXPLICIT_RE: OnceLock<Regex> = OnceLock::new();
static ADD_PHRASE_RE: OnceLock<Regex> = OnceLock::new();
static STEP_WORD_RE: OnceLock<Regex> = OnceLock::new();
static TARGET_RE: OnceLock<Regex> = OnceLock::new();

/// 确定性回退分类器：输入文本的纯函数
///
/// 已知不精确的启发式（贪婪捕获可能吞掉尾随词），只保证结果类别，
/// 不作为正确性关键的解析器使用。
pub fn fallback_classify(utterance: &str) -> IntentResult {
    let lower = utterance.to_lowercase();
    let mut entities = HashMap::new();

    let creates = ["create", "make", "build"].iter().any(|w| lower.contains(w));
    if creates && lower.contains("workflow") {
        let name = capture_name(utterance);
        let confidence = if name.is_some() {
            Confidence::High
        } else {
            Confidence::Low
        };
        if let Some(name) = name {
            entities.insert("workflow_name".to_string(), name);
        }
        return IntentResult {
            intent: IntentKind::CreateWorkflow,
            entities,
            confidence,
        };
    }

    if lower.contains("add") && lower.contains("step") {
        let (step_name, explicit) = capture_step_name(utterance);
        let confidence = match (&step_name, explicit) {
            (Some(_), true) => Confidence::High,
            (Some(_), false) => Confidence::Medium,
            (None, _) => Confidence::Low,
        };
        if let Some(name) = step_name {
            entities.insert("step_name".to_string(), name);
        }
        if let Some(target) = capture_workflow_target(utterance) {
            entities.insert("workflow_target".to_string(), target);
        }
        return IntentResult {
            intent: IntentKind::AddStep,
            entities,
            confidence,
        };
    }

    if lower.trim() == "help" || lower.starts_with("help") {
        return IntentResult {
            intent: IntentKind::Help,
            entities,
            confidence: Confidence::High,
        };
    }

    IntentResult {
        intent: IntentKind::Unknown,
        entities,
        confidence: Confidence::Low,
    }
}

/// 工作流名：called/named 后的引号或裸词段，或 for "..." 的引号段
fn capture_name(utterance: &str) -> Option<String> {
    let quoted = QUOTED_NAME_RE
        .get_or_init(|| Regex::new(r#"(?i)\b(?:called|named|for)\s+"([^"]+)""#).unwrap());
    if let Some(caps) = quoted.captures(utterance) {
        return non_empty(caps.get(1).map(|m| m.as_str()));
    }

    let bare = BARE_NAME_RE
        .get_or_init(|| Regex::new(r#"(?i)\b(?:called|named)\s+([^,.!?"]+)"#).unwrap());
    bare.captures(utterance)
        .and_then(|caps| non_empty(caps.get(1).map(|m| m.as_str())))
}

/// 步骤名：优先 step called/named 的显式命名，否则取 add a <短语> step 的间接短语
fn capture_step_name(utterance: &str) -> (Option<String>, bool) {
    let explicit = STEP_EXPLICIT_RE.get_or_init(|| {
        Regex::new(r#"(?i)\bstep\s+(?:called|named)\s+(?:"([^"]+)"|([^,.!?"]+))"#).unwrap()
    });
    if let Some(caps) = explicit.captures(utterance) {
        let name = non_empty(caps.get(1).or(caps.get(2)).map(|m| m.as_str()));
        if name.is_some() {
            return (name, true);
        }
    }

    let phrase = ADD_PHRASE_RE
        .get_or_init(|| Regex::new(r"(?i)\badd\s+(?:a|an|the)\s+(.+?)\s+step\b").unwrap());
    let name = phrase
        .captures(utterance)
        .and_then(|caps| non_empty(caps.get(1).map(|m| m.as_str())));
    (name, false)
}

/// 目标工作流：step 一词之后的 to (the) (workflow) <名称>
fn capture_workflow_target(utterance: &str) -> Option<String> {
    let step_word = STEP_WORD_RE.get_or_init(|| Regex::new(r"(?i)\bstep\b").unwrap());
    let tail_start = step_word.find(utterance).map(|m| m.end()).unwrap_or(0);
    let tail = &utterance[tail_start..];

    let target = TARGET_RE.get_or_init(|| {
        Regex::new(r#"(?i)\bto\s+(?:the\s+)?(?:workflow\s+)?(?:"([^"]+)"|([^,.!?"]+))"#).unwrap()
    });
    target
        .captures(tail)
        .and_then(|caps| non_empty(caps.get(1).or(caps.get(2)).map(|m| m.as_str())))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
