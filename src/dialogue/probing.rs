//! 探询判定
//!
//! 纯函数：根据抽取结果判断是否需要澄清，并给出按意图模板化的唯一问题。
//! 需要澄清的条件：意图未知、置信度低、或该意图的必要实体缺失。
//! 引擎可用上游生成器润色问题，但这里的模板是测试确定性的规范回退。

use serde::{Deserialize, Serialize};

use super::intent::{Confidence, IntentKind, IntentResult};

/// 探询判定结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbingOutcome {
    pub needs_probing: bool,
    /// needs_probing 为 true 时恰好一个问题，否则为 None
    pub question: Option<String>,
    pub intent: IntentResult,
}

/// 判定是否需要探询
pub fn decide(result: IntentResult) -> ProbingOutcome {
    let missing_required = match result.intent.required_entity() {
        Some(key) => result.entity(key).is_none(),
        None => false,
    };

    let needs_probing = result.intent == IntentKind::Unknown
        || result.confidence == Confidence::Low
        || missing_required;

    let question = needs_probing.then(|| template_question(&result));

    ProbingOutcome {
        needs_probing,
        question,
        intent: result,
    }
}

/// 按意图选择规范模板问题
pub fn template_question(result: &IntentResult) -> String {
    match result.intent {
        IntentKind::CreateWorkflow => "What would you like to name your new workflow?".to_string(),
        IntentKind::AddStep => {
            if result.entity("step_name").is_some() {
                "Which workflow would you like to add this step to?".to_string()
            } else {
                "What kind of step would you like to add to your workflow?".to_string()
            }
        }
        IntentKind::Help | IntentKind::Unknown => {
            "How can I help you with workflows today?".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn result(
        intent: IntentKind,
        entities: &[(&str, &str)],
        confidence: Confidence,
    ) -> IntentResult {
        IntentResult {
            intent,
            entities: entities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            confidence,
        }
    }

    #[test]
    fn test_unknown_always_probes() {
        let outcome = decide(result(IntentKind::Unknown, &[], Confidence::Low));
        assert!(outcome.needs_probing);
        assert_eq!(
            outcome.question.as_deref(),
            Some("How can I help you with workflows today?")
        );
    }

    #[test]
    fn test_low_confidence_probes_even_with_entities() {
        let outcome = decide(result(
            IntentKind::CreateWorkflow,
            &[("workflow_name", "Report")],
            Confidence::Low,
        ));
        assert!(outcome.needs_probing);
    }

    #[test]
    fn test_missing_workflow_name_probes() {
        let outcome = decide(result(IntentKind::CreateWorkflow, &[], Confidence::High));
        assert!(outcome.needs_probing);
        assert_eq!(
            outcome.question.as_deref(),
            Some("What would you like to name your new workflow?")
        );
    }

    #[test]
    fn test_blank_entity_counts_as_missing() {
        let outcome = decide(result(
            IntentKind::CreateWorkflow,
            &[("workflow_name", "   ")],
            Confidence::High,
        ));
        assert!(outcome.needs_probing);
    }

    #[test]
    fn test_add_step_question_depends_on_step_name() {
        let with_name = decide(result(
            IntentKind::AddStep,
            &[("step_name", "validate")],
            Confidence::Low,
        ));
        assert_eq!(
            with_name.question.as_deref(),
            Some("Which workflow would you like to add this step to?")
        );

        let without_name = decide(result(IntentKind::AddStep, &[], Confidence::Medium));
        assert_eq!(
            without_name.question.as_deref(),
            Some("What kind of step would you like to add to your workflow?")
        );
    }

    #[test]
    fn test_confident_intent_skips_probing() {
        let outcome = decide(result(
            IntentKind::CreateWorkflow,
            &[("workflow_name", "Report")],
            Confidence::High,
        ));
        assert!(!outcome.needs_probing);
        assert!(outcome.question.is_none());

        let help = decide(result(IntentKind::Help, &[], Confidence::High));
        assert!(!help.needs_probing);
    }

    #[test]
    fn test_add_step_missing_target_does_not_probe() {
        // 目标工作流在分发时校验，探询只看 step_name
        let outcome = decide(result(
            IntentKind::AddStep,
            &[("step_name", "validate")],
            Confidence::Medium,
        ));
        assert!(!outcome.needs_probing);
    }
}
