//! Mock 分类器客户端（用于测试，无需 API）
//!
//! 返回构造时注入的固定文本，便于测试上游解析路径的各个分支。

use async_trait::async_trait;

use crate::llm::ClassifierClient;

/// Mock 客户端：回放固定文本
#[derive(Debug, Clone)]
pub struct MockClassifier {
    reply: String,
}

impl MockClassifier {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::with_reply(r#"{"intent": "UNKNOWN", "entities": {}, "confidence": "low"}"#)
    }
}

#[async_trait]
impl ClassifierClient for MockClassifier {
    async fn classify(&self, _prompt: &str) -> Result<String, String> {
        Ok(self.reply.clone())
    }
}
