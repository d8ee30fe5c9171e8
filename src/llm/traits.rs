//! 上游分类器客户端抽象
//!
//! 所有后端（Gemini / Mock）实现 ClassifierClient：classify 发送提示词并返回模型原始文本。
//! 调用方负责超时控制与失败后的确定性回退，客户端自身不做重试。

use async_trait::async_trait;

/// 分类器客户端 trait：单次提示词补全
#[async_trait]
pub trait ClassifierClient: Send + Sync {
    /// 发送提示词，返回模型原始文本（可能包含 Markdown 代码围栏）
    async fn classify(&self, prompt: &str) -> Result<String, String>;
}
