//! 上游分类器客户端抽象与实现（Gemini / Mock）

mod gemini;
mod mock;
mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use gemini::{create_gemini_client, GeminiClient, GEMINI_BASE_URL, GEMINI_PRO};
pub use mock::MockClassifier;
pub use traits::ClassifierClient;

use crate::config::LlmSection;

/// 按配置创建分类器客户端
///
/// provider = gemini 且 `GEMINI_API_KEY` 已设置时返回 Gemini 客户端；
/// 否则返回 None，意图抽取直接走确定性回退分类器（等价于原始实现的 mock 模式）。
pub fn create_classifier(cfg: &LlmSection) -> Option<Arc<dyn ClassifierClient>> {
    let request_timeout = Duration::from_secs(cfg.timeouts.request);

    match cfg.provider.as_str() {
        "gemini" => match create_gemini_client(cfg.base_url.as_deref(), Some(cfg.model.as_str()), request_timeout) {
            Some(client) => {
                tracing::info!("Using Gemini classifier: {}", cfg.model);
                Some(Arc::new(client))
            }
            None => {
                tracing::warn!("GEMINI_API_KEY not set, falling back to heuristic classification");
                None
            }
        },
        "mock" => {
            tracing::info!("Using heuristic-only classification (provider = mock)");
            None
        }
        other => {
            tracing::warn!("Unknown llm provider '{}', falling back to heuristic classification", other);
            None
        }
    }
}
