//! Gemini API 客户端
//!
//! 通过 generativelanguage REST 接口调用 generateContent。
//! - Base URL: https://generativelanguage.googleapis.com/v1beta
//! - 模型: gemini-pro
//! - API Key 取自环境变量 `GEMINI_API_KEY`

use std::time::Duration;

use async_trait::async_trait;

use crate::llm::ClassifierClient;

/// Gemini API 常量
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_PRO: &str = "gemini-pro";

/// Gemini 客户端
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.unwrap_or(GEMINI_BASE_URL).trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ClassifierClient for GeminiClient {
    async fn classify(&self, prompt: &str) -> Result<String, String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("gemini request failed: {}", e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(format!("gemini returned {}: {}", status, detail));
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| format!("gemini response not json: {}", e))?;

        value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "gemini response missing candidate text".to_string())
    }
}

/// 创建 Gemini 客户端
///
/// - API Key 使用环境变量 `GEMINI_API_KEY`，未设置时返回 None（调用方退化为确定性回退分类器）
/// - 模型可通过 `model` 参数指定，默认 `gemini-pro`
pub fn create_gemini_client(
    base_url: Option<&str>,
    model: Option<&str>,
    request_timeout: Duration,
) -> Option<GeminiClient> {
    let api_key = std::env::var("GEMINI_API_KEY").ok()?;
    let model = model.unwrap_or(GEMINI_PRO);
    Some(GeminiClient::new(base_url, model, &api_key, request_timeout))
}
