use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// A single prompt/response exchange with a hosted model. Retrying is the
/// caller's job.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String>;
}

/// Any OpenAI-compatible `/chat/completions` endpoint (Groq by default).
pub struct ChatCompletionsBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl ChatCompletionsBackend {
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str, temperature: f64, max_tokens: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(system_prompt, user_prompt);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("LLM", e))?;

        let status = resp.status();
        let raw = resp.text().await.map_err(|e| AppError::from_reqwest("LLM", e))?;
        if !status.is_success() {
            warn!("⚠️ {} API Error: {} - {}", self.model, status, raw.chars().take(200).collect::<String>());
            return Err(AppError::from_status("LLM", status.as_u16(), raw));
        }

        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| AppError::Malformed(format!("completion body is not JSON: {}", e)))?;
        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::Malformed("completion has no choices[0].message.content".to_string()))?;

        if let Some(usage) = parsed.get("usage") {
            debug!("{} usage: {}", self.model, usage);
        }
        Ok(content.to_string())
    }
}
