use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::{AppError, AppResult};

/// Telegram rejects messages above this many UTF-16 code units; most emoji
/// count as two.
pub const MAX_MESSAGE_UNITS: usize = 4096;

const TRUNCATION_NOTE: &str = "\n…(truncated)";

/// Anything that can post a plain-text message to the operator's chat.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Returns the provider's message id on success.
    async fn send_text(&self, text: &str) -> AppResult<i64>;
}

pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, base_url: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

#[async_trait]
impl ChatSink for TelegramNotifier {
    async fn send_text(&self, text: &str) -> AppResult<i64> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": fit_message(text),
        });

        // the bot token is part of the URL; keep it out of error strings
        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("Telegram", e.without_url()))?;

        let status = resp.status();
        let raw = resp
            .text()
            .await
            .map_err(|e| AppError::from_reqwest("Telegram", e.without_url()))?;

        if !status.is_success() {
            error!("❌ Telegram API error: {} - {}", status, raw);
            return Err(AppError::from_status("Telegram", status.as_u16(), raw));
        }

        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| AppError::Malformed(format!("Telegram response is not JSON: {}", e)))?;
        if !parsed["ok"].as_bool().unwrap_or(false) {
            error!("❌ Telegram refused message: {}", raw);
            return Err(AppError::Http {
                service: "Telegram",
                status: status.as_u16(),
                body: parsed["description"].as_str().unwrap_or("ok=false").to_string(),
            });
        }

        let message_id = parsed["result"]["message_id"]
            .as_i64()
            .ok_or_else(|| AppError::Malformed("Telegram response has no message_id".to_string()))?;
        info!("✅ [Telegram] sendMessage ok (message_id={})", message_id);
        Ok(message_id)
    }
}

/// Cuts an over-long message at a character boundary and marks the cut.
pub fn fit_message(text: &str) -> String {
    if utf16_len(text) <= MAX_MESSAGE_UNITS {
        return text.to_string();
    }
    let mut budget = MAX_MESSAGE_UNITS - utf16_len(TRUNCATION_NOTE);
    let mut out = String::new();
    for c in text.chars() {
        if c.len_utf16() > budget {
            break;
        }
        budget -= c.len_utf16();
        out.push(c);
    }
    out.push_str(TRUNCATION_NOTE);
    out
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_pass_through() {
        assert_eq!(fit_message("hello"), "hello");
    }

    #[test]
    fn long_messages_are_cut_to_the_limit() {
        let text = "x".repeat(5000);
        let out = fit_message(&text);
        assert_eq!(utf16_len(&out), MAX_MESSAGE_UNITS);
        assert!(out.ends_with("(truncated)"));

        let exact = "x".repeat(MAX_MESSAGE_UNITS);
        assert_eq!(fit_message(&exact), exact);
    }

    #[test]
    fn emoji_count_as_two_units() {
        // 3000 chars, 6000 UTF-16 units
        let text = "📈".repeat(3000);
        let out = fit_message(&text);
        assert!(utf16_len(&out) <= MAX_MESSAGE_UNITS);
        assert!(utf16_len(&out) >= MAX_MESSAGE_UNITS - 1);
        assert!(out.ends_with("(truncated)"));
        assert!(out.chars().count() < 2100);
    }

    #[test]
    fn endpoint_embeds_token() {
        let n = TelegramNotifier::new(Client::new(), "https://api.telegram.org/", "123:abc", "42");
        assert_eq!(n.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");
    }
}
