use tracing::{error, info, warn};

use crate::utils::notifier::ChatSink;
use crate::utils::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryStatus {
    Delivered { message_id: i64, attempts: u32 },
    Failed { reason: String, attempts: u32 },
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered { .. })
    }
}

/// Posts rendered messages to the operator chat with bounded retries.
pub struct ReportDelivery<S: ChatSink> {
    sink: S,
    retry: RetryPolicy,
}

impl<S: ChatSink> ReportDelivery<S> {
    pub fn new(sink: S, retry: RetryPolicy) -> Self {
        Self { sink, retry }
    }

    /// Never fails; a failed send is reported in the returned status.
    pub async fn send(&self, text: &str) -> DeliveryStatus {
        info!("📤 [Delivery] sending report ({} chars)...", text.chars().count());
        let outcome = self.retry.run("Telegram sendMessage", |_| self.sink.send_text(text)).await;
        match outcome.result {
            Ok(message_id) => {
                info!("✅ Report delivered (message_id={}, attempts={})", message_id, outcome.attempts);
                DeliveryStatus::Delivered { message_id, attempts: outcome.attempts }
            }
            Err(e) => {
                error!("❌ Report delivery failed after {} attempt(s): {}", outcome.attempts, e);
                DeliveryStatus::Failed { reason: e.user_detail(), attempts: outcome.attempts }
            }
        }
    }

    /// Single attempt, used on the failure path where nothing else is left to do.
    pub async fn alert(&self, text: &str) -> bool {
        match self.sink.send_text(text).await {
            Ok(_) => true,
            Err(e) => {
                warn!("⚠️ Could not send critical alert: {}", e);
                false
            }
        }
    }
}
