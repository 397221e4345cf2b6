//! In-process fakes for the three external services.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::config::TickerRegistry;
use crate::error::{AppError, AppResult};
use crate::modules::brain::CompletionBackend;
use crate::modules::perception::structs::{NewsItem, RawArticle};
use crate::modules::perception::NewsSource;
use crate::utils::notifier::ChatSink;

pub fn news_item(ticker: &str, headline: &str) -> NewsItem {
    NewsItem {
        ticker: ticker.to_string(),
        sector: TickerRegistry::standard().sector(ticker).to_string(),
        headline: headline.to_string(),
        summary: String::new(),
        source: "Reuters".to_string(),
        timestamp: Utc.with_ymd_and_hms(2026, 10, 14, 15, 0, 0).unwrap(),
        url: String::new(),
    }
}

#[derive(Debug, Clone)]
pub struct NewsCall {
    pub symbol: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub at: Instant,
}

/// Replies per symbol in FIFO order; an unscripted symbol gets no articles.
#[derive(Default)]
pub struct ScriptedNewsSource {
    script: Mutex<HashMap<String, VecDeque<AppResult<Vec<RawArticle>>>>>,
    calls: Arc<Mutex<Vec<NewsCall>>>,
}

impl ScriptedNewsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, symbol: &str, reply: AppResult<Vec<RawArticle>>) {
        self.script.lock().unwrap().entry(symbol.to_string()).or_default().push_back(reply);
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<NewsCall>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl NewsSource for ScriptedNewsSource {
    async fn company_news(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<RawArticle>> {
        self.calls.lock().unwrap().push(NewsCall {
            symbol: symbol.to_string(),
            from,
            to,
            at: Instant::now(),
        });
        self.script
            .lock()
            .unwrap()
            .get_mut(symbol)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Replies in FIFO order and records every user prompt.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<AppResult<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: AppResult<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> AppResult<String> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Malformed("no scripted reply".to_string())))
    }
}

/// Records delivered texts; can fail on demand.
#[derive(Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<String>>>,
    failures: Mutex<VecDeque<AppError>>,
    always_fail: bool,
    next_id: AtomicI64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_failing() -> Self {
        Self { always_fail: true, ..Self::default() }
    }

    pub fn fail_next(&self, err: AppError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Successfully delivered messages only.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send_text(&self, text: &str) -> AppResult<i64> {
        if self.always_fail {
            return Err(AppError::Network {
                service: "Telegram",
                message: "connection refused".to_string(),
            });
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
