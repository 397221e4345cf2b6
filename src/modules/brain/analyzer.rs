use serde::Serialize;
use tracing::{info, warn};

use super::llm::CompletionBackend;
use super::parser::{parse_response, Parsed};
use super::prompts::{build_prompt, SYSTEM_PROMPT};
use crate::modules::perception::structs::Corpus;
use crate::utils::retry::RetryPolicy;

/// One subject's sentiment for this run. `score` is `None` for a sentinel
/// (no usable answer); `degraded` marks anything short of a clean parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    pub subject: String,
    pub score: Option<u8>,
    pub summary: Vec<String>,
    pub rationale: String,
    pub article_count: usize,
    pub degraded: bool,
    pub note: Option<String>,
}

impl SentimentResult {
    pub fn sentinel(subject: &str, article_count: usize, note: impl Into<String>) -> Self {
        Self {
            subject: subject.to_string(),
            score: None,
            summary: Vec::new(),
            rationale: String::new(),
            article_count,
            degraded: true,
            note: Some(note.into()),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.score.is_none()
    }
}

pub struct SentimentAnalyzer<B: CompletionBackend> {
    backend: B,
    retry: RetryPolicy,
    max_summary_len: usize,
}

impl<B: CompletionBackend> SentimentAnalyzer<B> {
    pub fn new(backend: B, retry: RetryPolicy, max_summary_len: usize) -> Self {
        Self { backend, retry, max_summary_len }
    }

    /// Never fails: exhausted retries or a declined answer become a sentinel.
    pub async fn analyze(&self, corpus: &Corpus, subject_label: &str) -> SentimentResult {
        let article_count = corpus.article_count();
        if corpus.is_quiet() {
            return SentimentResult::sentinel(subject_label, 0, "No news in lookback window");
        }

        info!("🧠 [Analyzer] {} ({} articles)...", subject_label, article_count);
        let prompt = build_prompt(corpus, subject_label, self.max_summary_len);
        let label = format!("LLM analysis of {}", subject_label);

        let outcome = self
            .retry
            .run(&label, |_| {
                let prompt = prompt.as_str();
                async move {
                    let raw = self.backend.complete(SYSTEM_PROMPT, prompt).await?;
                    parse_response(&raw)
                }
            })
            .await;

        match outcome.result {
            Ok(Parsed::Scored(p)) => {
                let note = (!p.notes.is_empty()).then(|| p.notes.join("; "));
                if p.degraded {
                    warn!("⚠️ {} scored {}/10 with caveats: {}", subject_label, p.score, p.notes.join("; "));
                } else {
                    info!("✅ {} analysis complete: Score {}/10", subject_label, p.score);
                }
                SentimentResult {
                    subject: subject_label.to_string(),
                    score: Some(p.score),
                    summary: p.insights,
                    rationale: p.rationale,
                    article_count,
                    degraded: p.degraded,
                    note,
                }
            }
            Ok(Parsed::Insufficient { .. }) => {
                warn!("LLM returned 'Insufficient Data' for {}", subject_label);
                SentimentResult::sentinel(subject_label, article_count, "Insufficient data for analysis")
            }
            Err(e) => {
                warn!("❌ {} analysis failed after {} attempt(s): {}", subject_label, outcome.attempts, e);
                SentimentResult::sentinel(subject_label, article_count, e.user_detail())
            }
        }
    }
}
