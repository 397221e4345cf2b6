use chrono::{DateTime, Utc};
use std::fmt;
use tokio::time::Instant;

use super::calendar::LookbackWindow;
use crate::modules::action::DeliveryStatus;
use crate::modules::brain::SentimentResult;
use crate::modules::perception::{Aggregation, NewsBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    FetchNews,
    Aggregate,
    Analyze,
    LogHistory,
    Deliver,
    Done,
    Failed(FailedAt),
}

/// Stage at which a run stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedAt {
    Start,
    FetchNews,
    Aggregate,
    Analyze,
    LogHistory,
    Deliver,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }

    /// The terminal failure state for this stage; terminal stages map to themselves.
    pub fn failed(self) -> Stage {
        let at = match self {
            Stage::Start => FailedAt::Start,
            Stage::FetchNews => FailedAt::FetchNews,
            Stage::Aggregate => FailedAt::Aggregate,
            Stage::Analyze => FailedAt::Analyze,
            Stage::LogHistory => FailedAt::LogHistory,
            Stage::Deliver => FailedAt::Deliver,
            Stage::Done | Stage::Failed(_) => return self,
        };
        Stage::Failed(at)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Failed(at) => write!(f, "Failed({:?})", at),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A degraded or failed item, surfaced in the report footer.
#[derive(Debug, Clone, PartialEq)]
pub struct RunIssue {
    pub subject: String,
    pub stage: Stage,
    pub detail: String,
}

/// Per-run state threaded through the stages. Owned by one run; nothing
/// in here outlives it.
#[derive(Debug)]
pub struct RunContext {
    pub started: Instant,
    pub started_at: DateTime<Utc>,
    pub window: LookbackWindow,
    pub stage: Stage,
    pub news: NewsBatch,
    pub requests_issued: u32,
    pub aggregation: Option<Aggregation>,
    pub results: Vec<SentimentResult>,
    pub issues: Vec<RunIssue>,
    pub rows_written: usize,
    pub history_error: Option<String>,
    pub delivery: Option<DeliveryStatus>,
}

impl RunContext {
    pub fn new(started_at: DateTime<Utc>, window: LookbackWindow) -> Self {
        Self {
            started: Instant::now(),
            started_at,
            window,
            stage: Stage::Start,
            news: NewsBatch::new(),
            requests_issued: 0,
            aggregation: None,
            results: Vec::new(),
            issues: Vec::new(),
            rows_written: 0,
            history_error: None,
            delivery: None,
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        tracing::debug!("stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    pub fn fail(&mut self) {
        self.stage = self.stage.failed();
    }

    pub fn record_issue(&mut self, subject: &str, detail: impl Into<String>) {
        self.issues.push(RunIssue {
            subject: subject.to_string(),
            stage: self.stage,
            detail: detail.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_tagged_with_the_current_stage() {
        assert_eq!(Stage::FetchNews.failed(), Stage::Failed(FailedAt::FetchNews));
        assert_eq!(Stage::Done.failed(), Stage::Done);
        assert!(Stage::Failed(FailedAt::Start).is_terminal());
        assert!(!Stage::Deliver.is_terminal());
        assert_eq!(Stage::Failed(FailedAt::FetchNews).to_string(), "Failed(FetchNews)");
        assert_eq!(Stage::LogHistory.to_string(), "LogHistory");
    }
}
