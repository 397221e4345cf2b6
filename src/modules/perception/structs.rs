use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One headline, tagged with the ticker it was fetched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub ticker: String,
    pub sector: String,
    pub headline: String,
    pub summary: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

/// Article as returned by the news provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArticle {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    /// Unix seconds.
    #[serde(default)]
    pub datetime: i64,
    #[serde(default)]
    pub url: String,
}

/// Per-ticker fetch results in registry order.
#[derive(Debug, Clone, Default)]
pub struct NewsBatch {
    entries: Vec<(String, Vec<NewsItem>)>,
}

impl NewsBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: &str, items: Vec<NewsItem>) {
        self.entries.push((symbol.to_string(), items));
    }

    pub fn get(&self, symbol: &str) -> Option<&[NewsItem]> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, items)| items.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NewsItem])> {
        self.entries.iter().map(|(s, items)| (s.as_str(), items.as_slice()))
    }

    pub fn ticker_count(&self) -> usize {
        self.entries.len()
    }

    pub fn tickers_with_news(&self) -> usize {
        self.iter().filter(|(_, items)| !items.is_empty()).count()
    }

    pub fn total_articles(&self) -> usize {
        self.iter().map(|(_, items)| items.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorpusKind {
    /// The merged fund basket; `total_holdings` is the basket size.
    Fund { total_holdings: usize },
    Individual { sector: String },
}

/// Ordered headlines forming one analysis input. An empty corpus is the
/// "quiet" sentinel for a subject with no news in the window.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    pub subject: String,
    pub kind: CorpusKind,
    pub items: Vec<NewsItem>,
}

impl Corpus {
    pub fn quiet(subject: &str, kind: CorpusKind) -> Self {
        Self { subject: subject.to_string(), kind, items: Vec::new() }
    }

    pub fn is_quiet(&self) -> bool {
        self.items.is_empty()
    }

    pub fn article_count(&self) -> usize {
        self.items.len()
    }

    /// Distinct tickers contributing at least one item.
    pub fn active_tickers(&self) -> usize {
        self.items.iter().map(|i| i.ticker.as_str()).collect::<BTreeSet<_>>().len()
    }
}
