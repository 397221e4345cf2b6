use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use tracing::{debug, error, info, warn};

use super::structs::{NewsItem, RawArticle};
use crate::config::tickers::{is_valid_symbol, TickerEntry};
use crate::error::{AppError, AppResult};
use crate::utils::pacer::CallPacer;
use crate::utils::retry::RetryPolicy;

/// Longest date range a single company-news request may cover.
pub const MAX_RANGE_DAYS: i64 = 30;

/// Only the head of a summary is searched for the ticker / company name.
const RELEVANCE_SUMMARY_CHARS: usize = 100;
const CASE_FOLD_MIN_SYMBOL_LEN: usize = 4;

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// One outbound request for one symbol.
    async fn company_news(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<RawArticle>>;
}

/// Finnhub `company-news` endpoint.
pub struct FinnhubSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FinnhubSource {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl NewsSource for FinnhubSource {
    async fn company_news(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<RawArticle>> {
        let url = format!("{}/company-news", self.base_url);
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        // the token travels as a query parameter; strip URLs from errors
        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("from", &from), ("to", &to), ("token", &self.api_key)])
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("Finnhub", e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::from_status("Finnhub", status.as_u16(), body));
        }

        resp.json::<Vec<RawArticle>>()
            .await
            .map_err(|e| AppError::Malformed(format!("Finnhub company-news for {}: {}", symbol, e.without_url())))
    }
}

/// Result of fetching one ticker: never fails the run on its own, the
/// failure (if any) is carried alongside an empty item list.
#[derive(Debug)]
pub struct TickerFetch {
    pub symbol: String,
    pub items: Vec<NewsItem>,
    /// Outbound requests issued for this ticker, retries included.
    pub requests: u32,
    pub failure: Option<AppError>,
}

impl TickerFetch {
    fn failed(symbol: &str, requests: u32, failure: AppError) -> Self {
        Self { symbol: symbol.to_string(), items: Vec::new(), requests, failure: Some(failure) }
    }
}

/// Sequential, paced, retrying news fetcher.
pub struct NewsClient<S: NewsSource> {
    source: S,
    pacer: CallPacer,
    retry: RetryPolicy,
    max_articles: usize,
}

impl<S: NewsSource> NewsClient<S> {
    pub fn new(source: S, pacer: CallPacer, retry: RetryPolicy, max_articles: usize) -> Self {
        Self { source, pacer, retry, max_articles }
    }

    pub async fn fetch(&self, entry: &TickerEntry, from: NaiveDate, to: NaiveDate) -> TickerFetch {
        let symbol = entry.symbol;
        if !is_valid_symbol(symbol) {
            warn!("Invalid ticker format detected: '{}'", symbol);
            return TickerFetch::failed(symbol, 0, AppError::Config(format!("invalid ticker symbol '{}'", symbol)));
        }
        let span = (to - from).num_days();
        if !(0..=MAX_RANGE_DAYS).contains(&span) {
            return TickerFetch::failed(
                symbol,
                0,
                AppError::Config(format!("date range {}..{} is outside 0..={} days", from, to, MAX_RANGE_DAYS)),
            );
        }

        let label = format!("Finnhub company-news/{}", symbol);
        let outcome = self
            .retry
            .run(&label, |_| async move {
                self.pacer.wait().await;
                self.source.company_news(symbol, from, to).await
            })
            .await;

        match outcome.result {
            Ok(raw) => {
                let fetched = raw.len();
                let items = self.select(entry, raw);
                if fetched > 0 {
                    debug!("{}: {} articles, {} relevant kept", symbol, fetched, items.len());
                }
                TickerFetch { symbol: symbol.to_string(), items, requests: outcome.attempts, failure: None }
            }
            Err(e) => {
                if e.is_auth() {
                    error!("🔥 Finnhub rejected credentials while fetching {}: {}", symbol, e);
                } else {
                    warn!("❌ News fetch for {} gave up after {} attempt(s): {}", symbol, outcome.attempts, e);
                }
                TickerFetch::failed(symbol, outcome.attempts, e)
            }
        }
    }

    /// Relevance filter, newest first, capped at `max_articles`.
    fn select(&self, entry: &TickerEntry, raw: Vec<RawArticle>) -> Vec<NewsItem> {
        let mut items: Vec<NewsItem> = raw
            .into_iter()
            .filter(|a| {
                let keep = is_relevant(entry, a);
                if !keep {
                    debug!("Filtered irrelevant article for {}: {}", entry.symbol, a.headline.chars().take(50).collect::<String>());
                }
                keep
            })
            .map(|a| NewsItem {
                ticker: entry.symbol.to_string(),
                sector: entry.sector.to_string(),
                headline: a.headline.trim().to_string(),
                summary: a.summary.trim().to_string(),
                source: a.source,
                timestamp: DateTime::<Utc>::from_timestamp(a.datetime, 0).unwrap_or_default(),
                url: a.url,
            })
            .collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(self.max_articles);
        items
    }

    pub fn pacing(&self) -> std::time::Duration {
        self.pacer.spacing()
    }
}

/// An article is relevant when the headline or the head of the summary
/// mentions the ticker, the company name or one of its aliases, ignoring
/// case. Symbols shorter than four characters ("NOW", "CAT", "MA") are
/// ordinary words in lowercase, so those must match in capitals.
pub fn is_relevant(entry: &TickerEntry, article: &RawArticle) -> bool {
    let summary_head: String = article.summary.chars().take(RELEVANCE_SUMMARY_CHARS).collect();
    let name = entry.name.to_lowercase();
    let symbol = entry.symbol.to_lowercase();

    [article.headline.as_str(), summary_head.as_str()].iter().any(|text| {
        let lower = text.to_lowercase();
        let symbol_hit = if entry.symbol.len() >= CASE_FOLD_MIN_SYMBOL_LEN {
            contains_word(&lower, &symbol)
        } else {
            contains_word(text, entry.symbol)
        };
        symbol_hit
            || (!name.is_empty() && lower.contains(&name))
            || entry.aliases.iter().any(|a| contains_word(&lower, &a.to_lowercase()))
    })
}

/// `word` occurs in `text` with no letter or digit directly on either side.
fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    text.match_indices(word).any(|(at, m)| {
        let before = text[..at].chars().next_back();
        let after = text[at + m.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}

/// Logs the per-ticker progress line the way the batch loop reports it.
pub fn log_progress(index: usize, total: usize, fetch: &TickerFetch) {
    match &fetch.failure {
        None if !fetch.items.is_empty() => {
            info!("Processing {}/{}: {} ✓ {} article(s)", index, total, fetch.symbol, fetch.items.len())
        }
        None => info!("Processing {}/{}: {} (no relevant news)", index, total, fetch.symbol),
        Some(e) => warn!("Processing {}/{}: {} ✗ {}", index, total, fetch.symbol, e.user_detail()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tickers::{TickerGroup, TickerRegistry};
    use crate::test_support::ScriptedNewsSource;
    use std::time::Duration;
    use tokio::time::Instant;

    const APPLE: TickerEntry = TickerEntry {
        symbol: "AAPL",
        name: "Apple",
        sector: "Tech/Hardware",
        group: TickerGroup::FundMember,
        aliases: &[],
    };

    fn article(headline: &str, ts: i64) -> RawArticle {
        RawArticle {
            headline: headline.to_string(),
            summary: String::new(),
            source: "Reuters".to_string(),
            datetime: ts,
            url: format!("https://example.com/{}", ts),
        }
    }

    fn dates() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2026, 10, 13).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
        )
    }

    fn client(source: ScriptedNewsSource, max_articles: usize) -> NewsClient<ScriptedNewsSource> {
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        };
        NewsClient::new(source, CallPacer::new(Duration::from_millis(1100)), retry, max_articles)
    }

    #[test]
    fn relevance_ignores_case_for_symbols_and_aliases() {
        let reg = TickerRegistry::standard();
        let pick = |s: &str| *reg.get(s).unwrap();

        assert!(is_relevant(&pick("META"), &article("Meta shares jump after earnings beat", 1)));
        assert!(is_relevant(&pick("JPM"), &article("JPMorgan CEO Dimon warns on rates", 1)));
        assert!(is_relevant(&pick("NVDA"), &article("Nvda stock hits record", 1)));
        assert!(is_relevant(&pick("AAPL"), &article("aapl options volume spikes", 1)));
        assert!(is_relevant(&pick("JNJ"), &article("J&J settles talc claims", 1)));
        assert!(is_relevant(&pick("GOOGL"), &article("Google unveils new search model", 1)));

        // short symbols are common words in lowercase
        assert!(is_relevant(&pick("NOW"), &article("NOW beats on subscription revenue", 1)));
        assert!(!is_relevant(&pick("NOW"), &article("Stocks now trade higher", 1)));
        assert!(!is_relevant(&pick("CAT"), &article("Cat food maker raises prices", 1)));
        assert!(!is_relevant(&pick("META"), &article("Metals rally on weak dollar", 1)));
    }

    #[test]
    fn relevance_matches_symbol_word_or_company_name() {
        assert!(is_relevant(&APPLE, &article("AAPL shares rise after earnings", 1)));
        assert!(is_relevant(&APPLE, &article("What analysts think of apple's new phone", 1)));
        assert!(!is_relevant(&APPLE, &article("SNAAPLE juice recalled", 1)));
        assert!(!is_relevant(&APPLE, &article("Microsoft Excel tips", 1)));

        let mut in_summary = article("Tech stocks move", 1);
        in_summary.summary = "Apple led the gains as investors rotated into hardware".to_string();
        assert!(is_relevant(&APPLE, &in_summary));

        let mut late_mention = article("Tech stocks move", 1);
        late_mention.summary = format!("{} Apple", "x".repeat(150));
        assert!(!is_relevant(&APPLE, &late_mention));
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_newest_relevant_articles_up_to_limit() {
        let source = ScriptedNewsSource::new();
        source.respond(
            "AAPL",
            Ok(vec![
                article("Apple old", 100),
                article("Unrelated", 400),
                article("Apple newest", 300),
                article("AAPL middle", 200),
            ]),
        );
        let (from, to) = dates();
        let fetch = client(source, 2).fetch(&APPLE, from, to).await;
        assert!(fetch.failure.is_none());
        let heads: Vec<_> = fetch.items.iter().map(|i| i.headline.as_str()).collect();
        assert_eq!(heads, vec!["Apple newest", "AAPL middle"]);
        assert!(fetch.items.iter().all(|i| i.ticker == "AAPL" && i.sector == "Tech/Hardware"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_retried_with_backoff() {
        let source = ScriptedNewsSource::new();
        source.respond("AAPL", Err(AppError::RateLimited("Finnhub")));
        source.respond("AAPL", Ok(vec![article("Apple rallies", 10)]));
        let (from, to) = dates();
        let client = client(source, 2);
        let fetch = client.fetch(&APPLE, from, to).await;
        assert!(fetch.failure.is_none());
        assert_eq!(fetch.requests, 2);
        assert_eq!(fetch.items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_degrade_to_empty() {
        let source = ScriptedNewsSource::new();
        for _ in 0..3 {
            source.respond("AAPL", Err(AppError::Http { service: "Finnhub", status: 502, body: String::new() }));
        }
        let (from, to) = dates();
        let fetch = client(source, 2).fetch(&APPLE, from, to).await;
        assert!(fetch.items.is_empty());
        assert_eq!(fetch.requests, 3);
        assert!(matches!(fetch.failure, Some(AppError::Http { status: 502, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_is_surfaced_without_retry() {
        let source = ScriptedNewsSource::new();
        source.respond("AAPL", Err(AppError::Auth { service: "Finnhub", status: 401 }));
        let (from, to) = dates();
        let fetch = client(source, 2).fetch(&APPLE, from, to).await;
        assert_eq!(fetch.requests, 1);
        assert!(fetch.failure.unwrap().is_auth());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_input_issues_no_request() {
        let source = ScriptedNewsSource::new();
        let calls = source.calls();
        let bad = TickerEntry { symbol: "aapl!", ..APPLE };
        let (from, to) = dates();
        let client = client(source, 2);

        let fetch = client.fetch(&bad, from, to).await;
        assert!(matches!(fetch.failure, Some(AppError::Config(_))));

        let fetch = client.fetch(&APPLE, to, from).await;
        assert!(matches!(fetch.failure, Some(AppError::Config(_))));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_respect_pacing() {
        let source = ScriptedNewsSource::new();
        let calls = source.calls();
        let (from, to) = dates();
        let client = client(source, 2);
        let start = Instant::now();
        for _ in 0..3 {
            client.fetch(&APPLE, from, to).await;
        }
        let stamps: Vec<Instant> = calls.lock().unwrap().iter().map(|c| c.at).collect();
        assert_eq!(stamps.len(), 3);
        assert!(stamps[0] - start < Duration::from_millis(1));
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= client.pacing());
        }
    }
}
