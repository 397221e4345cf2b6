use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::AppResult;
use crate::modules::brain::SentimentResult;

/// One persisted score. The first four columns are the stable schema; later
/// columns are optional so older files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub sentiment_score: Option<u8>,
    #[serde(default)]
    pub article_count: usize,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub degraded: bool,
}

impl HistoryRow {
    pub fn from_result(result: &SentimentResult, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            ticker: result.subject.clone(),
            sentiment_score: result.score,
            article_count: result.article_count,
            summary: result.summary.join(" | "),
            degraded: result.degraded,
        }
    }
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` taken as UTC.
fn lenient_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(de)?;
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{}'", raw)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn arrow(self) -> &'static str {
        match self {
            TrendDirection::Up => "↑",
            TrendDirection::Down => "↓",
            TrendDirection::Flat => "→",
        }
    }
}

/// Summary over the scored rows of one ticker in a window.
#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub count: usize,
    pub mean: Option<f64>,
    pub latest: Option<u8>,
    pub direction: TrendDirection,
}

/// Append-only CSV log. Single writer assumed.
pub struct HistoryLogger {
    path: PathBuf,
}

impl HistoryLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends every row; writes the header only for a new or empty file.
    pub fn append(&self, rows: &[HistoryRow]) -> AppResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(needs_header).from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        info!("💾 [History] appended {} row(s) to {}", rows.len(), self.path.display());
        Ok(rows.len())
    }

    /// Every readable row in file order. A missing file is an empty history.
    pub fn read_all(&self) -> AppResult<Vec<HistoryRow>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut rows = Vec::new();
        for (idx, record) in reader.deserialize::<HistoryRow>().enumerate() {
            match record {
                Ok(row) => rows.push(row),
                // line numbers are 1-based and the header is line 1
                Err(e) => warn!("Skipping unreadable history line {}: {}", idx + 2, e),
            }
        }
        Ok(rows)
    }

    /// Rows for `ticker` within `[now - lookback_days, now]`, oldest first.
    /// `now` is the run's clock so a whole run sees one window; a span past
    /// chrono's range reads everything since the epoch.
    pub fn query(&self, ticker: &str, lookback_days: i64, now: DateTime<Utc>) -> AppResult<Vec<HistoryRow>> {
        let cutoff = Duration::try_days(lookback_days)
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or_default();
        let mut rows: Vec<HistoryRow> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.ticker == ticker && r.timestamp >= cutoff && r.timestamp <= now)
            .collect();
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }

    pub fn trend_at(&self, ticker: &str, lookback_days: i64, now: DateTime<Utc>) -> AppResult<Trend> {
        let rows = self.query(ticker, lookback_days, now)?;
        Ok(compute_trend(&rows))
    }
}

/// Mean and direction of `latest - mean`; flat below two scored rows.
pub fn compute_trend(rows: &[HistoryRow]) -> Trend {
    let scores: Vec<u8> = rows.iter().filter_map(|r| r.sentiment_score).collect();
    let count = scores.len();
    let latest = scores.last().copied();
    let mean = (count > 0).then(|| scores.iter().map(|&s| f64::from(s)).sum::<f64>() / count as f64);

    let direction = match (count, latest, mean) {
        (n, Some(latest), Some(mean)) if n >= 2 => {
            let delta = f64::from(latest) - mean;
            if delta > 1e-9 {
                TrendDirection::Up
            } else if delta < -1e-9 {
                TrendDirection::Down
            } else {
                TrendDirection::Flat
            }
        }
        _ => TrendDirection::Flat,
    };

    Trend { count, mean, latest, direction }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn row(ticker: &str, score: Option<u8>, ts: DateTime<Utc>) -> HistoryRow {
        HistoryRow {
            timestamp: ts,
            ticker: ticker.to_string(),
            sentiment_score: score,
            article_count: 3,
            summary: "a | b".to_string(),
            degraded: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 21, 30, 0).unwrap()
    }

    #[test]
    fn append_creates_parent_and_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("history.csv");
        let logger = HistoryLogger::new(&path);

        logger.append(&[row("FNILX", Some(7), now())]).unwrap();
        logger.append(&[row("UURAF", None, now())]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,ticker,sentiment_score,article_count,summary,degraded");
        assert_eq!(lines.len(), 3);
        assert_eq!(text.matches("timestamp,ticker").count(), 1);

        let rows = logger.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sentiment_score, Some(7));
        assert_eq!(rows[0].summary, "a | b");
        assert_eq!(rows[1].sentiment_score, None);
    }

    #[test]
    fn query_filters_window_and_sorts_ascending() {
        let dir = tempdir().unwrap();
        let logger = HistoryLogger::new(dir.path().join("h.csv"));
        let day = Duration::days(1);
        logger
            .append(&[
                row("FNILX", Some(5), now() - day * 2),
                row("FNILX", Some(4), now() - day * 40),
                row("UURAF", Some(6), now() - day),
                row("FNILX", Some(8), now() - day * 6),
                row("FNILX", Some(9), now() + day),
            ])
            .unwrap();

        let rows = logger.query("FNILX", 30, now()).unwrap();
        let scores: Vec<_> = rows.iter().map(|r| r.sentiment_score).collect();
        assert_eq!(scores, vec![Some(8), Some(5)]);
        assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(rows.iter().all(|r| r.ticker == "FNILX" && r.timestamp >= now() - day * 30));

        assert!(logger.query("MSFT", 30, now()).unwrap().is_empty());

        let everything = logger.query("FNILX", i64::MAX, now()).unwrap();
        assert_eq!(everything.len(), 3);
        let trend = logger.trend_at("FNILX", 1_000_000_000, now()).unwrap();
        assert_eq!(trend.count, 3);
    }

    #[test]
    fn legacy_four_column_file_still_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        fs::write(
            &path,
            "timestamp,ticker,sentiment_score,article_count\n\
             2026-10-10T21:00:00,FNILX,6,12\n\
             2026-10-11 21:00:00,FNILX,,0\n\
             not-a-date,FNILX,5,1\n",
        )
        .unwrap();
        let logger = HistoryLogger::new(&path);
        let rows = logger.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sentiment_score, Some(6));
        assert_eq!(rows[0].article_count, 12);
        assert!(rows[0].summary.is_empty());
        assert_eq!(rows[1].sentiment_score, None);

        logger.append(&[row("FNILX", Some(7), now())]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("timestamp,ticker").count(), 1);
        assert_eq!(logger.read_all().unwrap().len(), 3);
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempdir().unwrap();
        let logger = HistoryLogger::new(dir.path().join("nope.csv"));
        assert!(logger.read_all().unwrap().is_empty());
        assert_eq!(logger.trend_at("FNILX", 30, now()).unwrap().direction, TrendDirection::Flat);
    }

    #[test]
    fn trend_direction() {
        let t = |scores: &[Option<u8>]| {
            let rows: Vec<_> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| row("FNILX", *s, now() + Duration::hours(i as i64)))
                .collect();
            compute_trend(&rows)
        };

        let up = t(&[Some(4), Some(5), Some(9)]);
        assert_eq!(up.direction, TrendDirection::Up);
        assert_eq!(up.count, 3);
        assert_eq!(up.latest, Some(9));
        assert!((up.mean.unwrap() - 6.0).abs() < 1e-9);

        assert_eq!(t(&[Some(8), Some(2)]).direction, TrendDirection::Down);
        assert_eq!(t(&[Some(5), Some(5)]).direction, TrendDirection::Flat);
        assert_eq!(t(&[Some(9), None]).direction, TrendDirection::Flat);
        assert_eq!(t(&[]).mean, None);
    }
}
