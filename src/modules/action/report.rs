use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Write as _;
use std::time::Duration;

use super::history::Trend;
use crate::modules::brain::prompts::{sentiment_emoji, sentiment_label};
use crate::modules::brain::SentimentResult;
use crate::modules::pipeline::context::RunIssue;

const MAX_INSIGHT_LINES: usize = 3;

#[derive(Debug, Clone)]
pub struct SubjectBlock {
    pub result: SentimentResult,
    pub trend: Option<Trend>,
}

/// Everything the daily message shows. Rendered once, then discarded.
#[derive(Debug, Clone)]
pub struct Report {
    pub date: NaiveDate,
    pub blocks: Vec<SubjectBlock>,
    pub total_articles: usize,
    pub runtime: Duration,
    pub lookback_hours: i64,
    pub trend_days: i64,
    pub no_news: Vec<String>,
    pub issues: Vec<RunIssue>,
    pub history_warning: Option<String>,
}

impl Report {
    pub fn render(&self) -> String {
        let mut msg = header(self.date);

        for block in &self.blocks {
            self.render_block(&mut msg, block);
            msg.push('\n');
        }

        msg.push_str("---\n");
        let _ = writeln!(msg, "📊 Articles analyzed: {}", self.total_articles);
        let _ = writeln!(msg, "⏱️ Runtime: {}", format_runtime(self.runtime));
        let _ = writeln!(msg, "🕒 Lookback: {}h", self.lookback_hours);

        if !self.no_news.is_empty() {
            let _ = writeln!(msg, "\nNo news today: {}", self.no_news.join(", "));
        }

        if self.issues.is_empty() {
            msg.push_str("\n✅ All analyses successful\n");
        } else {
            let _ = writeln!(msg, "\n⚠️ {} issue(s):", self.issues.len());
            for issue in &self.issues {
                let _ = writeln!(msg, "• {}: {}", issue.subject, issue.detail);
            }
            msg.push_str("Check logs for full details\n");
        }

        if let Some(warning) = &self.history_warning {
            let _ = writeln!(msg, "\n💾 History not saved: {}", warning);
        }

        msg.trim_end().to_string()
    }

    fn render_block(&self, msg: &mut String, block: &SubjectBlock) {
        let r = &block.result;
        let Some(score) = r.score else {
            let _ = writeln!(msg, "⚠️ {} | Score: n/a", r.subject);
            if let Some(note) = &r.note {
                let _ = writeln!(msg, "{}", note);
            }
            return;
        };

        let _ = writeln!(
            msg,
            "{} {} | Score: {}/10 ({})",
            sentiment_emoji(score),
            r.subject,
            score,
            sentiment_label(score)
        );
        for insight in r.summary.iter().take(MAX_INSIGHT_LINES) {
            let _ = writeln!(msg, "• {}", insight);
        }
        if let Some(trend) = block.trend.as_ref().filter(|t| t.count >= 2) {
            if let Some(mean) = trend.mean {
                let _ = writeln!(msg, "{}d avg {:.1} {}", self.trend_days, mean, trend.direction.arrow());
            }
        }
        if r.degraded {
            if let Some(note) = &r.note {
                let _ = writeln!(msg, "⚠️ {}", note);
            }
        }
    }
}

fn header(date: NaiveDate) -> String {
    format!("📊 Daily Analysis - {}\n\n", date.format("%b %d, %Y"))
}

/// Sent instead of the report when no subject had any news.
pub fn market_quiet_notice(date: NaiveDate) -> String {
    let mut msg = header(date);
    msg.push_str("🔇 Market Quiet\n\n");
    msg.push_str("No new news articles found in the lookback window.\n");
    msg.push_str("This is likely a weekend or market holiday.\n\n");
    msg.push_str("Analysis will resume on the next trading day.");
    msg
}

pub fn critical_alert(error_type: &str, message: &str, at: DateTime<Utc>) -> String {
    format!(
        "🚨 CRITICAL SYSTEM ERROR\n\nType: {}\nMessage: {}\n\nCheck the run logs for details.\nTime: {}",
        error_type,
        message,
        at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Whole minutes and seconds, e.g. `1m 25s`.
pub fn format_runtime(runtime: Duration) -> String {
    let secs = runtime.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::action::history::TrendDirection;
    use crate::modules::pipeline::context::Stage;

    fn scored(subject: &str, score: u8, summary: &[&str]) -> SentimentResult {
        SentimentResult {
            subject: subject.into(),
            score: Some(score),
            summary: summary.iter().map(|s| s.to_string()).collect(),
            rationale: String::new(),
            article_count: 4,
            degraded: false,
            note: None,
        }
    }

    fn report(blocks: Vec<SubjectBlock>) -> Report {
        Report {
            date: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            blocks,
            total_articles: 37,
            runtime: Duration::from_secs(85),
            lookback_hours: 24,
            trend_days: 30,
            no_news: Vec::new(),
            issues: Vec::new(),
            history_warning: None,
        }
    }

    #[test]
    fn renders_blocks_and_footer() {
        let text = report(vec![
            SubjectBlock {
                result: scored("FNILX", 7, &["Broad rally", "Tech leads", "Rates steady", "extra"]),
                trend: Some(Trend { count: 5, mean: Some(6.24), latest: Some(7), direction: TrendDirection::Up }),
            },
            SubjectBlock { result: scored("UURAF", 2, &[]), trend: None },
        ])
        .render();

        assert!(text.starts_with("📊 Daily Analysis - Oct 14, 2026\n\n"));
        assert!(text.contains("📈 FNILX | Score: 7/10 (Bullish)\n• Broad rally\n• Tech leads\n• Rates steady\n30d avg 6.2 ↑"));
        assert!(!text.contains("extra"));
        assert!(text.contains("📉 UURAF | Score: 2/10 (Bearish)"));
        assert!(text.contains("📊 Articles analyzed: 37"));
        assert!(text.contains("⏱️ Runtime: 1m 25s"));
        assert!(text.ends_with("✅ All analyses successful"));
    }

    #[test]
    fn sentinels_issues_and_quiet_subjects_are_listed() {
        let mut r = report(vec![SubjectBlock {
            result: SentimentResult::sentinel("FNILX", 12, "Connection timeout - API not responding"),
            trend: None,
        }]);
        r.no_news = vec!["UURAF".into()];
        r.issues = vec![RunIssue {
            subject: "FNILX".into(),
            stage: Stage::Analyze,
            detail: "Connection timeout - API not responding".into(),
        }];
        r.history_warning = Some("IO error: permission denied".into());

        let text = r.render();
        assert!(text.contains("⚠️ FNILX | Score: n/a\nConnection timeout - API not responding"));
        assert!(text.contains("No news today: UURAF"));
        assert!(text.contains("⚠️ 1 issue(s):\n• FNILX: Connection timeout - API not responding"));
        assert!(!text.contains("All analyses successful"));
        assert!(text.contains("History not saved"));
    }

    #[test]
    fn auxiliary_messages() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let quiet = market_quiet_notice(date);
        assert!(quiet.starts_with("📊 Daily Analysis - Oct 17, 2026"));
        assert!(quiet.contains("Market Quiet"));

        let at = DateTime::parse_from_rfc3339("2026-10-17T21:30:00Z").unwrap().with_timezone(&Utc);
        let alert = critical_alert("NewsAuth", "401 Unauthorized - check API key", at);
        assert!(alert.starts_with("🚨 CRITICAL SYSTEM ERROR"));
        assert!(alert.contains("Type: NewsAuth"));
        assert!(alert.contains("Time: 2026-10-17 21:30:00 UTC"));

        assert_eq!(format_runtime(Duration::from_secs(59)), "0m 59s");
        assert_eq!(format_runtime(Duration::from_millis(125_900)), "2m 5s");
    }
}
