use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::calendar::LookbackPolicy;
use super::context::{RunContext, RunIssue, Stage};
use crate::config::{Settings, TickerRegistry};
use crate::error::AppError;
use crate::modules::action::history::HistoryRow;
use crate::modules::action::report::{critical_alert, market_quiet_notice, Report, SubjectBlock};
use crate::modules::action::{DeliveryStatus, HistoryLogger, ReportDelivery, Trend};
use crate::modules::brain::{CompletionBackend, SentimentAnalyzer, SentimentResult};
use crate::modules::perception::news::log_progress;
use crate::modules::perception::{aggregate, NewsClient, NewsSource};
use crate::utils::notifier::ChatSink;
use crate::utils::pacer::CallPacer;

/// What a finished run reports back to `main`.
#[derive(Debug)]
pub struct RunOutcome {
    pub final_stage: Stage,
    pub report_text: String,
    pub delivery: Option<DeliveryStatus>,
    pub rows_written: usize,
    pub issues: Vec<RunIssue>,
    pub requests_issued: u32,
    pub results: Vec<SentimentResult>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.final_stage == Stage::Done
    }
}

/// The daily batch: fetch, aggregate, analyze, persist, deliver. Strictly
/// sequential; one run per instance call.
pub struct Pipeline<S: NewsSource, B: CompletionBackend, C: ChatSink> {
    registry: TickerRegistry,
    news: NewsClient<S>,
    analyzer: SentimentAnalyzer<B>,
    history: HistoryLogger,
    delivery: ReportDelivery<C>,
    lookback: LookbackPolicy,
    trend_days: i64,
}

impl<S: NewsSource, B: CompletionBackend, C: ChatSink> Pipeline<S, B, C> {
    pub fn from_settings(settings: &Settings, registry: TickerRegistry, source: S, backend: B, sink: C) -> Self {
        Self {
            registry,
            news: NewsClient::new(
                source,
                CallPacer::new(settings.call_spacing()),
                settings.news_retry_policy(),
                settings.max_articles_per_ticker,
            ),
            analyzer: SentimentAnalyzer::new(backend, settings.llm_retry_policy(), settings.max_summary_length),
            history: HistoryLogger::new(settings.history_path.clone()),
            delivery: ReportDelivery::new(sink, settings.delivery_retry_policy()),
            lookback: settings.lookback_policy(),
            trend_days: settings.trend_lookback_days,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> RunOutcome {
        let window = self.lookback.window(now);
        let mut ctx = RunContext::new(now, window);
        info!(
            "🚀 Run started: {} tickers, lookback {}h ({} -> {}){}",
            self.registry.all().len(),
            window.hours,
            window.from_date(),
            window.to_date(),
            if window.wide { " [non-trading day]" } else { "" }
        );

        ctx.enter(Stage::FetchNews);
        if let Err(e) = self.fetch_news(&mut ctx).await {
            return self.abort(ctx, "NewsProviderAuth", e).await;
        }

        ctx.enter(Stage::Aggregate);
        let aggregation = aggregate(&self.registry, &ctx.news);
        info!(
            "📦 Aggregated {} article(s): {} in {}, {} individual corpus(es)",
            aggregation.total_articles(),
            aggregation.fund.article_count(),
            aggregation.fund.subject,
            aggregation.individuals.len()
        );

        if aggregation.all_quiet() {
            warn!("🔇 No news for any subject in the window; sending market-quiet notice");
            ctx.enter(Stage::Deliver);
            let text = market_quiet_notice(window.market_date());
            ctx.delivery = Some(self.delivery.send(&text).await);
            ctx.aggregation = Some(aggregation);
            ctx.enter(Stage::Done);
            return finish(ctx, text);
        }

        ctx.enter(Stage::Analyze);
        for corpus in aggregation.corpora().filter(|c| !c.is_quiet()) {
            let result = self.analyzer.analyze(corpus, &corpus.subject).await;
            if result.degraded {
                let detail = result.note.clone().unwrap_or_else(|| "degraded result".to_string());
                ctx.record_issue(&result.subject, detail);
            }
            ctx.results.push(result);
        }
        ctx.aggregation = Some(aggregation);

        ctx.enter(Stage::LogHistory);
        self.log_history(&mut ctx);

        ctx.enter(Stage::Deliver);
        let text = self.build_report(&ctx).render();
        ctx.delivery = Some(self.delivery.send(&text).await);

        ctx.enter(Stage::Done);
        finish(ctx, text)
    }

    /// Per-ticker failures degrade to an empty list; rejected credentials end the run.
    async fn fetch_news(&self, ctx: &mut RunContext) -> Result<(), AppError> {
        let (from, to) = (ctx.window.from_date(), ctx.window.to_date());
        let total = self.registry.all().len();
        info!("📰 [News] fetching {} tickers ({} -> {}), pacing {:.1}s", total, from, to, self.news.pacing().as_secs_f64());

        for (idx, entry) in self.registry.all().iter().enumerate() {
            let fetch = self.news.fetch(entry, from, to).await;
            ctx.requests_issued += fetch.requests;
            log_progress(idx + 1, total, &fetch);

            match fetch.failure {
                Some(e) if e.is_auth() => return Err(e),
                Some(e) => ctx.record_issue(&fetch.symbol, e.user_detail()),
                None => {}
            }
            ctx.news.push(&fetch.symbol, fetch.items);
        }

        info!(
            "📰 [News] {} article(s) across {}/{} tickers, {} request(s)",
            ctx.news.total_articles(),
            ctx.news.tickers_with_news(),
            ctx.news.ticker_count(),
            ctx.requests_issued
        );
        Ok(())
    }

    fn log_history(&self, ctx: &mut RunContext) {
        let rows: Vec<HistoryRow> = ctx
            .results
            .iter()
            .map(|r| HistoryRow::from_result(r, ctx.started_at))
            .collect();
        match self.history.append(&rows) {
            Ok(n) => ctx.rows_written = n,
            Err(e) => {
                error!("❌ Could not write history to {}: {}", self.history.path().display(), e);
                ctx.history_error = Some(e.user_detail());
            }
        }
    }

    fn build_report(&self, ctx: &RunContext) -> Report {
        let blocks = ctx
            .results
            .iter()
            .map(|r| SubjectBlock {
                result: r.clone(),
                trend: self.trend_for(r, ctx.started_at),
            })
            .collect();

        let no_news = ctx
            .aggregation
            .as_ref()
            .map(|a| a.corpora().filter(|c| c.is_quiet()).map(|c| c.subject.clone()).collect())
            .unwrap_or_default();

        Report {
            date: ctx.window.market_date(),
            blocks,
            total_articles: ctx.aggregation.as_ref().map_or(0, |a| a.total_articles()),
            runtime: ctx.started.elapsed(),
            lookback_hours: ctx.window.hours,
            trend_days: self.trend_days,
            no_news,
            issues: ctx.issues.clone(),
            history_warning: ctx.history_error.clone(),
        }
    }

    fn trend_for(&self, result: &SentimentResult, now: DateTime<Utc>) -> Option<Trend> {
        result.score?;
        match self.history.trend_at(&result.subject, self.trend_days, now) {
            Ok(trend) => Some(trend),
            Err(e) => {
                warn!("Trend unavailable for {}: {}", result.subject, e);
                None
            }
        }
    }

    async fn abort(&self, mut ctx: RunContext, error_type: &str, e: AppError) -> RunOutcome {
        error!("🔥 Run aborted during {}: {}", ctx.stage, e);
        ctx.record_issue(error_type, e.user_detail());
        ctx.fail();

        let text = critical_alert(error_type, &e.user_detail(), ctx.started_at);
        if !self.delivery.alert(&text).await {
            warn!("Critical alert could not be delivered");
        }
        finish(ctx, text)
    }
}

fn finish(ctx: RunContext, report_text: String) -> RunOutcome {
    debug_assert!(ctx.stage.is_terminal());
    info!(
        "🏁 Run finished: stage={} results={} rows={} issues={}",
        ctx.stage,
        ctx.results.len(),
        ctx.rows_written,
        ctx.issues.len()
    );
    RunOutcome {
        final_stage: ctx.stage,
        report_text,
        delivery: ctx.delivery,
        rows_written: ctx.rows_written,
        issues: ctx.issues,
        requests_issued: ctx.requests_issued,
        results: ctx.results,
    }
}
