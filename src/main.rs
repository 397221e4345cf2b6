mod config;
mod error;
mod modules;
mod utils;

#[cfg(test)]
mod test_support;

use anyhow::{bail, Context};
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Settings, TickerRegistry};
use crate::modules::brain::ChatCompletionsBackend;
use crate::modules::perception::FinnhubSource;
use crate::modules::pipeline::Pipeline;
use crate::utils::http_client::HttpClientFactory;
use crate::utils::notifier::TelegramNotifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    info!("Starting close_notice v{}...", env!("CARGO_PKG_VERSION"));

    // nothing touches the network until settings are valid
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            error!("CRITICAL: {}", e);
            return Err(e).context("configuration is incomplete; aborting before any API call");
        }
    };
    info!("⚙️ {}", settings.summary());

    let std_client = HttpClientFactory::create()?;
    let llm_client = HttpClientFactory::create_llm()?;

    let source = FinnhubSource::new(std_client.clone(), &settings.news_base_url, &settings.news_api_key);
    let backend = ChatCompletionsBackend::new(
        llm_client,
        &settings.llm_base_url,
        &settings.llm_api_key,
        &settings.llm_model_name,
        settings.llm_temperature,
        settings.llm_max_tokens,
    );
    let notifier = TelegramNotifier::new(
        std_client,
        &settings.chat_base_url,
        &settings.chat_bot_token,
        &settings.chat_id,
    );

    let pipeline = Pipeline::from_settings(&settings, TickerRegistry::standard(), source, backend, notifier);
    let outcome = pipeline.run(Utc::now()).await;

    if let Some(status) = outcome.delivery.as_ref().filter(|s| !s.is_delivered()) {
        warn!("Report was not delivered: {:?}", status);
        warn!("Undelivered report follows:\n{}", outcome.report_text);
    }

    if !outcome.succeeded() {
        let detail = outcome
            .issues
            .last()
            .map(|i| format!("{}: {}", i.subject, i.detail))
            .unwrap_or_default();
        bail!("run ended in {} ({})", outcome.final_stage, detail);
    }

    info!(
        "✅ Done: {}/{} subject(s) scored, {} history row(s), {} news request(s), {} issue(s)",
        outcome.results.iter().filter(|r| !r.is_sentinel()).count(),
        outcome.results.len(),
        outcome.rows_written,
        outcome.requests_issued,
        outcome.issues.len()
    );
    Ok(())
}
