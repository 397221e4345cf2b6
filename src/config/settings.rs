use chrono::{NaiveDate, Weekday};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::modules::pipeline::calendar::LookbackPolicy;
use crate::utils::retry::RetryPolicy;

const MAX_LOOKBACK_HOURS: i64 = 720;
const MAX_TREND_DAYS: i64 = 3650;
const MAX_DELAY_SECONDS: f64 = 3600.0;

/// Values as they arrive from the environment / optional settings file,
/// before validation. Required keys are optional here so that every missing
/// key can be reported at once.
#[derive(Debug, Deserialize, Clone)]
struct RawSettings {
    news_api_key: Option<String>,
    llm_api_key: Option<String>,
    chat_bot_token: Option<String>,
    chat_id: Option<String>,

    #[serde(default = "default_rate_limit")]
    rate_limit_calls_per_minute: u32,
    #[serde(default = "default_call_delay")]
    call_delay_seconds: f64,
    #[serde(default = "default_max_articles")]
    max_articles_per_ticker: usize,
    #[serde(default = "default_lookback_hours")]
    default_lookback_hours: i64,
    #[serde(default = "default_weekend_lookback_hours")]
    weekend_lookback_hours: i64,
    #[serde(default = "default_model")]
    llm_model_name: String,
    #[serde(default = "default_temperature")]
    llm_temperature: f64,
    #[serde(default = "default_summary_length")]
    max_summary_length: usize,

    #[serde(default = "default_max_tokens")]
    llm_max_tokens: u32,
    #[serde(default = "default_news_base_url")]
    news_base_url: String,
    #[serde(default = "default_llm_base_url")]
    llm_base_url: String,
    #[serde(default = "default_chat_base_url")]
    chat_base_url: String,
    #[serde(default = "default_history_path")]
    history_path: String,

    #[serde(default = "default_retry_attempts")]
    retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay")]
    retry_base_delay_seconds: f64,
    #[serde(default = "default_retry_multiplier")]
    retry_multiplier: f64,
    #[serde(default = "default_retry_max_delay")]
    retry_max_delay_seconds: f64,
    #[serde(default = "default_retry_jitter")]
    retry_jitter: f64,
    #[serde(default = "default_short_attempts")]
    llm_max_attempts: u32,
    #[serde(default = "default_short_attempts")]
    delivery_max_attempts: u32,

    #[serde(default = "default_wide_days")]
    wide_lookback_days: String,
    #[serde(default)]
    market_holidays: String,
    #[serde(default = "default_utc_offset")]
    market_utc_offset_hours: i32,
    #[serde(default = "default_trend_days")]
    trend_lookback_days: i64,
}

fn default_rate_limit() -> u32 { 60 }
fn default_call_delay() -> f64 { 1.1 }
fn default_max_articles() -> usize { 2 }
fn default_lookback_hours() -> i64 { 24 }
fn default_weekend_lookback_hours() -> i64 { 72 }
fn default_model() -> String { "llama-3.1-8b-instant".to_string() }
fn default_temperature() -> f64 { 0.3 }
fn default_summary_length() -> usize { 200 }
fn default_max_tokens() -> u32 { 1024 }
fn default_news_base_url() -> String { "https://finnhub.io/api/v1".to_string() }
fn default_llm_base_url() -> String { "https://api.groq.com/openai/v1".to_string() }
fn default_chat_base_url() -> String { "https://api.telegram.org".to_string() }
fn default_history_path() -> String { "data/sentiment_history.csv".to_string() }
fn default_retry_attempts() -> u32 { 5 }
fn default_retry_base_delay() -> f64 { 2.0 }
fn default_retry_multiplier() -> f64 { 2.0 }
fn default_retry_max_delay() -> f64 { 30.0 }
fn default_retry_jitter() -> f64 { 0.1 }
fn default_short_attempts() -> u32 { 3 }
fn default_wide_days() -> String { "Sat,Sun".to_string() }
fn default_utc_offset() -> i32 { -5 }
fn default_trend_days() -> i64 { 30 }

#[derive(Debug, Clone)]
pub struct Settings {
    pub news_api_key: String,
    pub llm_api_key: String,
    pub chat_bot_token: String,
    pub chat_id: String,

    pub rate_limit_calls_per_minute: u32,
    pub call_delay_seconds: f64,
    pub max_articles_per_ticker: usize,
    pub default_lookback_hours: i64,
    pub weekend_lookback_hours: i64,
    pub llm_model_name: String,
    pub llm_temperature: f64,
    pub max_summary_length: usize,

    pub llm_max_tokens: u32,
    pub news_base_url: String,
    pub llm_base_url: String,
    pub chat_base_url: String,
    pub history_path: PathBuf,

    pub retry_max_attempts: u32,
    pub retry_base_delay_seconds: f64,
    pub retry_multiplier: f64,
    pub retry_max_delay_seconds: f64,
    pub retry_jitter: f64,
    pub llm_max_attempts: u32,
    pub delivery_max_attempts: u32,

    pub wide_lookback_days: Vec<Weekday>,
    pub market_holidays: Vec<NaiveDate>,
    pub market_utc_offset_hours: i32,
    pub trend_lookback_days: i64,
}

impl Settings {
    /// Loads `.env`, an optional `close_notice.*` file, then the process
    /// environment (highest precedence).
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_sources(Some("close_notice"), Environment::default())
    }

    fn from_sources(file: Option<&str>, env: Environment) -> AppResult<Self> {
        let mut builder = Config::builder();
        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).required(false));
        }
        let raw: RawSettings = builder
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::Config(e.to_string()))?;
        Self::validate(raw)
    }

    fn validate(raw: RawSettings) -> AppResult<Self> {
        let mut problems: Vec<String> = Vec::new();

        let mut required = |name: &str, value: Option<String>| -> String {
            match value.map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    problems.push(format!("missing required setting {}", name.to_uppercase()));
                    String::new()
                }
            }
        };
        let news_api_key = required("news_api_key", raw.news_api_key);
        let llm_api_key = required("llm_api_key", raw.llm_api_key);
        let chat_bot_token = required("chat_bot_token", raw.chat_bot_token);
        let chat_id = required("chat_id", raw.chat_id);

        if raw.rate_limit_calls_per_minute == 0 {
            problems.push("RATE_LIMIT_CALLS_PER_MINUTE must be > 0".to_string());
        }
        for (name, value, max) in [
            ("CALL_DELAY_SECONDS", raw.call_delay_seconds, MAX_DELAY_SECONDS),
            ("RETRY_BASE_DELAY_SECONDS", raw.retry_base_delay_seconds, MAX_DELAY_SECONDS),
            ("RETRY_MAX_DELAY_SECONDS", raw.retry_max_delay_seconds, MAX_DELAY_SECONDS),
            ("RETRY_JITTER", raw.retry_jitter, 1.0),
        ] {
            if !value.is_finite() || !(0.0..=max).contains(&value) {
                problems.push(format!("{} must be within [0, {}]", name, max));
            }
        }
        if !raw.retry_multiplier.is_finite() || raw.retry_multiplier < 1.0 {
            problems.push("RETRY_MULTIPLIER must be >= 1.0".to_string());
        }
        for (name, value) in [
            ("RETRY_MAX_ATTEMPTS", raw.retry_max_attempts),
            ("LLM_MAX_ATTEMPTS", raw.llm_max_attempts),
            ("DELIVERY_MAX_ATTEMPTS", raw.delivery_max_attempts),
            ("LLM_MAX_TOKENS", raw.llm_max_tokens),
        ] {
            if value == 0 {
                problems.push(format!("{} must be > 0", name));
            }
        }
        if raw.max_articles_per_ticker == 0 {
            problems.push("MAX_ARTICLES_PER_TICKER must be > 0".to_string());
        }
        if raw.max_summary_length == 0 {
            problems.push("MAX_SUMMARY_LENGTH must be > 0".to_string());
        }
        for (name, value) in [
            ("DEFAULT_LOOKBACK_HOURS", raw.default_lookback_hours),
            ("WEEKEND_LOOKBACK_HOURS", raw.weekend_lookback_hours),
        ] {
            if !(1..=MAX_LOOKBACK_HOURS).contains(&value) {
                problems.push(format!("{} must be within [1, {}]", name, MAX_LOOKBACK_HOURS));
            }
        }
        if !(1..=MAX_TREND_DAYS).contains(&raw.trend_lookback_days) {
            problems.push(format!("TREND_LOOKBACK_DAYS must be within [1, {}]", MAX_TREND_DAYS));
        }
        if !(0.0..=2.0).contains(&raw.llm_temperature) {
            problems.push("LLM_TEMPERATURE must be within [0, 2]".to_string());
        }
        if raw.llm_model_name.trim().is_empty() {
            problems.push("LLM_MODEL_NAME must not be empty".to_string());
        }
        if !(-12..=14).contains(&raw.market_utc_offset_hours) {
            problems.push("MARKET_UTC_OFFSET_HOURS must be within [-12, 14]".to_string());
        }
        for (name, value) in [
            ("NEWS_BASE_URL", &raw.news_base_url),
            ("LLM_BASE_URL", &raw.llm_base_url),
            ("CHAT_BASE_URL", &raw.chat_base_url),
        ] {
            if let Err(e) = Url::parse(value) {
                problems.push(format!("{} is not a valid URL ({}): {}", name, value, e));
            }
        }

        let wide_lookback_days = split_list(&raw.wide_lookback_days)
            .filter_map(|day| match day.parse::<Weekday>() {
                Ok(d) => Some(d),
                Err(_) => {
                    problems.push(format!("WIDE_LOOKBACK_DAYS has unknown weekday '{}'", day));
                    None
                }
            })
            .collect();
        let market_holidays = split_list(&raw.market_holidays)
            .filter_map(|date| match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(_) => {
                    problems.push(format!("MARKET_HOLIDAYS has invalid date '{}'", date));
                    None
                }
            })
            .collect();

        if !problems.is_empty() {
            return Err(AppError::Config(problems.join("; ")));
        }

        Ok(Self {
            news_api_key,
            llm_api_key,
            chat_bot_token,
            chat_id,
            rate_limit_calls_per_minute: raw.rate_limit_calls_per_minute,
            call_delay_seconds: raw.call_delay_seconds,
            max_articles_per_ticker: raw.max_articles_per_ticker,
            default_lookback_hours: raw.default_lookback_hours,
            weekend_lookback_hours: raw.weekend_lookback_hours,
            llm_model_name: raw.llm_model_name.trim().to_string(),
            llm_temperature: raw.llm_temperature,
            max_summary_length: raw.max_summary_length,
            llm_max_tokens: raw.llm_max_tokens,
            news_base_url: raw.news_base_url.trim_end_matches('/').to_string(),
            llm_base_url: raw.llm_base_url.trim_end_matches('/').to_string(),
            chat_base_url: raw.chat_base_url.trim_end_matches('/').to_string(),
            history_path: PathBuf::from(raw.history_path),
            retry_max_attempts: raw.retry_max_attempts,
            retry_base_delay_seconds: raw.retry_base_delay_seconds,
            retry_multiplier: raw.retry_multiplier,
            retry_max_delay_seconds: raw.retry_max_delay_seconds,
            retry_jitter: raw.retry_jitter,
            llm_max_attempts: raw.llm_max_attempts,
            delivery_max_attempts: raw.delivery_max_attempts,
            wide_lookback_days,
            market_holidays,
            market_utc_offset_hours: raw.market_utc_offset_hours,
            trend_lookback_days: raw.trend_lookback_days,
        })
    }

    /// Spacing between news calls: the configured delay, but never faster
    /// than the per-minute quota allows.
    pub fn call_spacing(&self) -> Duration {
        let quota_gap = 60.0 / self.rate_limit_calls_per_minute as f64;
        Duration::from_secs_f64(self.call_delay_seconds.max(quota_gap))
    }

    pub fn news_retry_policy(&self) -> RetryPolicy {
        self.retry_policy(self.retry_max_attempts)
    }

    pub fn llm_retry_policy(&self) -> RetryPolicy {
        self.retry_policy(self.llm_max_attempts)
    }

    pub fn delivery_retry_policy(&self) -> RetryPolicy {
        self.retry_policy(self.delivery_max_attempts)
    }

    fn retry_policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs_f64(self.retry_base_delay_seconds),
            multiplier: self.retry_multiplier,
            max_delay: Duration::from_secs_f64(self.retry_max_delay_seconds),
            jitter: self.retry_jitter,
        }
    }

    pub fn lookback_policy(&self) -> LookbackPolicy {
        LookbackPolicy {
            default_hours: self.default_lookback_hours,
            wide_hours: self.weekend_lookback_hours,
            wide_days: self.wide_lookback_days.clone(),
            holidays: self.market_holidays.clone(),
            utc_offset_hours: self.market_utc_offset_hours,
        }
    }

    /// One-line description for the startup log. Secrets are not included.
    pub fn summary(&self) -> String {
        format!(
            "model={} temp={} pacing={:.2}s max_articles={} lookback={}h/{}h wide_days={:?} holidays={} history={}",
            self.llm_model_name,
            self.llm_temperature,
            self.call_spacing().as_secs_f64(),
            self.max_articles_per_ticker,
            self.default_lookback_hours,
            self.weekend_lookback_hours,
            self.wide_lookback_days,
            self.market_holidays.len(),
            self.history_path.display()
        )
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
impl Settings {
    /// Builds settings from explicit key/value pairs, ignoring the real
    /// environment and any settings file.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> AppResult<Self> {
        let map: config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::from_sources(None, Environment::default().source(Some(map)))
    }

    pub fn for_tests() -> Self {
        Self::from_pairs(&[
            ("NEWS_API_KEY", "news-key"),
            ("LLM_API_KEY", "llm-key"),
            ("CHAT_BOT_TOKEN", "bot-token"),
            ("CHAT_ID", "-1001234"),
        ])
        .unwrap()
    }
}
