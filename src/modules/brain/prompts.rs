use std::fmt::Write as _;

use crate::config::tickers::{is_top_weight, TOP_WEIGHTS};
use crate::modules::perception::structs::{Corpus, CorpusKind, NewsItem};

pub const SYSTEM_PROMPT: &str = "You are a disciplined equity research analyst. \
You only use the news supplied in the request, never your training data, and you always answer with a single JSON object.";

/// Marker the model is told to put in `rationale` when the news is too thin.
pub const INSUFFICIENT_DATA: &str = "Insufficient Data";

const JSON_CONTRACT: &str = r#"Respond with ONLY this JSON object (no markdown, no commentary):
{
  "ticker": "<subject>",
  "sentiment_score": <integer 0-10>,
  "top_insights": ["<insight 1>", "<insight 2>", "<insight 3>"],
  "rationale": "<short explanation, or 'Insufficient Data'>"
}

Scale: 0-3 Bearish (negative developments dominate), 4-6 Neutral (mixed or low conviction), 7-10 Bullish (positive catalysts dominate)."#;

/// Builds the user prompt for a corpus. Output depends only on the inputs.
pub fn build_prompt(corpus: &Corpus, subject_label: &str, max_summary_len: usize) -> String {
    match &corpus.kind {
        CorpusKind::Fund { total_holdings } => {
            fund_prompt(subject_label, &corpus.items, corpus.active_tickers(), *total_holdings, max_summary_len)
        }
        CorpusKind::Individual { sector } => individual_prompt(subject_label, sector, &corpus.items, max_summary_len),
    }
}

fn fund_prompt(fund: &str, items: &[NewsItem], active: usize, total: usize, max_summary_len: usize) -> String {
    let mut articles = String::new();
    for item in items {
        let weight = if is_top_weight(&item.ticker) { " - TOP WEIGHT" } else { "" };
        let _ = writeln!(articles, "[{} - {}{}]", item.ticker, item.sector, weight);
        write_article(&mut articles, item, max_summary_len);
    }

    format!(
        "Assess aggregate news sentiment for the index fund {fund}.\n\n\
         Coverage: {active} of {total} holdings had news in this window; the rest had none.\n\n\
         Sector-tagged articles:\n{articles}\n\
         Instructions:\n\
         1. If the articles are too sparse or stale to judge, put \"{insufficient}\" in the rationale. Do not guess from prior knowledge.\n\
         2. The fund is market-cap weighted. State whether sentiment is driven by the top weights ({tops}) or by breadth across smaller holdings.\n\
         3. Call out any sector rotation or dominant sector theme.\n\
         4. Mention macro drivers (rates, policy, earnings season) only where the articles support them.\n\n\
         {contract}\n",
        fund = fund,
        active = active,
        total = total,
        articles = articles,
        insufficient = INSUFFICIENT_DATA,
        tops = TOP_WEIGHTS.join(", "),
        contract = JSON_CONTRACT.replace("<subject>", fund),
    )
}

fn individual_prompt(ticker: &str, sector: &str, items: &[NewsItem], max_summary_len: usize) -> String {
    let mut articles = String::new();
    for item in items {
        write_article(&mut articles, item, max_summary_len);
    }

    format!(
        "Assess news sentiment for {ticker} ({sector}).\n\n\
         Articles:\n{articles}\n\
         Instructions:\n\
         1. If the articles are too sparse or stale to judge, put \"{insufficient}\" in the rationale. Do not guess from prior knowledge.\n\
         2. Weigh catalysts specific to {sector}: {catalysts}.\n\
         3. Focus on company-specific news rather than general market commentary.\n\n\
         {contract}\n",
        ticker = ticker,
        sector = sector,
        articles = articles,
        insufficient = INSUFFICIENT_DATA,
        catalysts = sector_catalysts(sector),
        contract = JSON_CONTRACT.replace("<subject>", ticker),
    )
}

fn write_article(out: &mut String, item: &NewsItem, max_summary_len: usize) {
    let _ = writeln!(out, "Headline: {}", item.headline);
    if !item.summary.is_empty() {
        let _ = writeln!(out, "Summary: {}", truncate_chars(&item.summary, max_summary_len));
    }
    let source = if item.source.is_empty() { "Unknown" } else { item.source.as_str() };
    let _ = writeln!(out, "Source: {}\n", source);
}

fn sector_catalysts(sector: &str) -> &'static str {
    let family = sector.split('/').next().unwrap_or_default();
    match family {
        "Energy" => "spot prices, policy support, production and enrichment capacity, supply and demand",
        "Tech" => "product launches, earnings, competitive dynamics, regulation",
        "Financials" => "credit trends, rates, loan growth, capital allocation",
        "Healthcare" => "drug approvals, clinical trials, reimbursement, M&A",
        "Consumer" => "sales trends, traffic, pricing power, margins",
        _ => "earnings, guidance, contracts, regulation",
    }
}

/// Cuts at a character boundary and appends "..." when shortened.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

pub fn sentiment_label(score: u8) -> &'static str {
    match score {
        0..=3 => "Bearish",
        4..=6 => "Neutral",
        _ => "Bullish",
    }
}

pub fn sentiment_emoji(score: u8) -> &'static str {
    match score {
        0..=3 => "📉",
        4..=6 => "➖",
        _ => "📈",
    }
}
