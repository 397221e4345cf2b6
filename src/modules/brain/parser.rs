//! Defensive parsing of model output into a score plus a few insights.
//!
//! Order: strip `<think>` blocks, then the whole body as JSON, a fenced
//! ```json block, the outermost `{..}` span, and finally a plain-text scan
//! for a `score: N` / `N/10` line and bullet points.

use serde_json::Value;

use super::prompts::INSUFFICIENT_DATA;
use crate::error::{AppError, AppResult};

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 10;
pub const MAX_INSIGHTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSentiment {
    pub score: u8,
    pub insights: Vec<String>,
    pub rationale: String,
    pub degraded: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Scored(ParsedSentiment),
    /// The model declined to score; not worth retrying.
    Insufficient { rationale: String },
}

/// Fails with `Malformed` only when no score can be recovered at all.
pub fn parse_response(raw: &str) -> AppResult<Parsed> {
    let cleaned = clean_reasoning_content(raw);

    if let Some(v) = extract_json(&cleaned) {
        return from_json(&v);
    }

    if cleaned.contains(INSUFFICIENT_DATA) {
        return Ok(Parsed::Insufficient { rationale: cleaned.trim().to_string() });
    }
    from_text(&cleaned)
}

/// Removes every `<think>...</think>` block; an unclosed block swallows the rest.
pub fn clean_reasoning_content(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

pub fn extract_json(text: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        if v.is_object() {
            return Some(v);
        }
    }
    if let Some(start) = text.find("```json") {
        let after = &text[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            if let Ok(v) = serde_json::from_str::<Value>(after[..end].trim()) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(v) = serde_json::from_str::<Value>(&text[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }
    None
}

fn from_json(v: &Value) -> AppResult<Parsed> {
    let rationale = v["rationale"].as_str().unwrap_or_default().trim().to_string();
    if rationale.contains(INSUFFICIENT_DATA) {
        return Ok(Parsed::Insufficient { rationale });
    }

    let raw_score = score_from_value(&v["sentiment_score"])
        .ok_or_else(|| AppError::Malformed("response JSON has no usable sentiment_score".to_string()))?;

    let insights: Vec<String> = v["top_insights"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Parsed::Scored(finish(raw_score, insights, rationale, Vec::new())))
}

fn from_text(text: &str) -> AppResult<Parsed> {
    let raw_score = text_score(text)
        .ok_or_else(|| AppError::Malformed("no sentiment score found in model response".to_string()))?;

    let insights = text
        .lines()
        .map(str::trim)
        .filter_map(|l| {
            ["- ", "* ", "• "]
                .iter()
                .find_map(|marker| l.strip_prefix(marker))
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect();

    let notes = vec!["unstructured model response".to_string()];
    Ok(Parsed::Scored(finish(raw_score, insights, String::new(), notes)))
}

fn finish(raw_score: i64, mut insights: Vec<String>, rationale: String, mut notes: Vec<String>) -> ParsedSentiment {
    let score = raw_score.clamp(MIN_SCORE, MAX_SCORE);
    if score != raw_score {
        notes.push(format!("score {} clamped to {}", raw_score, score));
    }
    if insights.is_empty() {
        notes.push("no insights returned".to_string());
    }
    insights.truncate(MAX_INSIGHTS);

    ParsedSentiment {
        score: score as u8,
        insights,
        rationale,
        degraded: !notes.is_empty(),
        notes,
    }
}

/// Integer, float (rounded) or numeric string such as `"7"` or `"7/10"`.
fn score_from_value(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return f.is_finite().then(|| f.round() as i64);
    }
    let s = v.as_str()?.trim();
    let head = s.split('/').next().unwrap_or(s).trim();
    head.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64)
}

fn text_score(text: &str) -> Option<i64> {
    for line in text.lines() {
        let lower = line.to_lowercase();
        if let Some(pos) = lower.find("score") {
            if let Some(n) = first_number(&lower[pos + "score".len()..]) {
                return Some(n);
            }
        }
    }
    for line in text.lines() {
        if let Some(pos) = line.find("/10") {
            let digits: String = line[..pos]
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if let Ok(n) = digits.parse() {
                return Some(n);
            }
        }
    }
    None
}

fn first_number(s: &str) -> Option<i64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let negative = s[..start].ends_with('-');
    let num: String = s[start..].chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
    let value = num.trim_end_matches('.').parse::<f64>().ok()?.round() as i64;
    Some(if negative { -value } else { value })
}
