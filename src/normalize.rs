use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{EtlError, Result};
use crate::idempotency::deterministic_id;
use crate::types::{NewsRecord, RawNewsRecord};

/// Convert feed epoch milliseconds into a UTC timestamp.
pub fn epoch_millis_to_utc(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(ms.round() as i64).single()
}

/// Identity the feed supplied, if usable. Numbers are taken as their text;
/// empty strings and other shapes count as missing.
fn source_id(id: Option<Value>) -> Option<String> {
    match id? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn symbol_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Symbols as a list of nullable strings. A bare value becomes a
/// one-element list.
fn symbol_list(symbols: Option<Value>) -> Option<Vec<Option<String>>> {
    match symbols? {
        Value::Null => None,
        Value::Array(items) => Some(items.into_iter().map(symbol_text).collect()),
        other => Some(vec![symbol_text(other)]),
    }
}

/// Map one raw feed item to the flat record shape.
///
/// `index` is only used to name the record in errors.
pub fn normalize_record(index: usize, raw: RawNewsRecord) -> Result<NewsRecord> {
    let ms = raw.time.ok_or_else(|| EtlError::Normalize {
        index,
        reason: "missing time".to_string(),
    })?;
    let time = epoch_millis_to_utc(ms).ok_or_else(|| EtlError::Normalize {
        index,
        reason: format!("time {ms} is out of range"),
    })?;

    let id = source_id(raw.id)
        .unwrap_or_else(|| deterministic_id(raw.title.as_deref(), raw.url.as_deref()));

    Ok(NewsRecord {
        id,
        source: raw.source,
        title: raw.title,
        url: raw.url,
        icon: raw.icon,
        image: raw.image,
        time,
        symbols: symbol_list(raw.symbols),
        first_price: raw.first_price,
        info: raw.info,
        suggestions: raw.suggestions,
    })
}

#[instrument(skip(raw), fields(count = raw.len()))]
pub fn normalize_news(raw: Vec<RawNewsRecord>) -> Result<Vec<NewsRecord>> {
    let records = raw
        .into_iter()
        .enumerate()
        .map(|(i, r)| normalize_record(i, r))
        .collect::<Result<Vec<_>>>()?;
    debug!("Normalized {} news records", records.len());
    Ok(records)
}
