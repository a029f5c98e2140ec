use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A news item exactly as the feed returns it. Every field is optional; the
/// feed is not validated beyond JSON shape. `_id` and `symbols` are kept as
/// raw JSON since the feed does not hold them to one type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNewsRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub symbols: Option<Value>,
    #[serde(rename = "firstPrice", default)]
    pub first_price: Option<Value>,
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default)]
    pub suggestions: Option<Value>,
}

/// Flat record shape written to Parquet and to `news_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: String,
    pub source: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub time: DateTime<Utc>,
    /// Null entries in the feed's list stay null.
    pub symbols: Option<Vec<Option<String>>>,
    pub first_price: Option<Value>,
    pub info: Option<Value>,
    pub suggestions: Option<Value>,
}
