use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn decode_value(raw: &str, key: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("stored value for {key} is not JSON"))
}
