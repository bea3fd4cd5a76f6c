use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::{
    db::{
        helpers::{decode_value, parse_datetime},
        Database, StoreRequest,
    },
    store::KvStore,
};

pub(in crate::db) fn select_value(conn: &Connection, key: &str) -> Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .with_context(|| format!("failed to read {key}"))?;

    raw.map(|value| decode_value(&value, key)).transpose()
}

pub(in crate::db) fn upsert_value(conn: &Connection, key: &str, value: &Value) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, encoded, Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("failed to write {key}"))?;
    Ok(())
}

pub(in crate::db) fn delete_value(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
        .with_context(|| format!("failed to delete {key}"))?;
    Ok(())
}

pub(in crate::db) fn select_updated_at(conn: &Connection, key: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = conn
        .query_row("SELECT updated_at FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .with_context(|| format!("failed to read timestamp of {key}"))?;

    raw.map(|value| parse_datetime(&value, "updated_at")).transpose()
}

impl Database {
    /// When `key` was last written, if it exists.
    pub async fn last_updated(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let key = key.to_string();
        self.request(|reply| StoreRequest::LastUpdated { key, reply }).await
    }
}

#[async_trait]
impl KvStore for Database {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.request(|reply| StoreRequest::Get { key, reply }).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        self.request(|reply| StoreRequest::Set { key, value, reply }).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.request(|reply| StoreRequest::Remove { key, reply }).await
    }
}
