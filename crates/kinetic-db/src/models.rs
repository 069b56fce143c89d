//! Row types and column helpers shared by the query modules.
//!
//! Feed entities are decoded straight into `kinetic_types` models; only rows
//! that never leave the server side get their own struct here.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use kinetic_types::models::UserSummary;

pub struct SubscriptionRow {
    pub endpoint: String,
    pub user_id: String,
    pub p256dh: String,
    pub auth: String,
}

/// A write that may have produced a notification activity.
#[derive(Debug, Clone)]
pub struct Created<T> {
    pub item: T,
    pub activity_id: Option<i64>,
}

/// Result of a toggle (like, follow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggled {
    /// State after the toggle.
    pub active: bool,
    /// Counter after the toggle (likes, followers).
    pub count: u64,
    pub activity_id: Option<i64>,
}

/// Outcome of an owner-restricted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Missing,
    NotOwner,
    Done,
}

/// Timestamps are stored as fixed-width RFC 3339 strings so they compare lexically.
pub(crate) fn now() -> String {
    timestamp(Utc::now())
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn corrupt(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("corrupt {what}: '{value}'").into())
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|_| corrupt(idx, "uuid", &raw))
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt(idx, "timestamp", &raw))
}

pub(crate) fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let n: i64 = row.get(idx)?;
    Ok(n.max(0) as u64)
}

/// Reads `id, username, name, profile_photo` starting at `idx`.
pub(crate) fn user_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: uuid_at(row, idx)?,
        username: row.get(idx + 1)?,
        name: row.get(idx + 2)?,
        profile_photo: row.get(idx + 3)?,
    })
}
