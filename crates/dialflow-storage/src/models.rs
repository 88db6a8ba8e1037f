// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column codecs shared by the query modules.
//!
//! Timestamps are stored as RFC 3339 strings with millisecond precision and a
//! `Z` suffix so lexical order matches chronological order. Enumerations are
//! stored through their `strum` string form; lists as JSON.

use std::str::FromStr;

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn fmt_opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(fmt_ts)
}

pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

pub fn fmt_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

pub fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S").map_err(|e| conversion_err(idx, e))
}

/// Decode an enum column written with its `Display` form.
pub fn parse_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| conversion_err(idx, e))
}

pub fn to_json<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub fn from_json<T: DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| conversion_err(idx, e))
}

/// Counters are `INTEGER` columns; negative values never occur.
pub fn counter(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}
