use std::time::Duration;
use chrono::{DateTime, TimeZone, Utc};
use crate::common::error::{ArangoError, Result};

/// Name of the system database
pub const SYSTEM_DATABASE: &str = "_system";

/// Escape a single path segment (database, collection, key, ...)
pub fn path_escape(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Build a request path from already-escaped parts, e.g. `["_api", "collection", "x"]`
pub fn join_path(parts: &[&str]) -> String {
    let mut path = String::new();
    for part in parts {
        let part = part.trim_matches('/');
        if part.is_empty() {
            continue;
        }
        path.push('/');
        path.push_str(part);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Path prefix addressing a database: `/_db/<name>`
pub fn database_path(database: &str) -> String {
    format!("/_db/{}", path_escape(database))
}

/// Validate a collection, view, graph or analyzer name
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ArangoError::invalid_argument("collection name cannot be empty"));
    }

    if name.len() > 256 {
        return Err(ArangoError::invalid_argument("collection name too long (max 256 characters)"));
    }

    if name.contains('/') {
        return Err(ArangoError::invalid_argument(
            format!("invalid character '/' in name '{}'", name)
        ));
    }

    Ok(())
}

/// Validate a database name
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ArangoError::invalid_argument("database name cannot be empty"));
    }

    if name.len() > 128 {
        return Err(ArangoError::invalid_argument("database name too long (max 128 bytes)"));
    }

    if name.contains('/') || name.contains(':') {
        return Err(ArangoError::invalid_argument(
            format!("invalid character in database name '{}'", name)
        ));
    }

    Ok(())
}

/// Reject empty identifiers (user names, task ids, server ids, ...)
pub fn require_non_empty(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ArangoError::invalid_argument(format!("{} cannot be empty", what)));
    }
    Ok(())
}

/// Convert a server timestamp given as fractional seconds since the epoch
pub fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
    Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
}

/// Seconds as a float, the way the server expects TTLs and intervals
pub fn duration_secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}
