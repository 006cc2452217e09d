//! Daily send/upload quotas
//!
//! Usage is keyed by (scope, identity, UTC calendar day), so the count
//! resets at midnight UTC without any cleanup pass.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::Result;

/// Quota scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    /// SMTP sender address
    Sender,
    /// Video-host upload channel
    Upload,
}

impl QuotaScope {
    fn as_str(&self) -> &'static str {
        match self {
            QuotaScope::Sender => "sender",
            QuotaScope::Upload => "upload",
        }
    }
}

fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Units used by this identity today
pub async fn used_today(
    pool: &SqlitePool,
    scope: QuotaScope,
    identity: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let used: Option<i64> = sqlx::query_scalar(
        "SELECT used FROM daily_quota WHERE scope = ? AND identity = ? AND day = ?",
    )
    .bind(scope.as_str())
    .bind(identity)
    .bind(day_key(now))
    .fetch_optional(pool)
    .await?;

    Ok(used.unwrap_or(0))
}

/// Record one unit of usage
pub async fn increment(
    pool: &SqlitePool,
    scope: QuotaScope,
    identity: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_quota (scope, identity, day, used) VALUES (?, ?, ?, 1)
        ON CONFLICT(scope, identity, day) DO UPDATE SET used = used + 1
        "#,
    )
    .bind(scope.as_str())
    .bind(identity)
    .bind(day_key(now))
    .execute(pool)
    .await?;

    Ok(())
}
