//! Harvest keyword list

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::Result;

/// One search keyword and when it was last harvested
#[derive(Debug, Clone)]
pub struct Keyword {
    pub keyword: String,
    pub added_at: DateTime<Utc>,
    pub last_harvested_at: Option<DateTime<Utc>>,
}

/// Add a keyword, ignoring duplicates. Returns true when newly added.
pub async fn add(pool: &SqlitePool, keyword: &str) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO keywords (keyword, added_at) VALUES (?, ?)")
        .bind(keyword.trim().to_lowercase())
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All keywords, least recently harvested first so stale ones get priority
pub async fn list(pool: &SqlitePool) -> Result<Vec<Keyword>> {
    let rows = sqlx::query(
        "SELECT keyword, added_at, last_harvested_at FROM keywords \
         ORDER BY last_harvested_at ASC NULLS FIRST, added_at ASC",
    )
    .fetch_all(pool)
    .await?;

    let parse = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| crate::Error::Internal(format!("Failed to parse keyword timestamp: {}", e)))
    };

    rows.iter()
        .map(|row| {
            let added_at: String = row.get("added_at");
            let last: Option<String> = row.get("last_harvested_at");
            Ok(Keyword {
                keyword: row.get("keyword"),
                added_at: parse(&added_at)?,
                last_harvested_at: last.as_deref().map(parse).transpose()?,
            })
        })
        .collect()
}

/// Stamp a keyword as harvested now
pub async fn mark_harvested(pool: &SqlitePool, keyword: &str) -> Result<()> {
    sqlx::query("UPDATE keywords SET last_harvested_at = ? WHERE keyword = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(keyword)
        .execute(pool)
        .await?;

    Ok(())
}
