//! Free-form per-batch tags
//!
//! A tag is an extra label placeholder. Keys are unique per batch and
//! re-setting a key overwrites its value; there is no tag history.

use crate::db::models::{Tag, TagMap};
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Set (or overwrite) a tag on a stored batch
pub async fn set_tag(pool: &SqlitePool, batch_id: &str, key: &str, value: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidInput("Tag key must not be empty".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO batch_tags (batch_id, tag_key, tag_value)
        VALUES (?, ?, ?)
        ON CONFLICT(batch_id, tag_key) DO UPDATE SET
            tag_value = excluded.tag_value
        "#,
    )
    .bind(batch_id)
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            Error::NotFound(format!("Batch {}", batch_id))
        }
        other => Error::Database(other),
    })?;

    debug!("Set tag {}={} on batch {}", key, value, batch_id);
    Ok(())
}

/// Delete a tag; returns whether it existed
pub async fn delete_tag(pool: &SqlitePool, batch_id: &str, key: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM batch_tags WHERE batch_id = ? AND tag_key = ?")
        .bind(batch_id)
        .bind(key.trim())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Tags for a batch, ordered by key
pub async fn list_tags(pool: &SqlitePool, batch_id: &str) -> Result<Vec<Tag>> {
    let tags = sqlx::query_as::<_, Tag>(
        r#"
        SELECT tag_key AS key, COALESCE(tag_value, '') AS value, created_at
        FROM batch_tags
        WHERE batch_id = ?
        ORDER BY tag_key ASC
        "#,
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

/// Tags for a batch as a key/value map
pub async fn tag_map(pool: &SqlitePool, batch_id: &str) -> Result<TagMap> {
    Ok(list_tags(pool, batch_id)
        .await?
        .into_iter()
        .map(|tag| (tag.key, tag.value))
        .collect())
}
