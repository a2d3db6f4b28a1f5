//! Manual overrides and the merged read paths
//!
//! Every override write appends a history row and then replaces the current
//! override row, inside one transaction. Reads merge the current override
//! over the stored batch field by field.

use crate::db::models::{
    BatchOverride, EffectiveBatch, OverriddenBatch, OverrideFields, OverrideHistoryEntry,
};
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Record a manual override for a batch
///
/// Fields left `None` are stored as NULL and fall back to the stored batch
/// value on read. Fails with `NotFound` when the batch is not stored.
pub async fn upsert_batch_override(
    pool: &SqlitePool,
    batch_id: &str,
    fields: &OverrideFields,
    observation: Option<&str>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM batches WHERE id = ?")
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Batch {}", batch_id)));
    }

    sqlx::query(
        r#"
        INSERT INTO batch_overrides_history (
            batch_id, name, brew_date, measured_abv, estimated_ibu, estimated_color, observation
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(batch_id)
    .bind(&fields.name)
    .bind(&fields.brew_date)
    .bind(&fields.measured_abv)
    .bind(&fields.estimated_ibu)
    .bind(&fields.estimated_color)
    .bind(observation)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO batch_overrides (
            batch_id, name, brew_date, measured_abv, estimated_ibu, estimated_color,
            observation, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%d %H:%M:%f', 'now'))
        ON CONFLICT(batch_id) DO UPDATE SET
            name = excluded.name,
            brew_date = excluded.brew_date,
            measured_abv = excluded.measured_abv,
            estimated_ibu = excluded.estimated_ibu,
            estimated_color = excluded.estimated_color,
            observation = excluded.observation,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(batch_id)
    .bind(&fields.name)
    .bind(&fields.brew_date)
    .bind(&fields.measured_abv)
    .bind(&fields.estimated_ibu)
    .bind(&fields.estimated_color)
    .bind(observation)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Saved override for batch {}", batch_id);
    Ok(())
}

pub async fn get_batch_override(pool: &SqlitePool, batch_id: &str) -> Result<Option<BatchOverride>> {
    let row = sqlx::query_as::<_, BatchOverride>(
        r#"
        SELECT batch_id, name, brew_date, measured_abv, estimated_ibu, estimated_color,
               observation, updated_at
        FROM batch_overrides
        WHERE batch_id = ?
        "#,
    )
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Override history for a batch, newest first
pub async fn list_override_history(
    pool: &SqlitePool,
    batch_id: &str,
) -> Result<Vec<OverrideHistoryEntry>> {
    let rows = sqlx::query_as::<_, OverrideHistoryEntry>(
        r#"
        SELECT id, batch_id, name, brew_date, measured_abv, estimated_ibu, estimated_color,
               observation, created_at
        FROM batch_overrides_history
        WHERE batch_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Stored batch with the current override applied
///
/// Each overridable field takes the override value when it is present and
/// not blank, otherwise the stored value rendered as text. Returns `None`
/// when the batch is not stored.
pub async fn get_effective_batch(pool: &SqlitePool, batch_id: &str) -> Result<Option<EffectiveBatch>> {
    let row = sqlx::query_as::<_, EffectiveBatch>(
        r#"
        SELECT b.id,
               b.batch_no,
               b.brewer,
               COALESCE(NULLIF(TRIM(o.name), ''), b.name) AS name,
               COALESCE(NULLIF(TRIM(o.brew_date), ''), b.brew_date) AS brew_date,
               COALESCE(NULLIF(TRIM(o.measured_abv), ''), CAST(b.measured_abv AS TEXT)) AS measured_abv,
               COALESCE(NULLIF(TRIM(o.estimated_ibu), ''), CAST(b.estimated_ibu AS TEXT)) AS estimated_ibu,
               COALESCE(NULLIF(TRIM(o.estimated_color), ''), CAST(b.estimated_color AS TEXT)) AS estimated_color,
               (SELECT e.time_human
                  FROM batch_events e
                 WHERE e.batch_id = b.id
                 ORDER BY e.created_at DESC, e.id DESC
                 LIMIT 1) AS bottling_time,
               NULLIF(TRIM(o.observation), '') AS observation
        FROM batches b
        LEFT JOIN batch_overrides o ON o.batch_id = b.id
        WHERE b.id = ?
        "#,
    )
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Batches that carry an override or override history, most recently touched first
///
/// Last-touched is the later of the current override's `updated_at` and the
/// newest history row's `created_at`.
pub async fn list_overridden_batches(pool: &SqlitePool, limit: i64) -> Result<Vec<OverriddenBatch>> {
    let rows = sqlx::query_as::<_, OverriddenBatch>(
        r#"
        SELECT b.id,
               b.batch_no,
               COALESCE(NULLIF(TRIM(o.name), ''), b.name) AS name,
               MAX(COALESCE(o.updated_at, ''), COALESCE(MAX(h.created_at), '')) AS last_touched
        FROM batches b
        LEFT JOIN batch_overrides o ON o.batch_id = b.id
        LEFT JOIN batch_overrides_history h ON h.batch_id = b.id
        WHERE o.batch_id IS NOT NULL OR h.id IS NOT NULL
        GROUP BY b.id
        ORDER BY last_touched DESC, b.id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
