//! Batch, recipe and batch event persistence
//!
//! Writes are `INSERT ... ON CONFLICT` upserts so refreshing a batch from the
//! remote service overwrites every stored field in place.

use crate::db::models::{Batch, BatchEventRow, BatchRecord, BottlingEvent, RecipeRecord};
use crate::time::parse_display_date;
use crate::{Error, Result};
use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

const BATCH_COLUMNS: &str = "id, batch_no, brewer, brew_date, name, measured_abv, \
                             estimated_ibu, estimated_color, recipe_id, created_at";

/// Insert or refresh a recipe
///
/// Returns the recipe id, or `None` when the record has no id (nothing is written).
pub async fn upsert_recipe(pool: &SqlitePool, recipe: &RecipeRecord) -> Result<Option<String>> {
    let mut conn = pool.acquire().await?;
    write_recipe(&mut *conn, recipe).await
}

/// Insert or refresh a batch (and its recipe, when the recipe has an id)
///
/// A batch without an id cannot be stored and is rejected.
pub async fn upsert_batch(pool: &SqlitePool, record: &BatchRecord) -> Result<String> {
    let mut tx = pool.begin().await?;
    let id = write_batch(&mut *tx, record).await?;
    tx.commit().await?;
    Ok(id)
}

/// Store a bottling event for a batch
///
/// Saving the same event (type and instant) again is a no-op. Returns whether
/// a row was inserted.
pub async fn insert_batch_event(
    pool: &SqlitePool,
    batch_id: &str,
    event: &BottlingEvent,
) -> Result<bool> {
    let mut conn = pool.acquire().await?;
    write_event(&mut *conn, batch_id, event).await
}

/// Upsert a batch and record its bottling event in one transaction
pub async fn upsert_batch_with_events(pool: &SqlitePool, record: &BatchRecord) -> Result<String> {
    let mut tx = pool.begin().await?;
    let id = write_batch(&mut *tx, record).await?;
    if let Some(event) = &record.bottling_event {
        write_event(&mut *tx, &id, event).await?;
    }
    tx.commit().await?;
    Ok(id)
}

async fn write_recipe(conn: &mut SqliteConnection, recipe: &RecipeRecord) -> Result<Option<String>> {
    let Some(id) = recipe.id.as_deref().filter(|id| !id.is_empty()) else {
        debug!("Skipping recipe without id");
        return Ok(None);
    };

    sqlx::query(
        r#"
        INSERT INTO recipes (id, name, style)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            style = excluded.style
        "#,
    )
    .bind(id)
    .bind(&recipe.name)
    .bind(&recipe.style)
    .execute(&mut *conn)
    .await?;

    Ok(Some(id.to_string()))
}

async fn write_batch(conn: &mut SqliteConnection, record: &BatchRecord) -> Result<String> {
    let id = record
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidInput("Batch without id cannot be stored".to_string()))?;

    let recipe_id = match &record.recipe {
        Some(recipe) => write_recipe(conn, recipe).await?,
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO batches (
            id, batch_no, brewer, brew_date, name,
            measured_abv, estimated_ibu, estimated_color, recipe_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            batch_no = excluded.batch_no,
            brewer = excluded.brewer,
            brew_date = excluded.brew_date,
            name = excluded.name,
            measured_abv = excluded.measured_abv,
            estimated_ibu = excluded.estimated_ibu,
            estimated_color = excluded.estimated_color,
            recipe_id = excluded.recipe_id
        "#,
    )
    .bind(id)
    .bind(record.batch_no)
    .bind(&record.brewer)
    .bind(&record.brew_date)
    .bind(&record.name)
    .bind(record.measured_abv)
    .bind(record.estimated_ibu)
    .bind(record.estimated_color)
    .bind(&recipe_id)
    .execute(&mut *conn)
    .await?;

    debug!("Upserted batch {}", id);
    Ok(id.to_string())
}

async fn write_event(conn: &mut SqliteConnection, batch_id: &str, event: &BottlingEvent) -> Result<bool> {
    // `IS` compares NULL timestamps as equal
    let result = sqlx::query(
        r#"
        INSERT INTO batch_events (batch_id, event_type, time_ts, time_human)
        SELECT ?, ?, ?, ?
        WHERE NOT EXISTS (
            SELECT 1 FROM batch_events
            WHERE batch_id = ? AND event_type = ? AND time_ts IS ?
        )
        "#,
    )
    .bind(batch_id)
    .bind(&event.event_type)
    .bind(event.timestamp_ms)
    .bind(&event.time_human)
    .bind(batch_id)
    .bind(&event.event_type)
    .bind(event.timestamp_ms)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stored batches, most recently created first
pub async fn fetch_batches(pool: &SqlitePool, limit: i64) -> Result<Vec<Batch>> {
    let sql = format!(
        "SELECT {} FROM batches ORDER BY created_at DESC, rowid DESC LIMIT ?",
        BATCH_COLUMNS
    );
    let batches = sqlx::query_as::<_, Batch>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(batches)
}

/// Stored batches whose brew date lies within `[start, end]` (inclusive)
///
/// An absent bound imposes no constraint. A batch with a missing or
/// unparsable brew date fails every present bound.
pub async fn fetch_batches_filtered(
    pool: &SqlitePool,
    limit: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<Batch>> {
    let sql = format!(
        "SELECT {} FROM batches ORDER BY created_at DESC, rowid DESC",
        BATCH_COLUMNS
    );
    let all = sqlx::query_as::<_, Batch>(&sql).fetch_all(pool).await?;

    let max = usize::try_from(limit).unwrap_or(0);
    let filtered = all
        .into_iter()
        .filter(|batch| brew_date_in_range(batch.brew_date.as_deref(), start, end))
        .take(max)
        .collect();
    Ok(filtered)
}

fn brew_date_in_range(brew_date: Option<&str>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    let date = brew_date.and_then(parse_display_date);
    if let Some(start) = start {
        match date {
            Some(d) if d >= start => {}
            _ => return false,
        }
    }
    if let Some(end) = end {
        match date {
            Some(d) if d <= end => {}
            _ => return false,
        }
    }
    true
}

pub async fn get_batch_by_id(pool: &SqlitePool, batch_id: &str) -> Result<Option<Batch>> {
    let sql = format!("SELECT {} FROM batches WHERE id = ?", BATCH_COLUMNS);
    let batch = sqlx::query_as::<_, Batch>(&sql)
        .bind(batch_id)
        .fetch_optional(pool)
        .await?;
    Ok(batch)
}

/// Stored events for a batch, newest first
pub async fn fetch_batch_events(pool: &SqlitePool, batch_id: &str) -> Result<Vec<BatchEventRow>> {
    let events = sqlx::query_as::<_, BatchEventRow>(
        r#"
        SELECT event_type, time_ts, time_human, created_at
        FROM batch_events
        WHERE batch_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await?;
    Ok(events)
}
