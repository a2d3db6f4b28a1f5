//! Orchestration of fetch, store, merge and render
//!
//! Each function is one user-visible action. The command-line shell only
//! parses arguments and prints what these return.

use crate::label::LabelRenderer;
use crate::source::BrewfatherClient;
use anyhow::{anyhow, bail, Context, Result};
use brewlabel_common::config::{write_env, AppConfig, StartMode, START_MODE_KEY};
use brewlabel_common::db::{
    self, BatchOverride, BatchRecord, BatchSummary, EffectiveBatch, OverrideFields,
};
use brewlabel_common::merge::merge_transient;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration plus an open store
pub struct App {
    pub config: AppConfig,
    pub db: SqlitePool,
}

impl App {
    pub async fn open(config: AppConfig) -> Result<Self> {
        let db = db::init_database(&config.database_path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
        Ok(Self { config, db })
    }

    /// Remote client; fails when credentials are not configured
    pub fn client(&self) -> Result<BrewfatherClient> {
        let credentials = self.config.require_credentials()?.clone();
        BrewfatherClient::new(&self.config.api_base_url, credentials)
            .context("Failed to create Brewfather client")
    }
}

/// Outcome of a remote listing
#[derive(Debug)]
pub struct RemoteListing {
    pub batches: Vec<BatchSummary>,
    pub saved: usize,
    pub failed: usize,
}

/// List recent batches from the remote service, optionally caching them
///
/// Returns `None` when the service could not be reached.
pub async fn list_remote(
    app: &App,
    client: &BrewfatherClient,
    limit: u32,
    save: bool,
) -> Result<Option<RemoteListing>> {
    let Some(batches) = client.list_batches(limit).await else {
        return Ok(None);
    };

    let (saved, failed) = if save {
        save_summaries(&app.db, &batches).await
    } else {
        (0, 0)
    };

    Ok(Some(RemoteListing {
        batches,
        saved,
        failed,
    }))
}

/// Cache listed batches one by one; a failed row is logged and skipped
///
/// Returns `(saved, failed)`.
pub async fn save_summaries(pool: &SqlitePool, batches: &[BatchSummary]) -> (usize, usize) {
    let mut saved = 0;
    let mut failed = 0;
    for summary in batches {
        match db::upsert_batch(pool, &BatchRecord::from_summary(summary)).await {
            Ok(_) => saved += 1,
            Err(e) => {
                warn!(
                    "Failed to save listed batch {:?} (batch no {:?}): {}",
                    summary.id, summary.batch_no, e
                );
                failed += 1;
            }
        }
    }
    info!("Saved {} listed batches ({} failed)", saved, failed);
    (saved, failed)
}

/// Fetched batch with any stored override merged in
#[derive(Debug)]
pub struct RemoteDetail {
    pub record: BatchRecord,
    pub current_override: Option<BatchOverride>,
    pub effective: EffectiveBatch,
    pub saved: bool,
}

/// Fetch one batch, merge the stored override over it, optionally cache it with its events
///
/// Returns `None` when the service could not be reached.
pub async fn show_remote(
    app: &App,
    client: &BrewfatherClient,
    batch_id: &str,
    save: bool,
) -> Result<Option<RemoteDetail>> {
    let Some(record) = client.fetch_batch(batch_id).await else {
        return Ok(None);
    };

    let lookup_id = record.id.as_deref().unwrap_or(batch_id);
    let current_override = db::get_batch_override(&app.db, lookup_id).await?;
    let effective = merge_transient(&record, current_override.as_ref());

    if save {
        db::upsert_batch_with_events(&app.db, &record).await?;
    }

    Ok(Some(RemoteDetail {
        record,
        current_override,
        effective,
        saved: save,
    }))
}

/// Field edits for an override write
///
/// `None` keeps the current override value; `Some("")` clears it.
#[derive(Debug, Clone, Default)]
pub struct OverrideEdit {
    pub fields: OverrideFields,
    pub observation: Option<String>,
    /// Start from an empty override instead of the current one
    pub reset: bool,
}

/// Apply an edit on top of the current override and store it (history + current)
pub async fn write_override(app: &App, batch_id: &str, edit: &OverrideEdit) -> Result<EffectiveBatch> {
    let current = if edit.reset {
        None
    } else {
        db::get_batch_override(&app.db, batch_id).await?
    };

    let (mut fields, mut observation) = match current {
        Some(row) => (row.fields(), row.observation),
        None => (OverrideFields::default(), None),
    };

    let pick = |given: &Option<String>, current: &mut Option<String>| {
        if let Some(value) = given {
            *current = Some(value.clone()).filter(|v| !v.trim().is_empty());
        }
    };
    pick(&edit.fields.name, &mut fields.name);
    pick(&edit.fields.brew_date, &mut fields.brew_date);
    pick(&edit.fields.measured_abv, &mut fields.measured_abv);
    pick(&edit.fields.estimated_ibu, &mut fields.estimated_ibu);
    pick(&edit.fields.estimated_color, &mut fields.estimated_color);
    pick(&edit.observation, &mut observation);

    db::upsert_batch_override(&app.db, batch_id, &fields, observation.as_deref()).await?;

    db::get_effective_batch(&app.db, batch_id)
        .await?
        .ok_or_else(|| anyhow!("Batch {} disappeared after override write", batch_id))
}

/// Template to render with: explicit path, else the stored default, else `<root>/templates`
pub async fn resolve_template(app: &App, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = db::template_path_from_settings(&app.db).await? {
        return Ok(path);
    }
    Ok(app.config.default_template_path())
}

/// Render labels for a stored batch
///
/// Uses the effective record (override merged) plus the batch's tags.
pub async fn render_labels(
    app: &App,
    batch_id: &str,
    count: usize,
    template: Option<&Path>,
    save_default: bool,
) -> Result<Vec<PathBuf>> {
    let effective = db::get_effective_batch(&app.db, batch_id)
        .await?
        .ok_or_else(|| anyhow!("Batch {} is not stored; fetch it with `show {} --save` first", batch_id, batch_id))?;
    let tags = db::tag_map(&app.db, batch_id).await?;
    let template_path = resolve_template(app, template).await?;

    let render_path = template_path.clone();
    let files = tokio::task::spawn_blocking(move || {
        let renderer = LabelRenderer::new(&render_path)?;
        renderer.render(&effective, count, &tags)
    })
    .await
    .context("Render task failed")?
    .with_context(|| format!("Failed to render labels from {}", template_path.display()))?;

    if save_default {
        db::save_template_as_default(&app.db, &template_path).await?;
        info!("Saved default template: {}", template_path.display());
    }

    Ok(files)
}

/// Persist the start mode to the env file
pub fn set_start_mode(config: &AppConfig, mode: StartMode) -> Result<()> {
    write_env(&config.env_path, &[(START_MODE_KEY, Some(mode.as_str()))])
        .with_context(|| format!("Failed to update {}", config.env_path.display()))?;
    info!("Start mode set to {}", mode);
    Ok(())
}

/// Parse an optional `dd/mm/YYYY` bound supplied by the user
pub fn parse_date_bound(value: Option<&str>) -> Result<Option<chrono::NaiveDate>> {
    match value {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => match brewlabel_common::time::parse_display_date(raw) {
            Some(date) => Ok(Some(date)),
            None => bail!("Invalid date '{}' (expected dd/mm/YYYY)", raw),
        },
    }
}
