//! Application settings (key/value)
//!
//! Holds the default label template location as two keys,
//! `template_dir` and `template_file`.

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};

pub const TEMPLATE_DIR_KEY: &str = "template_dir";
pub const TEMPLATE_FILE_KEY: &str = "template_file";

/// Default template location as stored; either part may be unset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateConfig {
    pub template_dir: Option<String>,
    pub template_file: Option<String>,
}

/// Read a setting and parse it into `T`
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM app_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await
            .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Insert or replace a setting
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO app_settings (key, value, updated_at)
         VALUES (?, ?, strftime('%Y-%m-%d %H:%M:%f', 'now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

pub async fn get_default_template_config(db: &Pool<Sqlite>) -> Result<TemplateConfig> {
    Ok(TemplateConfig {
        template_dir: get_setting(db, TEMPLATE_DIR_KEY).await?,
        template_file: get_setting(db, TEMPLATE_FILE_KEY).await?,
    })
}

/// Remember a template file as the default for later renders
pub async fn save_template_as_default(db: &Pool<Sqlite>, template_path: &Path) -> Result<()> {
    let file_name = template_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::InvalidInput(format!("Template path has no file name: {}", template_path.display()))
        })?;
    let dir = template_path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    set_setting(db, TEMPLATE_DIR_KEY, dir).await?;
    set_setting(db, TEMPLATE_FILE_KEY, file_name).await?;
    Ok(())
}

/// Default template path from settings, if both parts are set
pub async fn template_path_from_settings(db: &Pool<Sqlite>) -> Result<Option<PathBuf>> {
    let config = get_default_template_config(db).await?;
    Ok(match (config.template_dir, config.template_file) {
        (Some(dir), Some(file)) if !file.trim().is_empty() => Some(Path::new(&dir).join(file)),
        _ => None,
    })
}
