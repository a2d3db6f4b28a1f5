//! Configuration loading and root folder resolution
//!
//! Three sources feed [`AppConfig`]:
//! 1. Optional TOML file (`~/.config/brewlabel/config.toml`) for bootstrap values
//! 2. Key/value env file (`<root>/.env`) holding API credentials and the start mode
//! 3. Process environment, which overrides both
//!
//! The resulting struct is passed explicitly to the store initializer, the
//! remote source client and the label renderer.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "BREWLABEL_ROOT";

/// Env-file key holding the Brewfather user id
pub const USER_ID_KEY: &str = "BREWFATHER_USER_ID";

/// Env-file key holding the Brewfather API key
pub const API_KEY_KEY: &str = "BREWFATHER_API_KEY";

/// Env-file key holding the start mode
pub const START_MODE_KEY: &str = "START_MODE";

/// Default remote API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.brewfather.app/v2";

/// Default label template file name
pub const DEFAULT_TEMPLATE_FILE: &str = "etiqueta_template.docx";

const APP_DIR_NAME: &str = "brewlabel";
const DATABASE_FILE: &str = "brewlabel.db";
const ENV_FILE: &str = ".env";
const TEMPLATES_DIR: &str = "templates";
const ENV_FILE_HEADER: &str = "# brewlabel settings (created automatically)";

/// How the application should start when no command is given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    #[default]
    Ask,
    Cli,
    Gui,
}

impl StartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartMode::Ask => "ask",
            StartMode::Cli => "cli",
            StartMode::Gui => "gui",
        }
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(StartMode::Ask),
            "cli" => Ok(StartMode::Cli),
            "gui" => Ok(StartMode::Gui),
            other => Err(Error::InvalidInput(format!(
                "Unknown start mode '{}' (expected ask, cli or gui)",
                other
            ))),
        }
    }
}

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; a missing file is equivalent to an empty one.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Root folder holding the database, env file and templates
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Remote API base URL (tests point this at a local address)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Brewfather basic-auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from env-file values, letting the process environment win
    ///
    /// Returns `None` when either value is missing or blank.
    pub fn from_env_map(values: &BTreeMap<String, String>) -> Option<Self> {
        let user_id = lookup(values, USER_ID_KEY)?;
        let api_key = lookup(values, API_KEY_KEY)?;
        Some(Self { user_id, api_key })
    }
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn lookup(values: &BTreeMap<String, String>, key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| is_valid_key(v))
        .or_else(|| values.get(key).filter(|v| is_valid_key(v)).cloned())
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub env_path: PathBuf,
    pub templates_dir: PathBuf,
    pub api_base_url: String,
    pub credentials: Option<Credentials>,
    pub start_mode: StartMode,
}

impl AppConfig {
    /// Resolve configuration from a loaded TOML config, the env file and the
    /// process environment
    ///
    /// Creates the root folder and an empty env file if they are missing.
    /// Missing credentials are not an error here; commands that talk to the
    /// remote service check [`AppConfig::require_credentials`].
    pub fn from_toml(cli_root: Option<&Path>, toml_config: TomlConfig) -> Result<Self> {
        let root_folder = resolve_root_folder(cli_root, &toml_config);
        std::fs::create_dir_all(&root_folder)?;

        let env_path = root_folder.join(ENV_FILE);
        ensure_env_file(&env_path)?;
        let env_values = read_env(&env_path)?;

        let start_mode = match lookup(&env_values, START_MODE_KEY) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{} - falling back to 'ask'", e);
                StartMode::Ask
            }),
            None => StartMode::Ask,
        };

        let api_base_url = toml_config
            .api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            database_path: root_folder.join(DATABASE_FILE),
            templates_dir: root_folder.join(TEMPLATES_DIR),
            credentials: Credentials::from_env_map(&env_values),
            env_path,
            root_folder,
            api_base_url,
            start_mode,
        })
    }

    /// Credentials, or a configuration error naming where to put them
    pub fn require_credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "Brewfather credentials not configured. Set {} and {} in {} \
                 or in the environment.",
                USER_ID_KEY,
                API_KEY_KEY,
                self.env_path.display()
            ))
        })
    }

    /// Template used when neither the command line nor the settings table names one
    pub fn default_template_path(&self) -> PathBuf {
        self.templates_dir.join(DEFAULT_TEMPLATE_FILE)
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable (`BREWLABEL_ROOT`)
/// 3. TOML config file `root_folder`
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Load the TOML config file, falling back to defaults
///
/// A missing file is normal; an unreadable or malformed one is logged.
pub fn load_toml_config() -> TomlConfig {
    match config_file_path() {
        Some(path) => load_toml_config_from(&path).unwrap_or_else(|e| {
            warn!("Ignoring config file {}: {}", path.display(), e);
            TomlConfig::default()
        }),
        None => {
            debug!("No config file found, using defaults");
            TomlConfig::default()
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config_from(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Locate the platform config file, if one exists
fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/brewlabel/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\brewlabel
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\brewlabel"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/brewlabel
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/brewlabel"))
    } else {
        // ~/.local/share/brewlabel
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./brewlabel_data"))
    }
}

/// Create the env file with a header comment if it does not exist
pub fn ensure_env_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{}\n", ENV_FILE_HEADER))?;
    info!("Created env file: {}", path.display());
    Ok(())
}

/// Read key/value pairs from an env file
///
/// A missing file reads as empty.
pub fn read_env(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| Error::Config(format!("Read env file failed: {}", e)))?;

    let mut values = BTreeMap::new();
    for item in iter {
        let (key, value) =
            item.map_err(|e| Error::Config(format!("Parse env file failed: {}", e)))?;
        values.insert(key, value);
    }
    Ok(values)
}

/// Merge updates into the env file, rewriting it with sorted keys
///
/// A `None` value is written as an empty string.
pub fn write_env(path: &Path, updates: &[(&str, Option<&str>)]) -> Result<()> {
    let mut values = read_env(path)?;
    for (key, value) in updates {
        values.insert((*key).to_string(), value.unwrap_or_default().to_string());
    }

    let mut content = String::from(ENV_FILE_HEADER);
    content.push('\n');
    for (key, value) in &values {
        content.push_str(&format!("{}={}\n", key, quote_env_value(value)));
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn quote_env_value(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '#' || c == '"') {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
