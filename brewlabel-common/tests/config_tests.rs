//! Tests for configuration loading and root folder resolution
//!
//! Uses serial_test to prevent environment variable race conditions: every
//! test that reads or writes BREWLABEL_ROOT or the credential variables is
//! marked #[serial].

use brewlabel_common::config::{
    read_env, resolve_root_folder, write_env, AppConfig, StartMode, TomlConfig, API_KEY_KEY,
    ROOT_FOLDER_ENV, START_MODE_KEY, USER_ID_KEY,
};
use brewlabel_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(USER_ID_KEY);
    env::remove_var(API_KEY_KEY);
    env::remove_var(START_MODE_KEY);
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
    assert_eq!(root, PathBuf::from("/from/cli"));

    clear_env();
}

#[test]
#[serial]
fn test_env_beats_toml() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/env"));

    clear_env();
}

#[test]
#[serial]
fn test_toml_used_without_cli_or_env() {
    clear_env();
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_default_root_ends_with_app_dir() {
    clear_env();
    let root = resolve_root_folder(None, &TomlConfig::default());
    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("brewlabel"));
}

#[test]
#[serial]
fn test_load_creates_root_and_env_file() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("data");

    let config = AppConfig::from_toml(Some(&root), TomlConfig::default()).unwrap();

    assert!(root.is_dir());
    assert!(config.env_path.exists());
    assert_eq!(config.database_path, root.join("brewlabel.db"));
    assert_eq!(
        config.default_template_path(),
        root.join("templates").join("etiqueta_template.docx")
    );
    assert_eq!(config.start_mode, StartMode::Ask);
    assert_eq!(config.api_base_url, "https://api.brewfather.app/v2");
    assert!(config.credentials.is_none());
    assert!(matches!(config.require_credentials(), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_credentials_and_mode_from_env_file() {
    clear_env();
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join(".env"),
        "BREWFATHER_USER_ID=brewer\nBREWFATHER_API_KEY=key123\nSTART_MODE=cli\n",
    )
    .unwrap();

    let config = AppConfig::from_toml(Some(temp.path()), TomlConfig::default()).unwrap();

    let creds = config.require_credentials().unwrap();
    assert_eq!(creds.user_id, "brewer");
    assert_eq!(creds.api_key, "key123");
    assert_eq!(config.start_mode, StartMode::Cli);
}

#[test]
#[serial]
fn test_process_env_overrides_env_file() {
    clear_env();
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join(".env"),
        "BREWFATHER_USER_ID=file-user\nBREWFATHER_API_KEY=file-key\n",
    )
    .unwrap();
    env::set_var(USER_ID_KEY, "env-user");

    let config = AppConfig::from_toml(Some(temp.path()), TomlConfig::default()).unwrap();
    let creds = config.require_credentials().unwrap();
    assert_eq!(creds.user_id, "env-user");
    assert_eq!(creds.api_key, "file-key");

    clear_env();
}

#[test]
#[serial]
fn test_unknown_start_mode_falls_back_to_ask() {
    clear_env();
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".env"), "START_MODE=tui\n").unwrap();

    let config = AppConfig::from_toml(Some(temp.path()), TomlConfig::default()).unwrap();
    assert_eq!(config.start_mode, StartMode::Ask);
}

#[test]
fn test_write_env_merges_and_sorts() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".env");
    std::fs::write(&path, "START_MODE=ask\nBREWFATHER_USER_ID=brewer\n").unwrap();

    write_env(&path, &[(START_MODE_KEY, Some("gui")), ("LABEL_NOTE", Some("two words"))]).unwrap();

    let values = read_env(&path).unwrap();
    assert_eq!(values.get(START_MODE_KEY).map(String::as_str), Some("gui"));
    assert_eq!(values.get(USER_ID_KEY).map(String::as_str), Some("brewer"));
    assert_eq!(values.get("LABEL_NOTE").map(String::as_str), Some("two words"));

    let content = std::fs::read_to_string(&path).unwrap();
    let keys: Vec<&str> = content
        .lines()
        .filter(|l| !l.starts_with('#'))
        .filter_map(|l| l.split('=').next())
        .collect();
    assert_eq!(keys, vec!["BREWFATHER_USER_ID", "LABEL_NOTE", "START_MODE"]);
}

#[test]
fn test_read_missing_env_file_is_empty() {
    let temp = TempDir::new().unwrap();
    assert!(read_env(&temp.path().join("absent.env")).unwrap().is_empty());
}
