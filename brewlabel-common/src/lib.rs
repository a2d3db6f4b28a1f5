//! # brewlabel Common Library
//!
//! Shared code for the brewlabel workspace including:
//! - Configuration loading (root folder, TOML file, credentials env file)
//! - SQLite store for batches, overrides, tags and settings
//! - Override merge engine producing label placeholder maps
//! - Date and number display formatting

pub mod config;
pub mod db;
pub mod error;
pub mod merge;
pub mod time;

pub use error::{Error, Result};
