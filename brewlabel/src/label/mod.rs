//! Label sheet rendering from a Word template
//!
//! The template's first body table is a grid of label slots. The nested
//! table in the first cell is the label block that gets copied into every
//! even-indexed cell (odd columns are spacing) and filled from the
//! placeholder map. Each page is written as its own `.docx` file.

pub mod docx;
pub mod paginator;
pub mod renderer;
pub mod template;
pub mod xml_tree;

use std::path::PathBuf;
use thiserror::Error;

pub use paginator::{plan_pages, PagePlan};
pub use renderer::LabelRenderer;
pub use template::LabelTemplate;

/// Label rendering errors
#[derive(Debug, Error)]
pub enum LabelError {
    /// Template file missing or unreadable
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Template package is not a valid zip container
    #[error("Template package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Template XML error: {0}")]
    Xml(String),

    /// Template does not have the expected grid layout
    #[error("Unexpected template structure: {0}")]
    Structure(String),
}
