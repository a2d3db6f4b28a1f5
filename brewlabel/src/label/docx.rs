//! `.docx` package access
//!
//! A Word document is a zip container. The whole package is read into memory
//! once; each output page is written as a copy of every entry with the main
//! document part replaced.

use crate::label::LabelError;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Main document part inside the package
pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    is_dir: bool,
    data: Vec<u8>,
}

/// In-memory copy of a `.docx` package
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<PackageEntry>,
}

impl DocxPackage {
    /// Read every entry of the package at `path`
    pub fn open(path: &Path) -> Result<Self, LabelError> {
        let file = File::open(path).map_err(|_| LabelError::TemplateNotFound(path.to_path_buf()))?;
        let mut archive = ZipArchive::new(file)?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push(PackageEntry {
                name: entry.name().to_string(),
                is_dir: entry.is_dir(),
                data,
            });
        }

        Ok(Self { entries })
    }

    /// Raw bytes of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Write a copy of the package to `out` with `part_name` replaced by `data`
    pub fn write_with_part<W: Write + Seek>(
        &self,
        out: W,
        part_name: &str,
        data: &[u8],
    ) -> Result<(), LabelError> {
        let mut zip = ZipWriter::new(out);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            zip.start_file(entry.name.as_str(), options)?;
            if entry.name == part_name {
                zip.write_all(data)?;
            } else {
                zip.write_all(&entry.data)?;
            }
        }

        zip.finish()?;
        Ok(())
    }
}
