//! Shared fixtures for brewlabel integration tests

#![allow(dead_code)]

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

/// Label block with one placeholder per paragraph
const LABEL_BLOCK: &str = concat!(
    "<w:tbl><w:tblPr><w:tblStyle w:val=\"Grid\"/></w:tblPr><w:tr><w:tc>",
    "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>{receita}</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>Lote {lote}</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>ABV </w:t></w:r><w:r><w:t>{abv}</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>{garrafa}</w:t></w:r></w:p>",
    "</w:tc></w:tr></w:tbl>"
);

/// `word/document.xml` with a `rows` x `cols` grid; every cell holds a label block
pub fn document_xml(rows: usize, cols: usize) -> String {
    let mut grid = String::from("<w:tbl>");
    for _ in 0..rows {
        grid.push_str("<w:tr>");
        for _ in 0..cols {
            grid.push_str("<w:tc><w:tcPr><w:tcW w:w=\"3000\"/></w:tcPr>");
            grid.push_str(LABEL_BLOCK);
            grid.push_str("<w:p/></w:tc>");
        }
        grid.push_str("</w:tr>");
    }
    grid.push_str("</w:tbl>");

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}<w:sectPr/></w:body></w:document>"
        ),
        grid
    )
}

/// Write a minimal `.docx` template into `dir`
pub fn write_template(dir: &Path, name: &str, rows: usize, cols: usize) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(document_xml(rows, cols).as_bytes()).unwrap();
    zip.finish().unwrap();

    path
}

/// Read `word/document.xml` back out of a rendered page
pub fn read_document(path: &Path) -> String {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut part = archive.by_name("word/document.xml").unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

/// Non-overlapping occurrences of `needle`
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
