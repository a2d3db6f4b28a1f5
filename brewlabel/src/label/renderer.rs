//! Label renderer
//!
//! Fills template pages slot by slot and writes one `.docx` per page to
//! `<template dir>/output/`.

use crate::label::docx::{DocxPackage, DOCUMENT_PART};
use crate::label::paginator::plan_pages;
use crate::label::template::{grid_mut, LabelTemplate};
use crate::label::xml_tree::{XmlDocument, XmlElement, XmlNode};
use crate::label::LabelError;
use brewlabel_common::db::models::{EffectiveBatch, TagMap};
use brewlabel_common::merge::{apply_overrides, PlaceholderMap, NAME_PLACEHOLDER};
use brewlabel_common::time;
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const OUTPUT_DIR: &str = "output";

/// Font size for the recipe name, in half-points (14pt)
const NAME_FONT_HALF_POINTS: &str = "28";

/// `w:rPr` children that must follow `w:sz`/`w:szCs`
const RPR_AFTER_SIZE: &[&str] = &[
    "highlight",
    "u",
    "effect",
    "bdr",
    "shd",
    "fitText",
    "vertAlign",
    "rtl",
    "cs",
    "em",
    "lang",
    "eastAsianLayout",
    "specVanish",
    "oMath",
    "rPrChange",
];

pub struct LabelRenderer {
    output_dir: PathBuf,
    package: DocxPackage,
    template: LabelTemplate,
}

impl LabelRenderer {
    /// Load a template and prepare its output directory
    ///
    /// Fails with `TemplateNotFound` when the file is missing, before any
    /// output is produced.
    pub fn new(template_path: &Path) -> Result<Self, LabelError> {
        if !template_path.is_file() {
            return Err(LabelError::TemplateNotFound(template_path.to_path_buf()));
        }

        let package = DocxPackage::open(template_path)?;
        let document_xml = package.part(DOCUMENT_PART).ok_or_else(|| {
            LabelError::Structure(format!("package has no {}", DOCUMENT_PART))
        })?;
        let template = LabelTemplate::parse(document_xml)?;

        let output_dir = template_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(OUTPUT_DIR);
        std::fs::create_dir_all(&output_dir)?;

        info!(
            "Loaded label template {} ({} labels per page)",
            template_path.display(),
            template.capacity()
        );

        Ok(Self {
            output_dir,
            package,
            template,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Labels per page
    pub fn capacity(&self) -> usize {
        self.template.capacity()
    }

    /// Render `requested` labels for a batch; returns the written files in page order
    ///
    /// A failure on any page aborts the call. Pages already written stay on disk.
    pub fn render(
        &self,
        effective: &EffectiveBatch,
        requested: usize,
        extra_tags: &TagMap,
    ) -> Result<Vec<PathBuf>, LabelError> {
        let placeholders = apply_overrides(effective, extra_tags, time::now());
        let batch_label = effective
            .batch_no
            .map(|n| n.to_string())
            .unwrap_or_else(|| effective.id.clone());
        self.render_placeholders(&batch_label, &placeholders, requested)
    }

    /// Render `requested` labels from a ready placeholder map
    pub fn render_placeholders(
        &self,
        batch_label: &str,
        placeholders: &PlaceholderMap,
        requested: usize,
    ) -> Result<Vec<PathBuf>, LabelError> {
        let plan = plan_pages(requested, self.template.capacity())?;

        let mut written = Vec::with_capacity(plan.total_pages());
        for (page, quota) in plan.pages() {
            let document = self.fill_page(quota, placeholders)?;
            let bytes = document.to_bytes()?;
            let (path, file) = create_output_file(&self.output_dir, batch_label, page, time::now())?;
            self.package.write_with_part(file, DOCUMENT_PART, &bytes)?;
            debug!("Wrote page {} ({} labels): {}", page, quota, path.display());
            written.push(path);
        }

        info!(
            "Rendered {} labels for batch {} on {} page(s)",
            requested,
            batch_label,
            written.len()
        );
        Ok(written)
    }

    /// Copy of the template with the first `quota` slots filled, row-major
    fn fill_page(&self, quota: usize, placeholders: &PlaceholderMap) -> Result<XmlDocument, LabelError> {
        let mut document = self.template.page_document();
        let grid = grid_mut(&mut document.root)?;

        let mut filled = 0;
        'rows: for row in grid.children_named_mut("tr") {
            for (col, cell) in row.children_named_mut("tc").enumerate() {
                if filled >= quota {
                    break 'rows;
                }
                if col % 2 == 1 {
                    continue;
                }
                clear_cell(cell);
                fill_slot(cell, self.template.prototype(), placeholders);
                filled += 1;
            }
        }

        Ok(document)
    }
}

/// Create a new output file, never reusing an existing name
///
/// The name is claimed with `create_new`, so concurrent renders in the same
/// millisecond each get their own `_<n>` suffix.
pub fn create_output_file(
    output_dir: &Path,
    batch_label: &str,
    page: usize,
    at: DateTime<Local>,
) -> Result<(PathBuf, File), LabelError> {
    let stem = output_file_stem(batch_label, page, at);
    let mut suffix = 0;
    loop {
        let name = match suffix {
            0 => format!("{}.docx", stem),
            n => format!("{}_{}.docx", stem, n),
        };
        let path = output_dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// `etiqueta_<batch>_p<page>_<YYYYmmdd_HHMMSSmmm>`
pub fn output_file_stem(batch_label: &str, page: usize, at: DateTime<Local>) -> String {
    let safe: String = batch_label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("etiqueta_{}_p{}_{}", safe, page, at.format("%Y%m%d_%H%M%S%3f"))
}

/// Remove nested tables and paragraph content, keeping paragraph properties
pub fn clear_cell(cell: &mut XmlElement) {
    cell.remove_children("tbl");
    for paragraph in cell.children_named_mut("p") {
        paragraph.retain_elements(|e| e.is("pPr"));
    }
}

/// Insert a filled copy of the prototype into a cleared cell
///
/// The copy goes right after the cell properties so the cell still ends
/// with a paragraph.
pub fn fill_slot(cell: &mut XmlElement, prototype: &XmlElement, placeholders: &PlaceholderMap) {
    let mut block = prototype.clone();
    if let Some(table_props) = block.child_mut("tblPr") {
        table_props.remove_children("tblStyle");
    }
    block.visit_mut("p", &mut |paragraph| {
        substitute_paragraph(paragraph, placeholders);
    });

    let at = cell.position_of("tcPr").map_or(0, |i| i + 1);
    cell.children.insert(at, XmlNode::Element(block));

    let ends_with_paragraph = cell.children[at + 1..]
        .iter()
        .any(|n| matches!(n, XmlNode::Element(e) if e.is("p")));
    if !ends_with_paragraph {
        let paragraph = XmlElement::new(cell.sibling_name("p"));
        cell.push_element(paragraph);
    }
}

/// Replace `{key}` occurrences in a paragraph; returns whether anything matched
///
/// A matched paragraph is rewritten as a single run carrying the first
/// run's properties. The recipe name run is set to 14pt.
pub fn substitute_paragraph(paragraph: &mut XmlElement, placeholders: &PlaceholderMap) -> bool {
    let mut text = String::new();
    collect_run_text(paragraph, &mut text);

    let Some(substituted) = substitute(&text, placeholders) else {
        return false;
    };

    let run_props = first_run_properties(paragraph);
    paragraph.retain_elements(|e| e.is("pPr"));

    let mut run = XmlElement::new(paragraph.sibling_name("r"));
    let mut props = run_props.unwrap_or_else(|| XmlElement::new(paragraph.sibling_name("rPr")));
    if substituted.name_hit {
        set_font_size(&mut props, NAME_FONT_HALF_POINTS);
    }
    if !props.children.is_empty() || !props.attributes.is_empty() {
        run.push_element(props);
    }

    let mut text_el = XmlElement::new(paragraph.sibling_name("t"));
    text_el.set_attribute("xml:space", "preserve");
    if !substituted.text.is_empty() {
        text_el.children.push(XmlNode::Text(substituted.text));
    }
    run.push_element(text_el);
    paragraph.push_element(run);
    true
}

struct Substituted {
    text: String,
    name_hit: bool,
}

/// Single left-to-right pass; unknown `{names}` stay verbatim
fn substitute(text: &str, placeholders: &PlaceholderMap) -> Option<Substituted> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut any_hit = false;
    let mut name_hit = false;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match placeholders.get(key) {
                    Some(value) => {
                        out.push_str(value);
                        any_hit = true;
                        name_hit |= key == NAME_PLACEHOLDER;
                        rest = &after[close + 1..];
                    }
                    None => {
                        out.push('{');
                        rest = after;
                    }
                }
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    any_hit.then_some(Substituted { text: out, name_hit })
}

fn collect_run_text(element: &XmlElement, out: &mut String) {
    for child in element.elements() {
        if child.is("t") {
            out.push_str(&child.text());
        } else if !child.is("p") && !child.is("pPr") {
            collect_run_text(child, out);
        }
    }
}

fn first_run_properties(paragraph: &XmlElement) -> Option<XmlElement> {
    paragraph
        .children_named("r")
        .find_map(|run| run.child("rPr"))
        .cloned()
}

/// Set `w:sz` and `w:szCs`, keeping the schema order of `w:rPr`
fn set_font_size(props: &mut XmlElement, half_points: &str) {
    props.remove_children("sz");
    props.remove_children("szCs");

    let at = props
        .children
        .iter()
        .position(|n| matches!(n, XmlNode::Element(e) if RPR_AFTER_SIZE.contains(&e.local_name())))
        .unwrap_or(props.children.len());

    let val_name = props.sibling_name("val");
    let mut size = XmlElement::new(props.sibling_name("sz"));
    size.set_attribute(&val_name, half_points);
    let mut size_cs = XmlElement::new(props.sibling_name("szCs"));
    size_cs.set_attribute(&val_name, half_points);

    props.children.insert(at, XmlNode::Element(size_cs));
    props.children.insert(at, XmlNode::Element(size));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse_root(xml: &str) -> XmlElement {
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    fn placeholders() -> PlaceholderMap {
        let mut map = PlaceholderMap::new();
        map.insert("lote".to_string(), "17".to_string());
        map.insert("receita".to_string(), "Saison".to_string());
        map
    }

    #[test]
    fn test_substitute_keeps_unknown_and_unbalanced() {
        let out = substitute("Lote {lote} {missing} {receita", &placeholders()).unwrap();
        assert_eq!(out.text, "Lote 17 {missing} {receita");
        assert!(!out.name_hit);

        assert!(substitute("nothing here", &placeholders()).is_none());
        assert!(substitute("{{lote}}", &placeholders()).is_some_and(|s| s.text == "{17}"));
    }

    #[test]
    fn test_paragraph_split_runs_are_joined() {
        let mut p = parse_root(
            r#"<w:p xmlns:w="urn:w"><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Lote {lo</w:t></w:r><w:r><w:t>te}</w:t></w:r></w:p>"#,
        );

        assert!(substitute_paragraph(&mut p, &placeholders()));
        assert_eq!(p.text(), "Lote 17");
        assert!(p.child("pPr").is_some());
        let runs: Vec<_> = p.children_named("r").collect();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].child("rPr").unwrap().child("b").is_some());
    }

    #[test]
    fn test_recipe_name_run_is_14pt() {
        let mut p = parse_root(
            r#"<w:p xmlns:w="urn:w"><w:r><w:rPr><w:b/><w:sz w:val="20"/><w:lang w:val="pt-BR"/></w:rPr><w:t>{receita}</w:t></w:r></w:p>"#,
        );

        assert!(substitute_paragraph(&mut p, &placeholders()));
        let props = p.child("r").unwrap().child("rPr").unwrap();
        let order: Vec<&str> = props.elements().map(|e| e.local_name()).collect();
        assert_eq!(order, vec!["b", "sz", "szCs", "lang"]);
        assert_eq!(props.child("sz").unwrap().attribute("w:val"), Some("28"));
        assert_eq!(props.child("szCs").unwrap().attribute("w:val"), Some("28"));
    }

    #[test]
    fn test_unmatched_paragraph_untouched() {
        let xml = r#"<w:p xmlns:w="urn:w"><w:r><w:t>{nope}</w:t></w:r></w:p>"#;
        let mut p = parse_root(xml);
        let before = p.clone();
        assert!(!substitute_paragraph(&mut p, &placeholders()));
        assert_eq!(p, before);
    }

    #[test]
    fn test_clear_and_fill_cell() {
        let mut cell = parse_root(concat!(
            r#"<w:tc xmlns:w="urn:w"><w:tcPr><w:tcW w:w="100"/></w:tcPr>"#,
            r#"<w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:pPr><w:spacing w:after="0"/></w:pPr><w:r><w:t>old</w:t></w:r></w:p></w:tc>"#
        ));
        let prototype = parse_root(concat!(
            r#"<w:tbl xmlns:w="urn:w"><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0"/></w:tblPr>"#,
            r#"<w:tr><w:tc><w:p><w:r><w:t>Lote {lote}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#
        ));

        clear_cell(&mut cell);
        assert!(cell.child("tbl").is_none());
        assert_eq!(cell.text(), "");
        assert!(cell.child("p").unwrap().child("pPr").is_some());

        fill_slot(&mut cell, &prototype, &placeholders());
        let order: Vec<&str> = cell.elements().map(|e| e.local_name()).collect();
        assert_eq!(order, vec!["tcPr", "tbl", "p"]);

        let block = cell.child("tbl").unwrap();
        assert!(block.child("tblPr").unwrap().child("tblStyle").is_none());
        assert!(block.child("tblPr").unwrap().child("tblW").is_some());
        assert_eq!(block.text(), "Lote 17");

        // prototype itself is never modified
        assert_eq!(prototype.text(), "Lote {lote}");
    }

    #[test]
    fn test_fill_adds_trailing_paragraph_when_missing() {
        let mut cell = parse_root(r#"<w:tc xmlns:w="urn:w"><w:tcPr/></w:tc>"#);
        let prototype = parse_root(r#"<w:tbl xmlns:w="urn:w"><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>"#);

        fill_slot(&mut cell, &prototype, &placeholders());
        let order: Vec<&str> = cell.elements().map(|e| e.local_name()).collect();
        assert_eq!(order, vec!["tcPr", "tbl", "p"]);
        assert_eq!(cell.child("p").unwrap().name, "w:p");
    }

    #[test]
    fn test_output_file_stem() {
        let at = Local.with_ymd_and_hms(2024, 6, 1, 9, 30, 5).unwrap();
        assert_eq!(
            output_file_stem("17", 2, at),
            "etiqueta_17_p2_20240601_093005000"
        );
        assert_eq!(output_file_stem("a/b", 1, at), "etiqueta_a_b_p1_20240601_093005000");
    }

    #[test]
    fn test_output_files_with_same_stamp_get_suffixes() {
        let dir = tempfile::TempDir::new().unwrap();
        let at = Local.with_ymd_and_hms(2024, 6, 1, 9, 30, 5).unwrap();

        let (first, _) = create_output_file(dir.path(), "17", 1, at).unwrap();
        let (second, _) = create_output_file(dir.path(), "17", 1, at).unwrap();
        assert_eq!(first.file_name().unwrap(), "etiqueta_17_p1_20240601_093005000.docx");
        assert_eq!(second.file_name().unwrap(), "etiqueta_17_p1_20240601_093005000_1.docx");
    }

    #[test]
    fn test_concurrent_output_files_never_collide() {
        let dir = tempfile::TempDir::new().unwrap();
        let at = Local.with_ymd_and_hms(2024, 6, 1, 9, 30, 5).unwrap();

        let mut paths: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| create_output_file(dir.path(), "17", 1, at).unwrap().0))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 8);
    }
}
