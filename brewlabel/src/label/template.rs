//! Label template structure
//!
//! `word/document.xml` is parsed once. The grid is the first table directly
//! under `w:body`; the prototype label block is the first table nested in
//! grid cell (0, 0). Capacity is the number of even-indexed cells summed
//! over all grid rows.

use crate::label::xml_tree::{XmlDocument, XmlElement};
use crate::label::LabelError;

#[derive(Debug, Clone)]
pub struct LabelTemplate {
    document: XmlDocument,
    prototype: XmlElement,
    capacity: usize,
}

impl LabelTemplate {
    /// Parse the main document part and locate the grid and prototype
    pub fn parse(document_xml: &[u8]) -> Result<Self, LabelError> {
        let document = XmlDocument::parse(document_xml)?;

        let grid = grid(&document.root)?;
        let first_cell = grid
            .children_named("tr")
            .next()
            .and_then(|row| row.children_named("tc").next())
            .ok_or_else(|| LabelError::Structure("label grid has no cells".to_string()))?;
        let prototype = first_cell
            .child("tbl")
            .cloned()
            .ok_or_else(|| {
                LabelError::Structure("grid cell (0, 0) holds no label table".to_string())
            })?;

        let capacity = count_slots(grid);
        if capacity == 0 {
            return Err(LabelError::Structure(
                "template grid has no label slots".to_string(),
            ));
        }

        Ok(Self {
            document,
            prototype,
            capacity,
        })
    }

    /// Label slots per page
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The immutable label block copied into each slot
    pub fn prototype(&self) -> &XmlElement {
        &self.prototype
    }

    /// A fresh copy of the template document for one page
    pub fn page_document(&self) -> XmlDocument {
        self.document.clone()
    }
}

/// The label grid (first table under the body)
pub fn grid(root: &XmlElement) -> Result<&XmlElement, LabelError> {
    root.child("body")
        .and_then(|body| body.child("tbl"))
        .ok_or_else(|| LabelError::Structure("document body has no table".to_string()))
}

pub fn grid_mut(root: &mut XmlElement) -> Result<&mut XmlElement, LabelError> {
    root.child_mut("body")
        .and_then(|body| body.child_mut("tbl"))
        .ok_or_else(|| LabelError::Structure("document body has no table".to_string()))
}

/// Even-indexed cells (0, 2, 4, ...) across every row
pub fn count_slots(grid: &XmlElement) -> usize {
    grid.children_named("tr")
        .map(|row| row.children_named("tc").count().div_ceil(2))
        .sum()
}
