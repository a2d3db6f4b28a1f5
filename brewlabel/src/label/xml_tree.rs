//! Owned XML element tree
//!
//! WordprocessingML is edited structurally (cells cleared, tables cloned,
//! runs rewritten), so the part is read into a mutable tree with quick-xml
//! and written back out. Qualified names (`w:p`) and attribute names
//! (`w:val`) are kept verbatim, so namespace declarations survive untouched.

use crate::label::LabelError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data
    Text(String),
    /// Comments, CDATA and processing instructions, written back as read
    Raw(Event<'static>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Qualified name including any prefix
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// A parsed XML part: declaration and other prolog events plus the root element
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    prolog: Vec<Event<'static>>,
    pub root: XmlElement,
}

fn xml_err(e: impl std::fmt::Display) -> LabelError {
    LabelError::Xml(e.to_string())
}

/// Local part of a qualified name (`w:tbl` -> `tbl`)
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Namespace prefix of a qualified name, if any (`w:tbl` -> `w`)
pub fn prefix(name: &str) -> Option<&str> {
    name.split_once(':').map(|(p, _)| p)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Qualified name for a sibling element in this element's namespace
    pub fn sibling_name(&self, local: &str) -> String {
        match prefix(&self.name) {
            Some(p) => format!("{}:{}", p, local),
            None => local.to_string(),
        }
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Direct children with the given local name
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.is(local))
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a mut XmlElement> + 'a {
        self.elements_mut().filter(move |e| e.is(local))
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Index in `children` of the first element child with the given local name
    pub fn position_of(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, XmlNode::Element(e) if e.is(local)))
    }

    /// Drop every direct element child with the given local name
    pub fn remove_children(&mut self, local: &str) {
        self.children
            .retain(|n| !matches!(n, XmlNode::Element(e) if e.is(local)));
    }

    /// Keep only the direct element children for which `keep` holds (text and raw nodes are dropped)
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|n| match n {
            XmlNode::Element(e) => keep(e),
            _ => false,
        });
    }

    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    /// Apply `f` to every descendant element with the given local name, outermost first
    pub fn visit_mut(&mut self, local: &str, f: &mut dyn FnMut(&mut XmlElement)) {
        for child in self.elements_mut() {
            if child.is(local) {
                f(child);
            }
            child.visit_mut(local, f);
        }
    }

    /// Concatenated character data of this element and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
                XmlNode::Raw(_) => {}
            }
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, LabelError> {
        let name = String::from_utf8(start.name().as_ref().to_vec()).map_err(xml_err)?;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = String::from_utf8(attr.key.as_ref().to_vec()).map_err(xml_err)?;
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), LabelError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(xml_err);
        }

        writer.write_event(Event::Start(start)).map_err(xml_err)?;
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write(writer)?,
                XmlNode::Text(t) => writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(xml_err)?,
                XmlNode::Raw(ev) => writer.write_event(ev.clone()).map_err(xml_err)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(xml_err)
    }
}

impl XmlDocument {
    /// Parse a complete XML part
    pub fn parse(xml: &[u8]) -> Result<Self, LabelError> {
        let mut reader = Reader::from_reader(xml);
        let mut prolog: Vec<Event<'static>> = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                LabelError::Xml(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Start(start) => stack.push(XmlElement::from_start(&start)?),
                Event::Empty(start) => {
                    let element = XmlElement::from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| LabelError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => match stack.last_mut() {
                    Some(parent) => {
                        let text = text.unescape().map_err(xml_err)?.into_owned();
                        parent.children.push(XmlNode::Text(text));
                    }
                    None if root.is_none() => prolog.push(Event::Text(text.into_owned())),
                    None => {}
                },
                Event::Eof => break,
                other => match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Raw(other.into_owned())),
                    None if root.is_none() => prolog.push(other.into_owned()),
                    None => {}
                },
            }
        }

        if !stack.is_empty() {
            return Err(LabelError::Xml("unexpected end of document".to_string()));
        }
        let root = root.ok_or_else(|| LabelError::Xml("document has no root element".to_string()))?;
        Ok(Self { prolog, root })
    }

    /// Serialize back to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, LabelError> {
        let mut writer = Writer::new(Vec::new());
        for event in &self.prolog {
            writer.write_event(event.clone()).map_err(xml_err)?;
        }
        self.root.write(&mut writer)?;
        Ok(writer.into_inner())
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), LabelError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(LabelError::Xml("more than one root element".to_string())),
    }
    Ok(())
}
