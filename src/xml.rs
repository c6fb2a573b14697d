//! Owned element tree built from a quick-xml pull parse.
//!
//! Catalogue exports are small enough to hold in memory, and the flattener
//! needs to walk the same subtrees twice (column discovery, then rows), so
//! the event stream is folded into a tree once up front.

use std::str;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{CatalogueError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub tag: String,
    /// Concatenated character data directly inside this element.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Text content, or `None` when it is empty or whitespace only.
    pub fn text(&self) -> Option<&str> {
        if self.text.trim().is_empty() {
            None
        } else {
            Some(self.text.as_str())
        }
    }

    /// First immediate child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Immediate children with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Every element below this one in document (pre-)order, excluding self.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&XmlElement> = self.children.iter().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// All descendants with the given tag, in document order.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.descendants().filter(move |e| e.tag == tag)
    }

    /// First descendant with the given tag.
    pub fn find(&self, tag: &str) -> Option<&XmlElement> {
        self.descendants().find(|e| e.tag == tag)
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

fn parse_error(reader: &Reader<&[u8]>, msg: impl std::fmt::Display) -> CatalogueError {
    CatalogueError::Parse(format!("{} (at byte {})", msg, reader.buffer_position()))
}

/// Resolves the body of an `&...;` reference: predefined entities and
/// numeric character references.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

/// Parses a complete document into its root element.
///
/// Anything other than exactly one well-formed root element is a
/// [`CatalogueError::Parse`].
pub fn parse_document(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| parse_error(&reader, e))?;

        match event {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(parse_error(&reader, "content after the root element"));
                }
                let name = str::from_utf8(e.name().as_ref())
                    .map_err(|e| parse_error(&reader, e))?
                    .to_string();
                stack.push(XmlElement::new(name));
            }
            Event::Empty(e) => {
                if root.is_some() {
                    return Err(parse_error(&reader, "content after the root element"));
                }
                let name = str::from_utf8(e.name().as_ref())
                    .map_err(|e| parse_error(&reader, e))?
                    .to_string();
                let element = XmlElement::new(name);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                // quick-xml already rejects mismatched end names.
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error(&reader, "unexpected closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(e) => {
                let text = e.decode().map_err(|e| parse_error(&reader, e))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(parse_error(&reader, "text outside the root element")),
                }
            }
            Event::CData(e) => {
                let text = e.decode().map_err(|e| parse_error(&reader, e))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::GeneralRef(e) => {
                let name = e.decode().map_err(|e| parse_error(&reader, e))?;
                let resolved = resolve_reference(&name)
                    .ok_or_else(|| parse_error(&reader, format!("unknown entity '&{};'", name)))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(parse_error(&reader, format!("unclosed element <{}>", stack[stack.len() - 1].tag)));
    }
    root.ok_or_else(|| CatalogueError::Parse("document has no root element".to_string()))
}
