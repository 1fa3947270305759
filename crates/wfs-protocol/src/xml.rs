//! Minimal namespace-aware XML tree, built from quick-xml events.
//!
//! Request bodies are small (a Transaction or a GetFeature query), so they are
//! read fully into a tree and then walked by the request, filter and GML
//! decoders.

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use wfs_common::{WfsError, WfsResult};

pub const NS_WFS: &str = "http://www.opengis.net/wfs";
pub const NS_OGC: &str = "http://www.opengis.net/ogc";
pub const NS_GML: &str = "http://www.opengis.net/gml";
pub const NS_XSD: &str = "http://www.w3.org/2001/XMLSchema";
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// One element with its resolved namespace, attributes (by local name) and
/// concatenated text content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Unescaped direct text, whitespace included.
    pub text: String,
    /// Source between the start and end tags, escaped as written.
    pub markup: String,
}

impl XmlElement {
    /// Value of an attribute by local name (namespace prefixes ignored).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given local name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the element.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Content of a free-text value. Plain text comes back untrimmed; an
    /// element with inline markup (an HTML description) comes back as that
    /// markup, verbatim.
    pub fn content(&self) -> &str {
        if self.children.is_empty() {
            &self.text
        } else {
            &self.markup
        }
    }

    /// Whether the element is in the given namespace, or in none at all.
    pub fn in_namespace_or_default(&self, namespace: &str) -> bool {
        match &self.namespace {
            Some(ns) => ns == namespace,
            None => true,
        }
    }
}

/// Parse a complete document and return its root element.
pub fn parse(input: &str) -> WfsResult<XmlElement> {
    let mut reader = NsReader::from_str(input);

    // Byte offset where each open element's content starts.
    let mut stack: Vec<(XmlElement, usize)> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = reader.buffer_position();
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| malformed(position, e))?;

        match event {
            Event::Start(e) | Event::Empty(e) if root.is_some() => {
                return Err(WfsError::MalformedXml(format!(
                    "unexpected element '{}' after the document root",
                    String::from_utf8_lossy(e.local_name().as_ref())
                )));
            }
            Event::Start(e) => {
                let element = new_element(&resolved, &e, position)?;
                stack.push((element, reader.buffer_position()));
            }
            Event::Empty(e) => {
                let element = new_element(&resolved, &e, position)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let (mut element, content_start) = stack.pop().ok_or_else(|| {
                    WfsError::MalformedXml(format!("unbalanced end tag at byte {}", position))
                })?;
                element.markup = input
                    .get(content_start..position)
                    .unwrap_or_default()
                    .to_string();
                attach(&mut stack, &mut root, element);
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| malformed(position, e))?;
                if let Some((current, _)) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some((current, _)) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(WfsError::MalformedXml(
            "document ended before all elements were closed".to_string(),
        ));
    }
    root.ok_or_else(|| WfsError::MalformedXml("document has no root element".to_string()))
}

fn new_element(
    resolved: &ResolveResult<'_>,
    start: &quick_xml::events::BytesStart<'_>,
    position: usize,
) -> WfsResult<XmlElement> {
    let namespace = match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(WfsError::MalformedXml(format!(
                "undeclared namespace prefix '{}'",
                String::from_utf8_lossy(prefix)
            )))
        }
    };

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(position, e))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let value = attr.unescape_value().map_err(|e| malformed(position, e))?;
        attributes.push((
            String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
            value.into_owned(),
        ));
    }

    Ok(XmlElement {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        text: String::new(),
        markup: String::new(),
    })
}

fn attach(
    stack: &mut [(XmlElement, usize)],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) {
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn malformed(position: usize, err: impl std::fmt::Display) -> WfsError {
    WfsError::MalformedXml(format!("XML parsing error at byte {}: {}", position, err))
}

/// Escape text or attribute content for inclusion in an XML document.
pub fn escape(value: &str) -> std::borrow::Cow<'_, str> {
    quick_xml::escape::escape(value)
}
