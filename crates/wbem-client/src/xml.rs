//! Minimal owned XML tree and writer for CIM-XML documents.

use std::borrow::Cow;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// An element with its attributes, child elements and character data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn required_attr(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| {
            Error::protocol(format!("<{}> is missing the {} attribute", self.name, name))
        })
    }

    /// Parse a `TRUE`/`FALSE` attribute; absent yields `None`.
    pub fn bool_attr(&self, name: &str) -> Result<Option<bool>> {
        match self.attr(name) {
            None => Ok(None),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(v) => Err(Error::protocol(format!(
                "Invalid boolean {:?} for {} on <{}>",
                v, name, self.name
            ))),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(name))
    }

    pub fn required_child(&self, name: &str) -> Result<&Element> {
        self.child(name).ok_or_else(|| {
            Error::protocol(format!("<{}> is missing a <{}> child", self.name, name))
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.is(name))
    }
}

fn utf8<'a>(bytes: Cow<'a, [u8]>) -> Result<String> {
    String::from_utf8(bytes.into_owned())
        .map_err(|e| Error::protocol(format!("Invalid UTF-8 in XML: {}", e)))
}

fn start_element(start: &BytesStart<'_>) -> Result<Element> {
    let name = utf8(Cow::Borrowed(start.name().as_ref()))?;
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| Error::protocol(format!("Malformed XML attribute: {}", e)))?;
        let key = utf8(Cow::Borrowed(attribute.key.as_ref()))?;
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Parse a complete document and return its root element.
pub fn parse(document: &str) -> Result<Element> {
    let mut reader = Reader::from_str(document);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(start_element(&start)?),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::protocol("Unbalanced XML end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&utf8(Cow::Owned(data.into_inner().into_owned()))?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::protocol("Unexpected end of XML document"));
    }
    root.ok_or_else(|| Error::protocol("Empty XML document"))
}

/// Appends well-formed XML to a string buffer.
#[derive(Debug, Default)]
pub struct XmlWriter {
    buf: String,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declaration(&mut self) {
        self.buf
            .push_str("<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n");
    }

    fn open_tag(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.buf.push('<');
        self.buf.push_str(name);
        for (key, value) in attributes {
            self.buf.push(' ');
            self.buf.push_str(key);
            self.buf.push_str("=\"");
            self.buf.push_str(&escape(*value));
            self.buf.push('"');
        }
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open_tag(name, attributes);
        self.buf.push('>');
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open_tag(name, attributes);
        self.buf.push_str("/>");
    }

    pub fn end(&mut self, name: &str) {
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
    }

    pub fn text(&mut self, text: &str) {
        self.buf.push_str(&escape(text));
    }

    /// `<name attrs>text</name>`
    pub fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) {
        self.start(name, attributes);
        self.text(text);
        self.end(name);
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
