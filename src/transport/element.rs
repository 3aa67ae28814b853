//! ZAPI element tree
//!
//! Requests and responses on the legacy backend are small XML documents.
//! `NaElement` is the in-memory form of one element: a name, optional text,
//! attributes and ordered children.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaElement {
    pub name: String,
    pub content: Option<String>,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<NaElement>,
}

impl NaElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Leaf element holding text
    pub fn leaf(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Element with one leaf child per field, in order
    pub fn with_children<K, V, I>(name: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut element = Self::new(name);
        for (k, v) in fields {
            element.children.push(Self::leaf(k, v));
        }
        element
    }

    pub fn add_child(&mut self, child: NaElement) -> &mut Self {
        self.children.push(child);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&NaElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_content(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.content.as_deref())
    }

    /// Append this element as XML to `out`
    pub fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push_str(&format!(" {}=\"{}\"", k, escape(v.as_str())));
        }
        if self.children.is_empty() && self.content.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(content) = &self.content {
            out.push_str(&escape(content.as_str()));
        }
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<NaElement> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<NaElement> = Vec::new();
        let mut root: Option<NaElement> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => stack.push(from_start(&start)?),
                Event::Empty(start) => {
                    let element = from_start(&start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_error)?;
                    if let Some(top) = stack.last_mut() {
                        top.content = Some(text.into_owned());
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        let data = data.into_inner();
                        top.content = Some(String::from_utf8_lossy(&data).into_owned());
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced closing tag".into()))?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::Xml(format!("unclosed element <{}>", stack[0].name)));
        }
        root.ok_or_else(|| Error::Xml("empty document".into()))
    }
}

fn from_start(start: &BytesStart<'_>) -> Result<NaElement> {
    let mut element = NaElement::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        element.attrs.insert(key, value);
    }
    Ok(element)
}

fn attach(stack: &mut [NaElement], root: &mut Option<NaElement>, element: NaElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::Xml(err.to_string())
}
