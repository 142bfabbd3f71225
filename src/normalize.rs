//! Record normalization: `efetch` XML to flat rows.
//!
//! Every child of the document root is one record. Each record's subtree is
//! converted into a nested value with the usual XML-to-object conventions
//! and then flattened into dotted paths:
//!
//! - attributes become `@name` keys
//! - text next to attributes or child elements becomes `#text`
//! - an element with only text becomes that string; an empty one becomes `null`
//! - repeated sibling tags collapse into a list, which is kept as a list value
//!
//! ```text
//! <EXPERIMENT accession="SRX1"><TITLE>t</TITLE></EXPERIMENT>
//!   => {"EXPERIMENT.@accession": "SRX1", "EXPERIMENT.TITLE": "t"}
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::models::{FetchRecord, MetadataTable};

/// Element tree built while reading
#[derive(Debug, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> Result<Self, FetchError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();

        for attribute in start.attributes() {
            let attribute = attribute
                .map_err(|e| FetchError::Parse(format!("XML attribute in <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();

        if self.attributes.is_empty() && self.children.is_empty() {
            return if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            };
        }

        let mut map = Map::new();
        for (key, value) in self.attributes {
            map.insert(format!("@{}", key), Value::String(value));
        }
        for child in self.children {
            let name = child.name.clone();
            insert_collapsing(&mut map, name, child.into_value());
        }
        if !text.is_empty() {
            map.insert("#text".to_string(), Value::String(text.to_string()));
        }

        Value::Object(map)
    }
}

/// Insert `value` under `key`, turning repeated keys into a list
fn insert_collapsing(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Read a whole document into its root element
fn parse_tree(xml: &str) -> Result<Node, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    fn close(node: Node, stack: &mut [Node], root: &mut Option<Node>) -> Result<(), FetchError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_none() => *root = Some(node),
            None => {
                return Err(FetchError::Parse(format!(
                    "XML: second root element <{}>",
                    node.name
                )))
            }
        }
        Ok(())
    }

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Node::open(&start)?),
            Event::Empty(start) => {
                let node = Node::open(&start)?;
                close(node, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| FetchError::Parse("XML: unexpected closing tag".to_string()))?;
                close(node, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FetchError::Parse(format!(
            "XML: unclosed element <{}>",
            open.name
        )));
    }

    root.ok_or_else(|| FetchError::Parse("XML: document has no root element".to_string()))
}

/// Name of the document's first element, if the prefix up to it is well formed
pub fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().ok()? {
            Event::Start(start) | Event::Empty(start) => {
                return Some(String::from_utf8_lossy(start.name().as_ref()).into_owned())
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

/// Flatten nested objects into dotted keys.
///
/// Lists and scalars are kept as values. A row with no nested objects is
/// returned unchanged, so flattening twice equals flattening once.
pub fn flatten_record(record: Map<String, Value>) -> FetchRecord {
    let mut out = Map::new();
    for (key, value) in record {
        flatten_into(key, value, &mut out);
    }
    out
}

fn flatten_into(prefix: String, value: Value, out: &mut FetchRecord) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(format!("{}.{}", prefix, key), nested, out);
            }
        }
        other => {
            out.insert(prefix, other);
        }
    }
}

/// Nested (unflattened) value of every record in the document
pub fn parse_records(xml: &str) -> Result<Vec<Map<String, Value>>, FetchError> {
    let root = parse_tree(xml)?;

    Ok(root
        .children
        .into_iter()
        .map(|record| {
            let mut fields = Map::new();
            for child in record.children {
                let name = child.name.clone();
                insert_collapsing(&mut fields, name, child.into_value());
            }
            fields
        })
        .collect())
}

/// Parse one fetch response into a table with one row per record
pub fn normalize(xml: &str) -> Result<MetadataTable, FetchError> {
    let records = parse_records(xml)?;
    Ok(MetadataTable::from_rows(
        records.into_iter().map(flatten_record),
    ))
}
