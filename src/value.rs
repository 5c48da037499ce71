//! Format-agnostic response trees.
//!
//! Every handler produces a [`Value`] tree; the content negotiation layer
//! serializes it to either the Subsonic XML attribute-tree form or plain
//! JSON. The two outputs are only equivalent up to the attribute-vs-nested
//! distinction, which Subsonic clients are expected to tolerate.

use std::io::Cursor;

use indexmap::IndexMap;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use thiserror::Error;

/// A recursive, insertion-ordered value tree.
///
/// Scalars become XML attributes, objects become child elements, and lists
/// become repeated sibling elements named by their key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Object(Object),
    List(Vec<Value>),
    String(String),
    Int(i64),
    Bool(bool),
    Null,
}

/// An insertion-ordered string-keyed mapping of [`Value`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object(IndexMap<String, Value>);

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("document root must be an object with exactly one key")]
    InvalidRoot,

    #[error("list item under '{0}' is not an object; cannot render as an element")]
    ScalarListItem(String),

    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoded XML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, replacing any existing entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert for literal tree construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert only if the key is absent.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Value {
    /// Render a scalar as an XML attribute value. `Null` becomes the empty
    /// string; composite values have no attribute form.
    fn as_attribute(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some(String::new()),
            Value::Object(_) | Value::List(_) => None,
        }
    }
}

/// Encode a tree as an XML document.
///
/// The root must be an object with exactly one key naming the document
/// element. Within each object, scalar entries become attributes, object
/// entries become a single child element, and list entries become one
/// sibling child element per item, all named by the entry's key.
pub fn to_xml(root: &Object) -> Result<String, EncodeError> {
    if root.len() != 1 {
        return Err(EncodeError::InvalidRoot);
    }
    let (name, value) = root.iter().next().ok_or(EncodeError::InvalidRoot)?;
    let Value::Object(body) = value else {
        return Err(EncodeError::InvalidRoot);
    };

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_element(&mut writer, name, body)?;
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    body: &Object,
) -> Result<(), EncodeError> {
    let mut start = BytesStart::new(name);
    let mut children: Vec<(&str, &Object)> = Vec::new();

    for (key, value) in body.iter() {
        match value {
            Value::Object(child) => children.push((key, child)),
            Value::List(items) => {
                for item in items {
                    let Value::Object(child) = item else {
                        return Err(EncodeError::ScalarListItem(key.clone()));
                    };
                    children.push((key, child));
                }
            }
            scalar => {
                let rendered = scalar
                    .as_attribute()
                    .unwrap_or_default();
                start.push_attribute((key.as_str(), rendered.as_str()));
            }
        }
    }

    if children.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        for (key, child) in children {
            write_element(writer, key, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

/// Convert a tree to its JSON form. Structural: objects, arrays, scalars,
/// with no attribute/element distinction.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Object(obj) => serde_json::Value::Object(
            obj.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
    }
}
