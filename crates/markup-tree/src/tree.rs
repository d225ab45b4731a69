//! The normalized tree model and its JSON representation.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{ConvertError, Result};

/// Reserved key holding an element's attributes.
pub const ATTRIBUTES_KEY: &str = "@attributes";

/// Reserved key holding an element's trimmed direct text.
pub const TEXT_KEY: &str = "#text";

/// A normalized markup node.
///
/// Text-only leaves collapse to [`NormalizedTree::Scalar`]; everything else,
/// including empty elements, is an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedTree {
    Scalar(String),
    Object(Element),
}

/// An element that carries attributes, children, or nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Attributes in document order. Empty means "no attributes key".
    pub attributes: IndexMap<String, String>,
    /// Trimmed direct text, absent when empty or whitespace-only.
    pub text: Option<String>,
    /// Child values keyed by tag, in order of first occurrence.
    pub children: IndexMap<String, Child>,
}

/// The value stored under a child tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// The tag appeared exactly once under its parent.
    Single(NormalizedTree),
    /// The tag appeared two or more times; document order is preserved.
    Many(Vec<NormalizedTree>),
}

impl Child {
    /// Append another occurrence, promoting a single value to a list.
    pub fn push(&mut self, value: NormalizedTree) {
        let merged = match std::mem::replace(self, Child::Many(Vec::new())) {
            Child::Single(first) => vec![first, value],
            Child::Many(mut items) => {
                items.push(value);
                items
            }
        };
        *self = Child::Many(merged);
    }

    /// Number of occurrences represented by this value.
    pub fn len(&self) -> usize {
        match self {
            Child::Single(_) => 1,
            Child::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate occurrences regardless of whether the tag repeated.
    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedTree> {
        match self {
            Child::Single(value) => std::slice::from_ref(value).iter(),
            Child::Many(items) => items.iter(),
        }
    }

    /// The first occurrence.
    pub fn first(&self) -> Option<&NormalizedTree> {
        self.iter().next()
    }
}

impl Element {
    /// Insert a normalized child under `tag`, applying the repeat rule.
    pub fn insert_child(&mut self, tag: &str, value: NormalizedTree) {
        match self.children.get_mut(tag) {
            Some(slot) => slot.push(value),
            None => {
                self.children.insert(tag.to_string(), Child::Single(value));
            }
        }
    }

    /// Apply the collapse rule: a text-only element becomes a bare scalar.
    pub fn into_tree(self) -> NormalizedTree {
        match self {
            Element {
                attributes,
                text: Some(text),
                children,
            } if attributes.is_empty() && children.is_empty() => NormalizedTree::Scalar(text),
            element => NormalizedTree::Object(element),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn child(&self, tag: &str) -> Option<&Child> {
        self.children.get(tag)
    }

    fn key_count(&self) -> usize {
        usize::from(!self.attributes.is_empty())
            + usize::from(self.text.is_some())
            + self.children.len()
    }
}

impl NormalizedTree {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            NormalizedTree::Object(element) => Some(element),
            NormalizedTree::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            NormalizedTree::Scalar(text) => Some(text),
            NormalizedTree::Object(_) => None,
        }
    }

    /// Attribute lookup; scalars never carry attributes.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.as_element().and_then(|e| e.attribute(name))
    }

    pub fn child(&self, tag: &str) -> Option<&Child> {
        self.as_element().and_then(|e| e.child(tag))
    }

    /// Text content whether the node collapsed or not.
    pub fn text(&self) -> Option<&str> {
        match self {
            NormalizedTree::Scalar(text) => Some(text),
            NormalizedTree::Object(element) => element.text.as_deref(),
        }
    }

    /// Convert into a `serde_json::Value`.
    pub fn to_value(&self) -> Value {
        // Serialization into a Value cannot fail for string-keyed maps.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rebuild a tree from its JSON representation.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(NormalizedTree::Scalar(text.clone())),
            Value::Object(map) => {
                let mut element = Element::default();
                for (key, entry) in map {
                    match key.as_str() {
                        ATTRIBUTES_KEY => element.attributes = attributes_from_value(entry)?,
                        TEXT_KEY => {
                            let text = entry.as_str().ok_or_else(|| {
                                ConvertError::Shape(format!("{TEXT_KEY} must be a string"))
                            })?;
                            element.text = Some(text.to_string());
                        }
                        tag => {
                            let child = match entry {
                                Value::Array(items) => Child::Many(
                                    items
                                        .iter()
                                        .map(NormalizedTree::from_value)
                                        .collect::<Result<Vec<_>>>()?,
                                ),
                                other => Child::Single(NormalizedTree::from_value(other)?),
                            };
                            element.children.insert(tag.to_string(), child);
                        }
                    }
                }
                Ok(NormalizedTree::Object(element))
            }
            other => Err(ConvertError::Shape(format!(
                "expected string or object, found {other}"
            ))),
        }
    }
}

fn attributes_from_value(value: &Value) -> Result<IndexMap<String, String>> {
    let map = value
        .as_object()
        .ok_or_else(|| ConvertError::Shape(format!("{ATTRIBUTES_KEY} must be an object")))?;
    map.iter()
        .map(|(name, v)| {
            v.as_str()
                .map(|s| (name.clone(), s.to_string()))
                .ok_or_else(|| ConvertError::Shape(format!("attribute {name} must be a string")))
        })
        .collect()
}

impl Serialize for NormalizedTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NormalizedTree::Scalar(text) => serializer.serialize_str(text),
            NormalizedTree::Object(element) => element.serialize(serializer),
        }
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.key_count()))?;
        if !self.attributes.is_empty() {
            map.serialize_entry(ATTRIBUTES_KEY, &self.attributes)?;
        }
        if let Some(text) = &self.text {
            map.serialize_entry(TEXT_KEY, text)?;
        }
        for (tag, child) in &self.children {
            map.serialize_entry(tag, child)?;
        }
        map.end()
    }
}

impl Serialize for Child {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Child::Single(value) => value.serialize(serializer),
            Child::Many(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for NormalizedTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        NormalizedTree::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// A converted document: the root wrapped as a single-entry object keyed by
/// the root tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub root_tag: String,
    pub root: NormalizedTree,
}

impl NormalizedDocument {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ConvertError::Shape("document must be an object".to_string()))?;
        let mut entries = map.iter();
        match (entries.next(), entries.next()) {
            (Some((tag, root)), None) => Ok(NormalizedDocument {
                root_tag: tag.clone(),
                root: NormalizedTree::from_value(root)?,
            }),
            _ => Err(ConvertError::Shape(format!(
                "document must have exactly one root key, found {}",
                map.len()
            ))),
        }
    }

    /// Pretty JSON text, as persisted in the analysis workspace.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for NormalizedDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.root_tag, &self.root)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for NormalizedDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        NormalizedDocument::from_value(&value).map_err(serde::de::Error::custom)
    }
}
