//! The `<KEY:VALUE>` metadata grammar and the parsed metadata tree.
//!
//! Metadata blocks are ASCII repetitions of `<KEY:VALUE>` tokens. Keys never
//! contain `<`, `>`, or `:`; values are matched minimally up to the next `>`
//! and may contain anything else, including `<` and `:`. A key may repeat,
//! in which case every value is kept in encounter order.

use crate::{Error, Result};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// The five layer names a page may address, in their canonical order.
pub(crate) const LAYER_NAMES: [&str; 5] = ["MAINLAYER", "LAYER1", "LAYER2", "LAYER3", "BGLAYER"];

/// A metadata value.
///
/// Values start out scalar and are promoted to an ordered list the first
/// time their key repeats. Whether a value is scalar or a list is a
/// presentation detail of the file, not a semantic one, so most callers go
/// through [Params::get] and [Params::get_all] instead of matching on this.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A key that appeared once.
    Scalar(String),
    /// A key that appeared more than once, values in encounter order.
    List(Vec<String>),
}

impl Value {
    /// Returns the first value.
    pub fn first(&self) -> &str {
        match self {
            Value::Scalar(value) => value,
            Value::List(values) => &values[0],
        }
    }

    /// Returns all values in encounter order.
    pub fn all(&self) -> Vec<&str> {
        match self {
            Value::Scalar(value) => vec![value],
            Value::List(values) => values.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Value::Scalar(first) => {
                *self = Value::List(vec![std::mem::take(first), value]);
            }
            Value::List(values) => values.push(value),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(value) => serializer.serialize_str(value),
            Value::List(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

/// An insertion-ordered collection of metadata parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Tokenizes a metadata block payload.
    ///
    /// Junk between tokens is skipped, matching how the device tolerates
    /// padding. A non-empty payload that yields no tokens at all is
    /// malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use supernote::Params;
    /// let params = Params::parse(b"<FILE_TYPE:NOTE><PAGE:24>").unwrap();
    /// assert_eq!(Some("NOTE"), params.get("FILE_TYPE"));
    /// ```
    pub fn parse(payload: &[u8]) -> Result<Params> {
        let text = std::str::from_utf8(payload).map_err(|e| {
            Error::MalformedMetadata(format!("metadata block is not valid UTF-8: {e}"))
        })?;
        let mut params = Params::default();
        let mut rest = text;
        while let Some(start) = rest.find('<') {
            rest = &rest[start + 1..];
            let Some(colon) = rest.find(':') else {
                break;
            };
            let key = &rest[..colon];
            if key.is_empty() || key.contains(['<', '>']) {
                continue;
            }
            let Some(end) = rest[colon + 1..].find('>') else {
                break;
            };
            let value = &rest[colon + 1..colon + 1 + end];
            params.push(key.to_string(), value.to_string());
            rest = &rest[colon + 1 + end + 1..];
        }
        if params.entries.is_empty() && !payload.is_empty() {
            return Err(Error::MalformedMetadata(
                "no <KEY:VALUE> tokens found".to_string(),
            ));
        }
        Ok(params)
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_value(key).map(Value::first)
    }

    /// Returns the [Value] stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns every value stored under `key`, in encounter order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.get_value(key).map(Value::all).unwrap_or_default()
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Iterates over keys in order of first appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates over entries in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replaces the value under `key`, or inserts it.
    pub fn set(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = Value::Scalar(value),
            None => self.entries.push((key.to_string(), Value::Scalar(value))),
        }
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((key, Value::Scalar(value))),
        }
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// The footer block plus the satellite metadata it indexes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Footer {
    /// The raw footer parameters.
    pub params: Params,
    /// Resolved keyword metadata blocks, in footer order.
    pub keywords: Vec<Params>,
    /// Resolved title metadata blocks, in footer order.
    pub titles: Vec<Params>,
    /// Resolved link metadata blocks, in footer order.
    pub links: Vec<Params>,
}

impl Serialize for Footer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let extras = [
            ("__keywords__", &self.keywords),
            ("__titles__", &self.titles),
            ("__links__", &self.links),
        ];
        let len = self.params.len() + extras.iter().filter(|(_, v)| !v.is_empty()).count();
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in self.params.iter() {
            map.serialize_entry(key, value)?;
        }
        for (key, value) in extras {
            if !value.is_empty() {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// One page's parameters, with its layer blocks when the family has them.
#[derive(Clone, Debug, PartialEq)]
pub struct PageParams {
    /// The page block parameters.
    pub params: Params,
    /// Layer blocks in page-block order, or `None` for the legacy family.
    pub layers: Option<Vec<Params>>,
}

impl Serialize for PageParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = self.params.len() + usize::from(self.layers.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in self.params.iter() {
            map.serialize_entry(key, value)?;
        }
        if let Some(layers) = &self.layers {
            map.serialize_entry("__layers__", layers)?;
        }
        map.end()
    }
}

/// The parsed structure of a note file.
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    /// The matched signature string.
    pub signature: String,
    /// The four-byte ASCII tag at the start of the file.
    pub file_type: String,
    /// The header block.
    pub header: Params,
    /// The footer block and its satellites.
    pub footer: Footer,
    /// Page blocks in footer order.
    pub pages: Vec<PageParams>,
}

impl Metadata {
    /// Returns the total page count.
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if the given page addresses its bitmaps through layers.
    pub fn is_layer_supported(&self, page_number: usize) -> Result<bool> {
        self.pages
            .get(page_number)
            .map(|page| page.layers.is_some())
            .ok_or(Error::PageOutOfRange {
                page: page_number,
                total: self.pages.len(),
            })
    }

    /// Serializes the tree as JSON, key order preserved.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the tree as indented JSON, key order preserved.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("__signature__", &self.signature)?;
        map.serialize_entry("__type__", &self.file_type)?;
        map.serialize_entry("__header__", &self.header)?;
        map.serialize_entry("__footer__", &self.footer)?;
        map.serialize_entry("__pages__", &self.pages)?;
        map.end()
    }
}
