//! Typed property bags attached to players and rooms.
//!
//! Values are restricted to text, numbers and booleans so the encoding stays
//! deterministic: entries are kept sorted by key and encoded in that order.

use std::collections::BTreeMap;

use wire::{ByteReader, ByteWriter, DecodeError, EncodeError, LimitKind, Limits, WireResult};

const KIND_TEXT: u8 = 0;
const KIND_NUMBER: u8 = 1;
const KIND_BOOL: u8 = 2;

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered string-keyed property map.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value; empty keys are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        if key.is_empty() {
            return;
        }
        self.0.insert(key, value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PropertyValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Copies every entry of `other` into `self`, overwriting on conflict.
    pub fn extend_from(&mut self, other: &Self) {
        for (key, value) in other.iter() {
            self.0.insert(key.to_owned(), value.clone());
        }
    }

    /// Returns `true` if every entry of `filter` is present with an equal value.
    #[must_use]
    pub fn matches(&self, filter: &Self) -> bool {
        filter.iter().all(|(key, value)| self.get(key) == Some(value))
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

/// Encodes a property bag.
///
/// Layout: `u16 count | (u16 key_len | key | u8 kind | value)*` with text
/// values as `u16 len | utf8`, numbers as `f64` and booleans as one byte.
pub fn encode_properties(properties: &Properties, limits: &Limits) -> Result<Vec<u8>, EncodeError> {
    if properties.len() > limits.max_properties {
        return Err(EncodeError::LimitsExceeded {
            kind: LimitKind::PropertyCount,
            limit: limits.max_properties,
            actual: properties.len(),
        });
    }
    let count = u16::try_from(properties.len()).map_err(|_| EncodeError::LengthOverflow {
        length: properties.len(),
        prefix: 16,
    })?;

    let mut writer = ByteWriter::new();
    writer.write_u16(count);
    for (key, value) in properties.iter() {
        writer.write_short_str(key)?;
        match value {
            PropertyValue::Text(text) => {
                writer.write_u8(KIND_TEXT);
                writer.write_short_str(text)?;
            }
            PropertyValue::Number(number) => {
                writer.write_u8(KIND_NUMBER);
                writer.write_f64(*number);
            }
            PropertyValue::Bool(flag) => {
                writer.write_u8(KIND_BOOL);
                writer.write_u8(u8::from(*flag));
            }
        }
    }
    Ok(writer.finish())
}

/// Decodes a property bag.
pub fn decode_properties(buf: &[u8], limits: &Limits) -> WireResult<Properties> {
    let mut reader = ByteReader::new(buf);
    let count = usize::from(reader.read_u16()?);
    if count > limits.max_properties {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::PropertyCount,
            limit: limits.max_properties,
            actual: count,
        });
    }

    let mut properties = Properties::new();
    for _ in 0..count {
        let key = reader.read_short_str(LimitKind::TextBytes, usize::from(u16::MAX))?;
        let value = match reader.read_u8()? {
            KIND_TEXT => PropertyValue::Text(
                reader
                    .read_short_str(LimitKind::TextBytes, usize::from(u16::MAX))?
                    .to_owned(),
            ),
            KIND_NUMBER => PropertyValue::Number(reader.read_f64()?),
            KIND_BOOL => PropertyValue::Bool(reader.read_u8()? != 0),
            kind => return Err(DecodeError::UnknownPropertyKind { kind }),
        };
        properties.insert(key, value);
    }
    reader.expect_end()?;
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_keys_are_dropped() {
        let mut properties = Properties::new();
        properties.insert("", "x");
        assert!(properties.is_empty());
    }

    #[test]
    fn encoding_is_sorted_by_key() {
        let a: Properties = [("b", PropertyValue::Bool(true)), ("a", PropertyValue::Bool(false))]
            .into_iter()
            .collect();
        let b: Properties = [("a", PropertyValue::Bool(false)), ("b", PropertyValue::Bool(true))]
            .into_iter()
            .collect();
        let limits = Limits::default();
        assert_eq!(
            encode_properties(&a, &limits).unwrap(),
            encode_properties(&b, &limits).unwrap()
        );
        let bytes = encode_properties(&a, &limits).unwrap();
        assert_eq!(&bytes[0..2], &[2, 0]);
        assert_eq!(&bytes[2..5], &[1, 0, b'a']);
    }

    #[test]
    fn mixed_values_decode() {
        let mut properties = Properties::new();
        properties.insert("map", "harbor");
        properties.insert("round", 3);
        properties.insert("ranked", true);
        let limits = Limits::default();
        let bytes = encode_properties(&properties, &limits).unwrap();
        let decoded = decode_properties(&bytes, &limits).unwrap();
        assert_eq!(decoded, properties);
        assert_eq!(decoded.get_str("map"), Some("harbor"));
        assert_eq!(decoded.get("round"), Some(&PropertyValue::Number(3.0)));
    }

    #[test]
    fn unknown_kind_rejected() {
        let bytes = [1, 0, 1, 0, b'k', 9];
        assert_eq!(
            decode_properties(&bytes, &Limits::default()),
            Err(DecodeError::UnknownPropertyKind { kind: 9 })
        );
    }

    #[test]
    fn count_limit_enforced() {
        let properties: Properties = (0..20).map(|i| (format!("k{i}"), i)).collect();
        assert!(encode_properties(&properties, &Limits::for_testing()).is_err());
    }

    #[test]
    fn matches_requires_every_filter_entry() {
        let mut room = Properties::new();
        room.insert("queue", "ranked");
        room.insert("map", "harbor");

        let mut filter = Properties::new();
        filter.insert("queue", "ranked");
        assert!(room.matches(&filter));

        filter.insert("map", "docks");
        assert!(!room.matches(&filter));
        assert!(room.matches(&Properties::new()));
    }
}
