// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Normalized view of one decoded log record.
//!
//! Records arrive as MessagePack maps whose keys and string values may be
//! encoded either as `str` or as `bin`. Normalization folds both into
//! [`Value::Text`] (binary is decoded as lossy UTF-8) and recurses into nested
//! maps, so field lookups never have to care which encoding the host used.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::collections::HashMap;
use std::fmt;

/// A record field value after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Map(Record),
    Array(Vec<Value>),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    Nil,
    /// MessagePack extension value that is not a text or container.
    Ext { tag: i8, data: Vec<u8> },
}

impl Value {
    /// Short type name used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
            Value::Integer(_) | Value::Unsigned(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Ext { .. } => "ext",
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Map(value)
    }
}

/// Key -> value mapping decoded from one upstream log line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of record fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Record, A::Error> {
        let mut fields = HashMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((FieldKey(key), value)) = map.next_entry::<FieldKey, Value>()? {
            fields.insert(key, value);
        }
        Ok(Record { fields })
    }
}

/// Map keys may be `str`, `bin`, or (rarely) scalars; all become text.
struct FieldKey(String);

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldKeyVisitor)
    }
}

struct FieldKeyVisitor;

impl<'de> Visitor<'de> for FieldKeyVisitor {
    type Value = FieldKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a text, binary or scalar map key")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldKey, E> {
        Ok(FieldKey(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<FieldKey, E> {
        Ok(FieldKey(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<FieldKey, E> {
        Ok(FieldKey(String::from_utf8_lossy(v).into_owned()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldKey, E> {
        Ok(FieldKey(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldKey, E> {
        Ok(FieldKey(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldKey, E> {
        Ok(FieldKey(v.to_string()))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a MessagePack value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Unsigned(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Text(String::from_utf8_lossy(v).into_owned()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Text(match String::from_utf8(v) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    // rmp-serde surfaces extension types as a newtype wrapping (tag, bytes).
    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Value, D::Error> {
        let (tag, data): (i8, serde_bytes::ByteBuf) = Deserialize::deserialize(deserializer)?;
        Ok(Value::Ext {
            tag,
            data: data.into_vec(),
        })
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element::<Value>()? {
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Value, A::Error> {
        RecordVisitor.visit_map(map).map(Value::Map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Nested {
        inner: &'static str,
    }

    #[test]
    fn test_text_and_binary_values_normalize_to_text() {
        let mut source: BTreeMap<&str, rmp_serde_value::Raw> = BTreeMap::new();
        source.insert("str", rmp_serde_value::Raw::Str("hello"));
        source.insert("bin", rmp_serde_value::Raw::Bin(b"world"));
        let bytes = rmp_serde::to_vec(&source).unwrap();

        let record: Record = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(record.get("str"), Some(&Value::Text("hello".to_string())));
        assert_eq!(record.get("bin"), Some(&Value::Text("world".to_string())));
    }

    #[test]
    fn test_nested_maps_recurse() {
        let mut source = BTreeMap::new();
        source.insert("kubernetes", Nested { inner: "pod-1" });
        let bytes = rmp_serde::to_vec_named(&source).unwrap();

        let record: Record = rmp_serde::from_slice(&bytes).unwrap();
        let Some(Value::Map(nested)) = record.get("kubernetes") else {
            panic!("expected nested map");
        };
        assert_eq!(nested.get("inner").and_then(Value::as_text), Some("pod-1"));
    }

    #[test]
    fn test_scalars_keep_their_kind() {
        let source = (42u64, -1i64, 1.5f64, true, Option::<u8>::None, vec![1u8, 2u8]);
        let bytes = rmp_serde::to_vec(&source).unwrap();

        let value: Value = rmp_serde::from_slice(&bytes).unwrap();
        let Value::Array(values) = value else {
            panic!("expected array");
        };
        assert_eq!(values[0], Value::Unsigned(42));
        assert_eq!(values[1], Value::Integer(-1));
        assert_eq!(values[2], Value::Float(1.5));
        assert_eq!(values[3], Value::Bool(true));
        assert_eq!(values[4], Value::Nil);
        assert_eq!(values[5].kind(), "array");
    }

    #[test]
    fn test_non_map_is_not_a_record() {
        let bytes = rmp_serde::to_vec(&"just a string").unwrap();
        assert!(rmp_serde::from_slice::<Record>(&bytes).is_err());
    }

    /// Minimal serializer helpers to force `str` vs `bin` encodings.
    mod rmp_serde_value {
        use serde::{Serialize, Serializer};

        pub enum Raw {
            Str(&'static str),
            Bin(&'static [u8]),
        }

        impl Serialize for Raw {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self {
                    Raw::Str(s) => serializer.serialize_str(s),
                    Raw::Bin(b) => serializer.serialize_bytes(b),
                }
            }
        }
    }
}
