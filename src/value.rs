//! Self-describing geolocation records.
//!
//! A MaxMind DB entry is a tree of typed values. [`Value`] keeps the runtime
//! type tag of every node so callers can walk a record by field path and
//! decide, per leaf, whether the stored type is one they know how to render.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::{collections::BTreeMap, fmt};
use tracing::warn;

/// One node of a decoded record, tagged with its MaxMind DB data type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Utf8String(String),
    Double(f64),
    Bytes(Vec<u8>),
    Uint16(u16),
    Uint32(u32),
    Map(BTreeMap<String, Value>),
    Int32(i32),
    Uint64(u64),
    Uint128(u128),
    Array(Vec<Value>),
    Boolean(bool),
    Float(f32),
}

/// Outcome of walking a [`Value`] along a field path.
///
/// Only the four scalar kinds that can be rendered as a string get their own
/// variant; every other leaf is reported as `Unsupported` with its type name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Utf8String(&'a str),
    Uint16(u16),
    Double(f64),
    Boolean(bool),
    Unsupported(&'static str),
    Absent,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Utf8String(_) => "utf8_string",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::Uint16(_) => "uint16",
            Value::Uint32(_) => "uint32",
            Value::Map(_) => "map",
            Value::Int32(_) => "int32",
            Value::Uint64(_) => "uint64",
            Value::Uint128(_) => "uint128",
            Value::Array(_) => "array",
            Value::Boolean(_) => "boolean",
            Value::Float(_) => "float",
        }
    }

    /// Descends one level: a map key, or a decimal index into an array.
    pub fn get(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Map(fields) => fields.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Walks `path` from this node and classifies the leaf it lands on.
    ///
    /// A missing key, an out-of-range index and a path that continues past a
    /// scalar all resolve to [`Resolved::Absent`].
    pub fn resolve_path(&self, path: &[&str]) -> Resolved<'_> {
        let mut node = self;
        for segment in path {
            node = match node.get(segment) {
                Some(next) => next,
                None => return Resolved::Absent,
            };
        }

        match node {
            Value::Utf8String(s) => Resolved::Utf8String(s),
            Value::Uint16(n) => Resolved::Uint16(*n),
            Value::Double(d) => Resolved::Double(*d),
            Value::Boolean(b) => Resolved::Boolean(*b),
            other => Resolved::Unsupported(other.type_name()),
        }
    }
}

impl Resolved<'_> {
    /// Renders a supported scalar as an owned string.
    ///
    /// Doubles use six fractional digits, booleans become `"0"` or `"1"`.
    pub fn coerce(&self) -> Option<String> {
        match *self {
            Resolved::Utf8String(s) => Some(s.to_owned()),
            Resolved::Uint16(n) => Some(n.to_string()),
            Resolved::Double(d) => Some(format!("{:.6}", d)),
            Resolved::Boolean(b) => Some(if b { "1" } else { "0" }.to_owned()),
            Resolved::Unsupported(_) | Resolved::Absent => None,
        }
    }
}

/// Resolves `path` inside `entry` and returns the leaf as a string.
///
/// Returns `None` when the field is missing or its type has no string form;
/// the latter is logged since it usually means the path points at the wrong
/// node for this database edition.
pub fn extract(entry: &Value, path: &[&str]) -> Option<String> {
    match entry.resolve_path(path) {
        Resolved::Unsupported(kind) => {
            warn!("No string form for {} field at {}", kind, path.join("."));
            None
        }
        resolved => resolved.coerce(),
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a MaxMind DB value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i32<E: de::Error>(self, v: i32) -> Result<Value, E> {
        Ok(Value::Int32(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        i32::try_from(v)
            .map(Value::Int32)
            .map_err(|_| E::custom(format!("signed integer {} out of range", v)))
    }

    fn visit_u16<E: de::Error>(self, v: u16) -> Result<Value, E> {
        Ok(Value::Uint16(v))
    }

    fn visit_u32<E: de::Error>(self, v: u32) -> Result<Value, E> {
        Ok(Value::Uint32(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Uint64(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Value, E> {
        Ok(Value::Uint128(v))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Utf8String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Utf8String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut fields = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            fields.insert(key, value);
        }
        Ok(Value::Map(fields))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Utf8String(s) => serializer.serialize_str(s),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Uint16(n) => serializer.serialize_u16(*n),
            Value::Uint32(n) => serializer.serialize_u32(*n),
            Value::Int32(n) => serializer.serialize_i32(*n),
            Value::Uint64(n) => serializer.serialize_u64(*n),
            Value::Uint128(n) => serializer.serialize_u128(*n),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Float(f) => serializer.serialize_f32(*f),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
