//! Payload values (C1): a typed tree of request/response values with a
//! cross-process wire encoding.
//!
//! The source this core is modelled on threads a dynamically-typed JSON
//! tree through every backend request. We re-express that as a tagged
//! variant, [`Value`], whose map keys are [`Ident`] — small interned
//! handles rather than owned `String`s — so that equality and hashing
//! against the handful of well-known protocol keywords (`key.offset`,
//! `source.request.cursorinfo`, ...) are O(1) instead of string
//! comparisons on every dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A handle into a backend-owned table of canonical protocol strings.
/// Obtained once per backend channel at initialization (§6) via
/// [`InternTable::intern`], then compared and hashed as a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(u32);

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        INTERN_TABLE.resolve(*self).map_or_else(
            || write!(f, "<ident#{}>", self.0),
            |s| write!(f, "{s}"),
        )
    }
}

/// Process-wide table mapping well-known protocol keywords to [`Ident`]
/// handles. Each [`crate::backend::BackendChannel`] interns its own set
/// of keywords at startup; the table is shared so that identical
/// keywords reported by different backends collapse to the same handle.
pub struct InternTable {
    by_string: DashMap<String, Ident>,
    by_ident: DashMap<Ident, String>,
    next: AtomicU32,
}

impl InternTable {
    fn new() -> Self {
        Self { by_string: DashMap::new(), by_ident: DashMap::new(), next: AtomicU32::new(0) }
    }

    pub fn intern(&self, keyword: &str) -> Ident {
        if let Some(existing) = self.by_string.get(keyword) {
            return *existing;
        }
        let id = Ident(self.next.fetch_add(1, Ordering::Relaxed));
        self.by_string.insert(keyword.to_string(), id);
        self.by_ident.insert(id, keyword.to_string());
        id
    }

    pub fn resolve(&self, ident: Ident) -> Option<String> {
        self.by_ident.get(&ident).map(|s| s.clone())
    }
}

pub static INTERN_TABLE: Lazy<InternTable> = Lazy::new(InternTable::new);

/// A tagged variant value: the wire representation exchanged with a
/// backend channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Ident(Ident),
    List(Vec<Value>),
    Map(HashMap<Ident, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<Ident, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: Ident) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(&key))
    }
}

/// Wire form of [`Value`]: map keys round-trip as the interned
/// keyword's canonical string, since an `Ident` handle is only valid
/// within a single process.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<WireValue>),
    Map(HashMap<String, WireValue>),
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(*b),
            Value::Int(i) => WireValue::Int(*i),
            Value::Str(s) => WireValue::Str(s.clone()),
            Value::Ident(ident) => {
                WireValue::Str(INTERN_TABLE.resolve(*ident).unwrap_or_default())
            }
            Value::List(items) => WireValue::List(items.iter().map(WireValue::from).collect()),
            Value::Map(map) => WireValue::Map(
                map.iter()
                    .map(|(k, v)| (k.to_string(), WireValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl WireValue {
    fn into_value(self) -> Value {
        match self {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(i) => Value::Int(i),
            WireValue::Str(s) => Value::Str(s),
            WireValue::List(items) => Value::List(items.into_iter().map(Self::into_value).collect()),
            WireValue::Map(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (INTERN_TABLE.intern(&k), v.into_value()))
                    .collect(),
            ),
        }
    }
}

impl Value {
    pub fn to_wire_json(&self) -> serde_json::Value {
        serde_json::to_value(WireValue::from(self)).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_wire_json(json: serde_json::Value) -> serde_json::Result<Value> {
        let wire: WireValue = serde_json::from_value(json)?;
        Ok(wire.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let table = InternTable::new();
        let a = table.intern("key.offset");
        let b = table.intern("key.offset");
        assert_eq!(a, b);
        let c = table.intern("key.name");
        assert_ne!(a, c);
    }

    #[test]
    fn wire_roundtrip_preserves_structure() {
        let mut map = HashMap::new();
        map.insert(INTERN_TABLE.intern("key.offset"), Value::Int(42));
        let value = Value::Map(map);
        let json = value.to_wire_json();
        let back = Value::from_wire_json(json).unwrap();
        assert_eq!(
            back.get(INTERN_TABLE.intern("key.offset")).and_then(Value::as_int),
            Some(42)
        );
    }
}
