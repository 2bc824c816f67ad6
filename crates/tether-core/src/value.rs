// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Twin value model for TETHER.
//!
//! Twin documents are plain JSON, so [`TwinValue`] serializes untagged: a
//! property set round-trips byte-compatible with what the cloud stores. The
//! merge rules follow twin patch semantics throughout: a null value removes
//! the key it patches, map values merge key-wise with the incoming side
//! winning, everything else replaces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ValueError;

/// Key of the single entry that marks a reported value as a status echo.
///
/// A map value with exactly this one key is a handler status previously
/// reported back to the cloud, not configuration, and is suppressed from
/// reconciliation.
pub const STATUS_KEY: &str = "Status";

// =============================================================================
// TwinValue
// =============================================================================

/// A dynamically-typed twin property value.
///
/// # Examples
///
/// ```
/// use tether_core::value::TwinValue;
///
/// let level = TwinValue::from("Debug");
/// assert_eq!(level.as_str(), Some("Debug"));
///
/// let retries = TwinValue::from(3);
/// assert_eq!(retries.as_i64(), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TwinValue {
    /// Null, meaning "remove this key" when sent in a patch.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer number.
    Integer(i64),

    /// Floating point number.
    Float(f64),

    /// UTF-8 string.
    String(String),

    /// Array of values.
    Array(Vec<TwinValue>),

    /// Nested key-value map.
    Map(BTreeMap<String, TwinValue>),
}

impl TwinValue {
    /// Returns the type name of this value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            TwinValue::Null => "null",
            TwinValue::Bool(_) => "bool",
            TwinValue::Integer(_) => "integer",
            TwinValue::Float(_) => "float",
            TwinValue::String(_) => "string",
            TwinValue::Array(_) => "array",
            TwinValue::Map(_) => "map",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, TwinValue::Null)
    }

    /// Returns `true` if this value is a status echo wrapper: a map with
    /// exactly one entry keyed [`STATUS_KEY`].
    pub fn is_status_wrapper(&self) -> bool {
        match self {
            TwinValue::Map(map) => map.len() == 1 && map.contains_key(STATUS_KEY),
            _ => false,
        }
    }

    /// Attempts to read this value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TwinValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to read this value as an i64.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TwinValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to read this value as an f64. Integers widen losslessly.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TwinValue::Integer(v) => Some(*v as f64),
            TwinValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to read this value as a string slice.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TwinValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to read this value as an array slice.
    #[inline]
    pub fn as_array(&self) -> Option<&[TwinValue]> {
        match self {
            TwinValue::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to read this value as a map reference.
    #[inline]
    pub fn as_map(&self) -> Option<&BTreeMap<String, TwinValue>> {
        match self {
            TwinValue::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Reads this value as a boolean or fails with a type mismatch.
    pub fn try_bool(&self) -> Result<bool, ValueError> {
        self.as_bool()
            .ok_or_else(|| ValueError::type_mismatch("bool", self.type_name()))
    }

    /// Reads this value as an i64 or fails with a type mismatch.
    pub fn try_i64(&self) -> Result<i64, ValueError> {
        self.as_i64()
            .ok_or_else(|| ValueError::type_mismatch("integer", self.type_name()))
    }

    /// Reads this value as an f64 or fails with a type mismatch.
    pub fn try_f64(&self) -> Result<f64, ValueError> {
        self.as_f64()
            .ok_or_else(|| ValueError::type_mismatch("float", self.type_name()))
    }

    /// Reads this value as a string slice or fails with a type mismatch.
    pub fn try_str(&self) -> Result<&str, ValueError> {
        self.as_str()
            .ok_or_else(|| ValueError::type_mismatch("string", self.type_name()))
    }

    /// Reads this value as a map or fails with a type mismatch.
    pub fn try_map(&self) -> Result<&BTreeMap<String, TwinValue>, ValueError> {
        self.as_map()
            .ok_or_else(|| ValueError::type_mismatch("map", self.type_name()))
    }

    /// Merges a patch value onto this value using twin patch semantics.
    ///
    /// When both sides are maps the result is the key-wise merge: incoming
    /// entries win, incoming nulls remove keys, nested maps merge
    /// recursively. For every other combination the patch replaces this
    /// value wholesale (a top-level null patch yields null; the caller
    /// decides whether that removes the key).
    pub fn apply(&self, patch: &TwinValue) -> TwinValue {
        match (self, patch) {
            (TwinValue::Map(existing), TwinValue::Map(incoming)) => {
                let mut merged = existing.clone();
                for (key, value) in incoming {
                    if value.is_null() {
                        merged.remove(key);
                    } else {
                        let next = match merged.get(key) {
                            Some(current) => current.apply(value),
                            None => value.clone(),
                        };
                        merged.insert(key.clone(), next);
                    }
                }
                TwinValue::Map(merged)
            }
            _ => patch.clone(),
        }
    }

    /// Converts a JSON value into a twin value.
    ///
    /// Numbers that fit an i64 become integers; anything else becomes a
    /// float (twin documents share JSON's number model).
    pub fn from_json(value: serde_json::Value) -> TwinValue {
        match value {
            serde_json::Value::Null => TwinValue::Null,
            serde_json::Value::Bool(v) => TwinValue::Bool(v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => TwinValue::Integer(i),
                None => TwinValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(v) => TwinValue::String(v),
            serde_json::Value::Array(items) => {
                TwinValue::Array(items.into_iter().map(TwinValue::from_json).collect())
            }
            serde_json::Value::Object(map) => TwinValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, TwinValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this twin value into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TwinValue::Null => serde_json::Value::Null,
            TwinValue::Bool(v) => serde_json::Value::Bool(*v),
            TwinValue::Integer(v) => serde_json::json!(*v),
            TwinValue::Float(v) => serde_json::json!(*v),
            TwinValue::String(v) => serde_json::Value::String(v.clone()),
            TwinValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
            TwinValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for TwinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwinValue::Null => write!(f, "null"),
            TwinValue::Bool(v) => write!(f, "{}", v),
            TwinValue::Integer(v) => write!(f, "{}", v),
            TwinValue::Float(v) => write!(f, "{}", v),
            TwinValue::String(v) => write!(f, "{}", v),
            TwinValue::Array(v) => write!(f, "[{} elements]", v.len()),
            TwinValue::Map(v) => write!(f, "{{{} entries}}", v.len()),
        }
    }
}

impl Default for TwinValue {
    fn default() -> Self {
        TwinValue::Null
    }
}

macro_rules! impl_from_for_twin_value {
    ($variant:ident, $type:ty) => {
        impl From<$type> for TwinValue {
            fn from(v: $type) -> Self {
                TwinValue::$variant(v)
            }
        }
    };
}

impl_from_for_twin_value!(Bool, bool);
impl_from_for_twin_value!(Integer, i64);
impl_from_for_twin_value!(Float, f64);
impl_from_for_twin_value!(String, String);
impl_from_for_twin_value!(Array, Vec<TwinValue>);
impl_from_for_twin_value!(Map, BTreeMap<String, TwinValue>);

impl From<i32> for TwinValue {
    fn from(v: i32) -> Self {
        TwinValue::Integer(v as i64)
    }
}

impl From<u32> for TwinValue {
    fn from(v: u32) -> Self {
        TwinValue::Integer(v as i64)
    }
}

impl From<f32> for TwinValue {
    fn from(v: f32) -> Self {
        TwinValue::Float(v as f64)
    }
}

impl From<&str> for TwinValue {
    fn from(v: &str) -> Self {
        TwinValue::String(v.to_string())
    }
}

// =============================================================================
// TwinPropertySet
// =============================================================================

/// An ordered mapping from property key to twin value.
///
/// One instance each models the Desired set (cloud to edge), the Reported set
/// (edge to cloud), and the patches exchanged between them.
///
/// # Examples
///
/// ```
/// use tether_core::value::{TwinPropertySet, TwinValue};
///
/// let mut set = TwinPropertySet::new();
/// set.insert("interval", 5000);
///
/// let mut patch = TwinPropertySet::new();
/// patch.insert("interval", TwinValue::Null);
/// set.merge(&patch);
///
/// assert!(set.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TwinPropertySet {
    entries: BTreeMap<String, TwinValue>,
}

impl TwinPropertySet {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of properties in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set holds no properties.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the set holds the given key.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the value for the given key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&TwinValue> {
        self.entries.get(key)
    }

    /// Inserts a property, overwriting any existing value for the key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<TwinValue>,
    ) -> Option<TwinValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Removes a property and returns its previous value.
    pub fn remove(&mut self, key: &str) -> Option<TwinValue> {
        self.entries.remove(key)
    }

    /// Removes all properties.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over the properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TwinValue)> {
        self.entries.iter()
    }

    /// Iterates over the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Merges a single patch entry into the set using twin patch semantics.
    ///
    /// A null value removes the key. A map value merges onto an existing map
    /// value key-wise. Anything else overwrites.
    pub fn apply(&mut self, key: &str, value: &TwinValue) {
        let merged = match self.entries.get(key) {
            Some(existing) => existing.apply(value),
            None => value.clone(),
        };
        if merged.is_null() {
            self.entries.remove(key);
        } else {
            self.entries.insert(key.to_string(), merged);
        }
    }

    /// Merges an entire patch into the set, entry by entry.
    pub fn merge(&mut self, patch: &TwinPropertySet) {
        for (key, value) in patch.iter() {
            self.apply(key, value);
        }
    }
}

impl FromIterator<(String, TwinValue)> for TwinPropertySet {
    fn from_iter<I: IntoIterator<Item = (String, TwinValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TwinPropertySet {
    type Item = (String, TwinValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, TwinValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a TwinPropertySet {
    type Item = (&'a String, &'a TwinValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, TwinValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
