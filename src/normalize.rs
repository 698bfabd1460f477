//! Portable conversion of analysis results.
//!
//! Analysis code works with fixed-width numeric types, homogeneous arrays
//! and boxed scalars. None of those belong in a stored document, so they are
//! folded into plain JSON before a chat entry is persisted.

use serde_json::{Map, Number, Value};

/// A value produced by table analysis, before it is made portable.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Str(String),
    /// Homogeneous numeric array, e.g. one column of a table.
    Array(Vec<AnalysisValue>),
    List(Vec<AnalysisValue>),
    Tuple(Vec<AnalysisValue>),
    /// Ordered string-keyed mapping.
    Map(Vec<(String, AnalysisValue)>),
    /// Zero-dimensional wrapper around a single scalar.
    Scalar(Box<AnalysisValue>),
}

impl AnalysisValue {
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, AnalysisValue)>) -> Self {
        AnalysisValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn str(value: impl Into<String>) -> Self {
        AnalysisValue::Str(value.into())
    }

    pub fn boxed(value: AnalysisValue) -> Self {
        AnalysisValue::Scalar(Box::new(value))
    }

    /// Fold into plain JSON, recursing through containers.
    ///
    /// Integers and floats keep their value; non-finite floats become
    /// `null`; arrays, lists and tuples become JSON arrays; boxed scalars
    /// are unwrapped.
    pub fn to_portable(&self) -> Value {
        match self {
            AnalysisValue::Null => Value::Null,
            AnalysisValue::Bool(b) => Value::Bool(*b),
            AnalysisValue::Int8(n) => Value::from(*n),
            AnalysisValue::Int16(n) => Value::from(*n),
            AnalysisValue::Int32(n) => Value::from(*n),
            AnalysisValue::Int64(n) => Value::from(*n),
            AnalysisValue::UInt8(n) => Value::from(*n),
            AnalysisValue::UInt16(n) => Value::from(*n),
            AnalysisValue::UInt32(n) => Value::from(*n),
            AnalysisValue::UInt64(n) => Value::from(*n),
            AnalysisValue::Float32(f) => float(f64::from(*f)),
            AnalysisValue::Float64(f) => float(*f),
            AnalysisValue::Str(s) => Value::String(s.clone()),
            AnalysisValue::Array(items) | AnalysisValue::List(items) | AnalysisValue::Tuple(items) => {
                Value::Array(items.iter().map(AnalysisValue::to_portable).collect())
            }
            AnalysisValue::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_portable());
                }
                Value::Object(map)
            }
            AnalysisValue::Scalar(inner) => inner.to_portable(),
        }
    }

    /// Short rendering for prompts and summaries.
    pub fn summary(&self) -> String {
        match self.to_portable() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
