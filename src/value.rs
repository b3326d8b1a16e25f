//! Result Values
//!
//! This module defines [`Value`], the closed set of result shapes any backend can
//! produce. Handlers convert whatever their backend returned into a `Value` and attach
//! it to the result tree.
//!
//! ## Variants
//!
//! | Variant   | Holds                              | Empty rendering |
//! |-----------|------------------------------------|-----------------|
//! | `String`  | text                               |                 |
//! | `Integer` | 64-bit signed integer              |                 |
//! | `Null`    | nothing (missing key, empty pop)   |                 |
//! | `Error`   | an error message                   |                 |
//! | `Array`   | ordered values                     | `(empty list)`  |
//! | `Set`     | ordered (insertion) members        | `(empty set)`   |
//! | `ZSet`    | `(member, score)` pairs            | `(empty zset)`  |
//! | `Hash`    | `(field, value)` pairs             | `(empty hash)`  |
//!
//! Every value owns its children outright, so `clone()` is a deep copy: no two
//! values ever alias the same storage.
//!
//! ## Text Rendering
//!
//! [`Value::to_text`] joins composite members with the caller's delimiter and skips
//! members that render to nothing:
//!
//! ```
//! use kvbridge::Value;
//!
//! let keys = Value::array(vec![Value::string("a"), Value::string(""), Value::string("b")]);
//! assert_eq!(keys.to_text(";"), "a;b");
//! assert_eq!(Value::array(vec![]).to_text(";"), "(empty list)");
//! ```

use std::fmt;

/// Rendering of `Value::Null`.
pub const NIL: &str = "(nil)";

/// Empty markers for composite values.
pub mod empty {
    pub const LIST: &str = "(empty list)";
    pub const SET: &str = "(empty set)";
    pub const ZSET: &str = "(empty zset)";
    pub const HASH: &str = "(empty hash)";
}

/// A single result produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain text
    String(String),

    /// 64-bit signed integer
    Integer(i64),

    /// Absence of a value
    Null,

    /// Error text produced by a backend as data (not a failed command)
    Error(String),

    /// Ordered list of values
    Array(Vec<Value>),

    /// Set members, kept in the order the backend returned them
    Set(Vec<Value>),

    /// Sorted-set `(member, score)` pairs
    ZSet(Vec<(String, Value)>),

    /// Hash `(field, value)` pairs
    Hash(Vec<(String, Value)>),
}

/// Discriminant of a [`Value`], handy for observers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Null,
    Error,
    Array,
    Set,
    ZSet,
    Hash,
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Creates an integer value.
    pub fn integer(n: i64) -> Self {
        Value::Integer(n)
    }

    /// Creates a null value.
    pub fn null() -> Self {
        Value::Null
    }

    /// Creates an error value.
    pub fn error(s: impl Into<String>) -> Self {
        Value::Error(s.into())
    }

    /// Creates an array value.
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(values)
    }

    /// Creates a set value.
    pub fn set(members: Vec<Value>) -> Self {
        Value::Set(members)
    }

    /// Creates a sorted-set value from `(member, score)` pairs.
    pub fn zset(pairs: Vec<(String, Value)>) -> Self {
        Value::ZSet(pairs)
    }

    /// Creates a hash value from `(field, value)` pairs.
    pub fn hash(pairs: Vec<(String, Value)>) -> Self {
        Value::Hash(pairs)
    }

    /// Common response for successful writes.
    pub fn ok() -> Self {
        Value::String("OK".to_string())
    }

    /// An array of strings, in the given order.
    pub fn string_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Array(items.into_iter().map(Value::string).collect())
    }

    /// `Some(s)` becomes a string, `None` becomes null.
    pub fn optional_string(s: Option<String>) -> Self {
        s.map(Value::String).unwrap_or(Value::Null)
    }

    /// Returns the discriminant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Integer(_) => ValueKind::Integer,
            Value::Null => ValueKind::Null,
            Value::Error(_) => ValueKind::Error,
            Value::Array(_) => ValueKind::Array,
            Value::Set(_) => ValueKind::Set,
            Value::ZSet(_) => ValueKind::ZSet,
            Value::Hash(_) => ValueKind::Hash,
        }
    }

    /// Returns true for Array, Set, ZSet and Hash.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Set(_) | Value::ZSet(_) | Value::Hash(_)
        )
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Number of direct members of a composite value; 0 for scalars.
    pub fn len(&self) -> usize {
        match self {
            Value::Array(items) | Value::Set(items) => items.len(),
            Value::ZSet(pairs) | Value::Hash(pairs) => pairs.len(),
            _ => 0,
        }
    }

    /// Returns true if a composite value has no members, or the value is a scalar.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts to extract the inner string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract the inner integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract the members of an Array or Set.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Attempts to extract the pairs of a ZSet or Hash.
    pub fn as_pairs(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::ZSet(pairs) | Value::Hash(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Renders the value as text.
    ///
    /// Composite values join their member renderings with `delimiter`, skipping
    /// members (or pairs with a side) that render to an empty string. Empty
    /// composites render their marker instead of an empty string.
    pub fn to_text(&self, delimiter: &str) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Null => NIL.to_string(),
            Value::Error(msg) => msg.clone(),
            Value::Array(items) => join_members(items, delimiter, empty::LIST),
            Value::Set(items) => join_members(items, delimiter, empty::SET),
            Value::ZSet(pairs) => join_pairs(pairs, delimiter, empty::ZSET),
            Value::Hash(pairs) => join_pairs(pairs, delimiter, empty::HASH),
        }
    }
}

fn join_members(items: &[Value], delimiter: &str, marker: &str) -> String {
    if items.is_empty() {
        return marker.to_string();
    }

    items
        .iter()
        .map(|v| v.to_text(delimiter))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(delimiter)
}

fn join_pairs(pairs: &[(String, Value)], delimiter: &str, marker: &str) -> String {
    if pairs.is_empty() {
        return marker.to_string();
    }

    pairs
        .iter()
        .filter_map(|(key, value)| {
            let rendered = value.to_text(delimiter);
            if key.is_empty() || rendered.is_empty() {
                None
            } else {
                Some(format!("{} {}", key, rendered))
            }
        })
        .collect::<Vec<_>>()
        .join(delimiter)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text("\n"))
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
        Value::Integer(n)
    }
}
