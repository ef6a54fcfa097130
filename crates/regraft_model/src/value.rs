//! Dynamic scalar value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamic scalar field value.
///
/// This type represents any scalar an entity field may hold. Floats are
/// intentionally not supported: values participate in key equality, hashing,
/// and ordering, so every variant must be `Eq + Ord + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
}

impl ScalarValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Check if this value is the "not yet assigned" sentinel for its type.
    ///
    /// A surrogate key column that has never been populated holds its type's
    /// default: zero, empty string, empty bytes, `false`, or null. Entities
    /// whose every key component is a sentinel are treated as transient
    /// (not yet persisted).
    pub fn is_sentinel(&self) -> bool {
        match self {
            ScalarValue::Null => true,
            ScalarValue::Bool(b) => !b,
            ScalarValue::Integer(n) => *n == 0,
            ScalarValue::Text(s) => s.is_empty(),
            ScalarValue::Bytes(b) => b.is_empty(),
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScalarValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ScalarValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "null"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Integer(n) => write!(f, "{n}"),
            ScalarValue::Text(s) => write!(f, "{s:?}"),
            ScalarValue::Bytes(b) => write!(f, "bytes[{}]", b.len()),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Integer(n)
    }
}

impl From<i32> for ScalarValue {
    fn from(n: i32) -> Self {
        ScalarValue::Integer(i64::from(n))
    }
}

impl From<u32> for ScalarValue {
    fn from(n: u32) -> Self {
        ScalarValue::Integer(i64::from(n))
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(b: Vec<u8>) -> Self {
        ScalarValue::Bytes(b)
    }
}

impl From<&[u8]> for ScalarValue {
    fn from(b: &[u8]) -> Self {
        ScalarValue::Bytes(b.to_vec())
    }
}

impl From<()> for ScalarValue {
    fn from((): ()) -> Self {
        ScalarValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_detection() {
        assert!(ScalarValue::Null.is_sentinel());
        assert!(ScalarValue::Integer(0).is_sentinel());
        assert!(ScalarValue::Text(String::new()).is_sentinel());
        assert!(ScalarValue::Bytes(vec![]).is_sentinel());
        assert!(ScalarValue::Bool(false).is_sentinel());

        assert!(!ScalarValue::Integer(1).is_sentinel());
        assert!(!ScalarValue::Integer(-1).is_sentinel());
        assert!(!ScalarValue::Text("x".into()).is_sentinel());
        assert!(!ScalarValue::Bytes(vec![0]).is_sentinel());
        assert!(!ScalarValue::Bool(true).is_sentinel());
    }

    #[test]
    fn value_accessors() {
        assert!(ScalarValue::Null.is_null());
        assert!(!ScalarValue::Bool(true).is_null());

        assert_eq!(ScalarValue::Bool(true).as_bool(), Some(true));
        assert_eq!(ScalarValue::Integer(42).as_bool(), None);

        assert_eq!(ScalarValue::Integer(42).as_integer(), Some(42));
        assert_eq!(ScalarValue::Text("42".into()).as_integer(), None);

        assert_eq!(ScalarValue::Text("hello".into()).as_text(), Some("hello"));
        assert_eq!(
            ScalarValue::Bytes(vec![1, 2, 3]).as_bytes(),
            Some(&[1, 2, 3][..])
        );
    }

    #[test]
    fn from_impls() {
        assert_eq!(ScalarValue::from(true), ScalarValue::Bool(true));
        assert_eq!(ScalarValue::from(42i64), ScalarValue::Integer(42));
        assert_eq!(ScalarValue::from(42i32), ScalarValue::Integer(42));
        assert_eq!(ScalarValue::from(42u32), ScalarValue::Integer(42));
        assert_eq!(ScalarValue::from("hello"), ScalarValue::Text("hello".into()));
        assert_eq!(ScalarValue::from(vec![1u8, 2]), ScalarValue::Bytes(vec![1, 2]));
        assert_eq!(ScalarValue::from(()), ScalarValue::Null);
    }

    #[test]
    fn serde_roundtrip() {
        let value = ScalarValue::Text("detached".into());
        let json = serde_json::to_string(&value).unwrap();
        let back: ScalarValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
