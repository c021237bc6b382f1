//! Caller attributes: the typed key/value bag describing the principal.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl AttributeValue {
    /// Equality used by ACL matching.
    ///
    /// Same-typed values compare directly. A string compared with an integer
    /// or boolean compares by textual form, so `"42"` matches `42` and
    /// `"true"` matches `true`; attributes taken from headers are always text.
    pub fn matches(&self, other: &AttributeValue) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Str(a), Str(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Str(s), Int(i)) | (Int(i), Str(s)) => s.trim().parse::<i64>().ok() == Some(*i),
            (Str(s), Bool(b)) | (Bool(b), Str(s)) => s.trim().eq_ignore_ascii_case(if *b { "true" } else { "false" }),
            (Int(_), Bool(_)) | (Bool(_), Int(_)) => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Str(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<i32> for AttributeValue {
    fn from(i: i32) -> Self {
        AttributeValue::Int(i64::from(i))
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// Attributes of the authenticated caller (role, id, ...). Field names are
/// chosen by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerAttributes(BTreeMap<String, AttributeValue>);

impl CallerAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.0.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for CallerAttributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_matching() {
        assert!(AttributeValue::from("admin").matches(&"admin".into()));
        assert!(!AttributeValue::from("admin").matches(&"Admin".into()));
        assert!(AttributeValue::from("42").matches(&42.into()));
        assert!(AttributeValue::from(42).matches(&"42".into()));
        assert!(AttributeValue::from("TRUE").matches(&true.into()));
        assert!(!AttributeValue::from(1).matches(&true.into()));
    }

    #[test]
    fn test_untagged_deserialize() {
        let v: Vec<AttributeValue> = serde_json::from_str(r#"[true, 7, "x"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                AttributeValue::Bool(true),
                AttributeValue::Int(7),
                AttributeValue::Str("x".into())
            ]
        );
    }

    #[test]
    fn test_caller_attributes_builder() {
        let attrs = CallerAttributes::new().with("role", "guest").with("id", 3);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("id"), Some(&AttributeValue::Int(3)));
        let collected: CallerAttributes = [("role", "guest")].into_iter().collect();
        assert_eq!(collected.get("role"), Some(&AttributeValue::Str("guest".into())));
    }
}
