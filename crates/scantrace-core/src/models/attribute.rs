//! Span attribute values
//!
//! Report fields arrive as arbitrary JSON; spans only accept scalar attribute
//! values. [`sanitize`] maps the former onto the latter and [`SpanAttributes`]
//! collects the result, dropping absent values on the way in.

use std::fmt;

use opentelemetry::KeyValue;
use serde_json::Value;

/// A scalar value that can be attached to a span
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Text
    String(String),
    /// Integral number
    Int(i64),
    /// Non-integral number
    Float(f64),
    /// Boolean
    Bool(bool),
}

/// Convert any report value into an attribute value.
///
/// Strings, numbers and booleans pass through. Arrays, objects and null are
/// replaced by their JSON text.
pub fn sanitize(value: &Value) -> AttributeValue {
    match value {
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            // u64 beyond i64::MAX and all non-integers
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        other => AttributeValue::String(other.to_string()),
    }
}

impl From<&Value> for AttributeValue {
    fn from(value: &Value) -> Self {
        sanitize(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for AttributeValue {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<AttributeValue> for opentelemetry::Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::String(s) => s.into(),
            AttributeValue::Int(i) => i.into(),
            AttributeValue::Float(f) => f.into(),
            AttributeValue::Bool(b) => b.into(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Ordered attribute set for a single span
///
/// Keys keep insertion order; setting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanAttributes {
    entries: Vec<(&'static str, AttributeValue)>,
}

impl SpanAttributes {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`
    pub fn set(&mut self, key: &'static str, value: impl Into<AttributeValue>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Set `key` if a value is present; absent values leave no trace
    pub fn set_opt<V>(&mut self, key: &'static str, value: Option<V>) -> &mut Self
    where
        V: Into<AttributeValue>,
    {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    /// Set `key` from a raw report value, skipping absent and null values
    pub fn set_json(&mut self, key: &'static str, value: Option<&Value>) -> &mut Self {
        match value {
            None | Some(Value::Null) => self,
            Some(value) => self.set(key, sanitize(value)),
        }
    }

    /// Value for `key`, if set
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Whether `key` is set
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no attribute is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    /// Convert into OpenTelemetry key-values
    pub fn into_key_values(self) -> Vec<KeyValue> {
        self.entries
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!("hello"), AttributeValue::String("hello".into()))]
    #[case(json!(42), AttributeValue::Int(42))]
    #[case(json!(-7), AttributeValue::Int(-7))]
    #[case(json!(0.5), AttributeValue::Float(0.5))]
    #[case(json!(true), AttributeValue::Bool(true))]
    #[case(json!(null), AttributeValue::String("null".into()))]
    #[case(json!([1, "a"]), AttributeValue::String(r#"[1,"a"]"#.into()))]
    #[case(json!({"k": {"n": 1}}), AttributeValue::String(r#"{"k":{"n":1}}"#.into()))]
    fn test_sanitize(#[case] input: Value, #[case] expected: AttributeValue) {
        assert_eq!(sanitize(&input), expected);
    }

    #[test]
    fn test_sanitize_large_unsigned() {
        let value = json!(u64::MAX);
        assert_eq!(sanitize(&value), AttributeValue::Float(u64::MAX as f64));
    }

    #[test]
    fn test_absent_values_are_skipped() {
        let mut attrs = SpanAttributes::new();
        attrs
            .set_opt::<&str>("profile.name", None)
            .set_json("profile.version", None)
            .set_json("control.desc", Some(&Value::Null))
            .set_opt("control.impact", Some(0.7));

        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["control.impact"]);
        assert!(!attrs.contains_key("profile.name"));
        assert!(!attrs.contains_key("control.desc"));
    }

    #[test]
    fn test_set_replaces_existing_key() {
        let mut attrs = SpanAttributes::new();
        attrs.set("duration", 1.0).set("version", "1").set("duration", 2.0);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("duration"), Some(&AttributeValue::Float(2.0)));
        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["duration", "version"]);
    }

    #[test]
    fn test_into_key_values() {
        let mut attrs = SpanAttributes::new();
        attrs.set("result.status", "passed").set("result.run_time", 0.02);
        let kvs = attrs.into_key_values();
        assert_eq!(kvs[0], KeyValue::new("result.status", "passed"));
        assert_eq!(kvs[1], KeyValue::new("result.run_time", 0.02));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            (-1.0e9f64..1.0e9).prop_map(Value::from),
            ".{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_deterministic(value in arb_json()) {
            prop_assert_eq!(sanitize(&value), sanitize(&value.clone()));
        }

        #[test]
        fn prop_non_scalars_become_json_text(value in arb_json()) {
            if value.is_array() || value.is_object() {
                prop_assert_eq!(sanitize(&value), AttributeValue::String(value.to_string()));
            }
        }
    }
}
