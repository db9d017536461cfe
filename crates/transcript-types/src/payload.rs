use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::TypeError;

/// A JSON-like value inside a record payload.
///
/// Objects are `BTreeMap`s, so iteration (and therefore serialization) is
/// always in ascending key order regardless of how the value was built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<PayloadValue>),
    Object(BTreeMap<String, PayloadValue>),
}

impl PayloadValue {
    /// A floating point value. Returns `None` for NaN and infinities, which
    /// have no JSON representation.
    pub fn from_f64(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Self::Number)
    }

    /// The string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<PayloadValue> for Value {
    fn from(value: PayloadValue) -> Self {
        match value {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(b),
            PayloadValue::Number(n) => Value::Number(n),
            PayloadValue::String(s) => Value::String(s),
            PayloadValue::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            PayloadValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PayloadValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PayloadValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for PayloadValue {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<Vec<PayloadValue>> for PayloadValue {
    fn from(items: Vec<PayloadValue>) -> Self {
        Self::Array(items)
    }
}

/// One record's content: a string-keyed mapping at the top level.
///
/// Equality is structural and ignores the order in which keys were inserted.
/// Two payloads that compare equal always produce the same fingerprint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPayload(BTreeMap<String, PayloadValue>);

impl CanonicalPayload {
    /// Empty payload.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a field, returning the previous value for that key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PayloadValue>,
    ) -> Option<PayloadValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Top-level field by key.
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.0.get(key)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.0.iter()
    }

    /// Top-level fields in key order.
    pub fn fields(&self) -> &BTreeMap<String, PayloadValue> {
        &self.0
    }

    /// Parse a payload from JSON text. The top level must be an object.
    pub fn from_json_str(s: &str) -> Result<Self, TypeError> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| TypeError::MalformedPayload(e.to_string()))?;
        Self::try_from(value)
    }

    /// Parse a payload from UTF-8 JSON bytes. The top level must be an object.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| TypeError::MalformedPayload(e.to_string()))?;
        Self::try_from(value)
    }

    /// Convert to a `serde_json::Value`.
    pub fn to_json_value(&self) -> Value {
        Value::from(PayloadValue::Object(self.0.clone()))
    }
}

impl TryFrom<Value> for CanonicalPayload {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match PayloadValue::from(value) {
            PayloadValue::Object(map) => Ok(Self(map)),
            other => Err(TypeError::MalformedPayload(format!(
                "payload must be a JSON object, got {}",
                kind_name(&other)
            ))),
        }
    }
}

impl From<BTreeMap<String, PayloadValue>> for CanonicalPayload {
    fn from(map: BTreeMap<String, PayloadValue>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, PayloadValue)> for CanonicalPayload {
    fn from_iter<I: IntoIterator<Item = (String, PayloadValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn kind_name(value: &PayloadValue) -> &'static str {
    match value {
        PayloadValue::Null => "null",
        PayloadValue::Bool(_) => "a boolean",
        PayloadValue::Number(_) => "a number",
        PayloadValue::String(_) => "a string",
        PayloadValue::Array(_) => "an array",
        PayloadValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insertion_order_does_not_affect_equality() {
        let a = CanonicalPayload::new().with("grade", "A").with("course", "CS301");
        let b = CanonicalPayload::new().with("course", "CS301").with("grade", "A");
        assert_eq!(a, b);
    }

    #[test]
    fn iteration_is_key_sorted() {
        let p = CanonicalPayload::new()
            .with("zeta", 1i64)
            .with("alpha", 2i64)
            .with("mid", 3i64);
        let keys: Vec<&str> = p.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn parse_object() {
        let p = CanonicalPayload::from_json_str(r#"{"course":"CS301","credits":4}"#).unwrap();
        assert_eq!(p.get("course").and_then(PayloadValue::as_str), Some("CS301"));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn parse_rejects_non_object() {
        let err = CanonicalPayload::from_json_str("[1,2,3]").unwrap_err();
        assert!(matches!(err, TypeError::MalformedPayload(msg) if msg.contains("an array")));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert!(matches!(
            CanonicalPayload::from_json_slice(b"{not json"),
            Err(TypeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn nested_values_convert_both_ways() {
        let value = json!({
            "student": {"id": "S12345", "tags": ["honors", null, true]},
            "gpa": 3.9
        });
        let payload = CanonicalPayload::try_from(value.clone()).unwrap();
        assert_eq!(payload.to_json_value(), value);
    }

    #[test]
    fn serde_roundtrip_preserves_structure() {
        let payload = CanonicalPayload::new()
            .with("course", "CS301")
            .with("passed", true)
            .with("notes", PayloadValue::Null)
            .with("scores", vec![PayloadValue::from(90i64), PayloadValue::from(85i64)]);
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: CanonicalPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn from_f64_rejects_nan() {
        assert!(PayloadValue::from_f64(f64::NAN).is_none());
        assert!(PayloadValue::from_f64(1.5).is_some());
    }
}
