//! value representation
//!
//! A resolved attribute carries one of the following data types
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - list (of values)
//! - map (order-preserving, keys are strings)
//! - unknown
//!
//! `Unknown` is what an expression resolves to when it can't be determined statically: references to
//! computed resource attributes, variables without a value, `null`, unsupported functions, cycles.
//!
//! There are no partially known values. If any part of a list or map is unknown, the whole value is
//! [Value::Unknown]. Every query below is total: a kind mismatch or an unknown value answers "no match".
//!
//! The only implicit conversion: every `integer` is also a `decimal`.
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    List(Vec<Value>),
    Map(indexmap::IndexMap<String, Value>),
    Unknown,
}

impl Value {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Three-valued truthiness: `None` unless this is a known boolean
    pub fn truth(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.truth() == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.truth() == Some(false)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Decimal(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Empty string, list or map
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    /// Scalar equality with integer/decimal promotion
    ///
    /// Lists and maps never equal anything. Use [Value::is_any] to match list members.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => a.as_f64() == b.as_f64(),
            _ => false,
        }
    }

    /// True if this value (or, for a list, any of its elements) equals one of the candidates
    pub fn is_any<I>(&self, candidates: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let candidates: Vec<Value> = candidates.into_iter().map(Into::into).collect();
        match self {
            Value::List(elements) => elements
                .iter()
                .any(|element| candidates.iter().any(|c| element.equals(c))),
            Value::Map(_) | Value::Unknown => false,
            scalar => candidates.iter().any(|c| scalar.equals(c)),
        }
    }

    /// Known value that matches none of the candidates
    pub fn is_not_any<I>(&self, candidates: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        !self.is_unknown() && !self.is_any(candidates)
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_str().is_some_and(|s| s.starts_with(prefix))
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.as_str().is_some_and(|s| s.ends_with(suffix))
    }

    /// Substring of a string, element of a list or key of a map
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Value::String(s) => s.contains(needle),
            Value::List(l) => l.iter().any(|e| e.as_str() == Some(needle)),
            Value::Map(m) => m.contains_key(needle),
            _ => false,
        }
    }

    pub fn greater_than(&self, bound: f64) -> bool {
        self.as_f64().is_some_and(|n| n > bound)
    }

    pub fn less_than(&self, bound: f64) -> bool {
        self.as_f64().is_some_and(|n| n < bound)
    }

    /// Convert back into an hcl value for evaluation
    ///
    /// Returns `None` for [Value::Unknown]
    pub fn to_hcl(&self) -> Option<hcl::Value> {
        let value = match self {
            Value::Boolean(b) => hcl::Value::Bool(*b),
            Value::Integer(i) => hcl::Value::Number((*i).into()),
            Value::Decimal(d) => hcl::Value::Number(hcl::Number::from_f64(*d)?),
            Value::String(s) => hcl::Value::String(s.clone()),
            Value::List(l) => hcl::Value::Array(
                l.iter().map(Value::to_hcl).collect::<Option<Vec<_>>>()?,
            ),
            Value::Map(m) => hcl::Value::Object(
                m.iter()
                    .map(|(k, v)| v.to_hcl().map(|v| (k.clone(), v)))
                    .collect::<Option<_>>()?,
            ),
            Value::Unknown => return None,
        };
        Some(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        value.as_f64().map_or(Value::Unknown, Value::Decimal)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        let elements: Vec<Value> = value.into_iter().map(Into::into).collect();
        if elements.iter().any(Value::is_unknown) {
            return Value::Unknown;
        }
        Value::List(elements)
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => n.into(),
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => {
                let map: indexmap::IndexMap<String, Value> =
                    o.into_iter().map(|(k, v)| (k, v.into())).collect();
                if map.values().any(Value::is_unknown) {
                    return Value::Unknown;
                }
                Value::Map(map)
            }
            hcl::Value::Null => Value::Unknown,
        }
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::List(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Map(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Unknown => serializer.serialize_unit(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn coercions_on_mismatched_kinds_are_no_match() {
        let string = Value::from("true");
        assert!(!string.is_true());
        assert!(!string.is_false());
        assert!(!string.greater_than(0.0));
        assert!(!Value::Integer(1).starts_with("1"));
    }

    #[test]
    fn unknown_never_matches() {
        let unknown = Value::Unknown;
        assert!(!unknown.is_true());
        assert!(!unknown.is_false());
        assert!(!unknown.is_empty());
        assert!(!unknown.is_any(["a"]));
        assert!(!unknown.is_not_any(["a"]));
        assert_eq!(unknown.truth(), None);
    }

    #[test]
    fn is_any_matches_list_members() {
        let list = Value::List(vec!["audit".into(), "profiler".into()]);
        assert!(list.is_any(["audit"]));
        assert!(!list.is_not_any(["profiler", "other"]));
        assert!(Value::from("something").is_not_any(["audit", "profiler"]));
    }

    #[test]
    fn integers_equal_decimals() {
        assert!(Value::Integer(3).equals(&Value::Decimal(3.0)));
        assert!(Value::Decimal(2.5).is_any([1.0, 2.5]));
    }

    #[test]
    fn null_collapses_composites_to_unknown() {
        let value: Value = hcl::Value::Array(vec![hcl::Value::from("a"), hcl::Value::Null]).into();
        assert_eq!(value, Value::Unknown);
    }

    #[test]
    fn to_hcl_skips_unknown() {
        assert_eq!(Value::Unknown.to_hcl(), None);
        assert_eq!(
            Value::List(vec![Value::Integer(1)]).to_hcl(),
            Some(hcl::Value::Array(vec![hcl::Value::Number(1i64.into())]))
        );
    }
}
