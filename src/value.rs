use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value as Json;
use std::fmt;

/// A value produced by casting: JSON data refined by its schema.
///
/// Dates and timestamps are parsed, integers and floats are kept apart, and
/// objects whose schema names a target type become [`Instance`]s.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Instance(Instance),
}

/// An object materialized for a named target type.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Fields of an object or instance.
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(fields) => Some(fields),
            Value::Instance(instance) => Some(&instance.fields),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "date-time",
            Value::Array(_) => "array",
            Value::Object(_) | Value::Instance(_) => "object",
        }
    }

    /// Materializes a concrete type from this value, matching field names
    /// one to one.
    ///
    /// ```
    /// use openapi_cast::{cast, Components, SchemaOrRef};
    /// use serde::Deserialize;
    /// use serde_json::json;
    ///
    /// #[derive(Deserialize, Debug, PartialEq)]
    /// struct Point {
    ///     x: i64,
    ///     y: i64,
    /// }
    ///
    /// let schema: SchemaOrRef = serde_json::from_value(json!({
    ///     "type": "object",
    ///     "properties": { "x": { "type": "integer" }, "y": { "type": "integer" } },
    ///     "x-target-type": "Point",
    /// }))
    /// .unwrap();
    ///
    /// let value = cast(&schema, &json!({ "x": "1", "y": 2 }), &Components::new()).unwrap();
    /// assert_eq!(Point { x: 1, y: 2 }, value.deserialize_into().unwrap());
    /// ```
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Json> for Value {
    fn from(json: &Json) -> Self {
        Value::from(json.clone())
    }
}

/// Compares a cast value with a raw JSON literal, as `enum` membership needs.
/// Dates and timestamps equal the ISO strings they were parsed from.
impl PartialEq<Json> for Value {
    fn eq(&self, other: &Json) -> bool {
        match (self, other) {
            (Value::Null, Json::Null) => true,
            (Value::Bool(a), Json::Bool(b)) => a == b,
            (Value::Integer(a), Json::Number(b)) => match b.as_i64() {
                Some(b) => *a == b,
                None => b.as_f64() == Some(*a as f64),
            },
            (Value::Float(a), Json::Number(b)) => b.as_f64() == Some(*a),
            (Value::String(a), Json::String(b)) => a == b,
            (Value::Date(a), Json::String(b)) => NaiveDate::parse_from_str(b, "%Y-%m-%d")
                .map(|b| *a == b)
                .unwrap_or(false),
            (Value::DateTime(a), Json::String(b)) => DateTime::parse_from_rfc3339(b)
                .map(|b| *a == b)
                .unwrap_or(false),
            (Value::Array(a), Json::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a == b)
            }
            (Value::Object(_), Json::Object(b)) | (Value::Instance(_), Json::Object(b)) => {
                match self.as_object() {
                    Some(a) => {
                        a.len() == b.len()
                            && a.iter().all(|(k, v)| b.get(k).map_or(false, |b| v == b))
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) | Value::Instance(Instance { fields, .. }) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_keeps_integers_apart() {
        assert_eq!(Value::Integer(3), Value::from(json!(3)));
        assert_eq!(Value::Float(3.0), Value::from(json!(3.0)));
        assert_eq!(Value::Float(u64::MAX as f64), Value::from(json!(u64::MAX)));
    }

    #[test]
    fn from_json_keeps_key_order() {
        let value = Value::from(json!({ "z": 1, "a": 2 }));
        assert_eq!(
            vec!["z", "a"],
            value
                .as_object()
                .unwrap()
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn serialize_dates() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
        let timestamp =
            Value::DateTime(DateTime::parse_from_rfc3339("2018-01-01T00:00:00Z").unwrap());

        assert_eq!(json!("2018-01-01"), serde_json::to_value(&date).unwrap());
        assert_eq!(
            json!("2018-01-01T00:00:00+00:00"),
            serde_json::to_value(&timestamp).unwrap()
        );
    }

    #[test]
    fn compare_with_json() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
        assert!(date == json!("2018-01-01"));
        assert!(date != json!("2018-01-02"));
        assert!(Value::Integer(1) == json!(1.0));
        assert!(Value::Integer(1) != json!("1"));
        assert!(Value::from(json!({ "a": [1, "b"] })) == json!({ "a": [1, "b"] }));
        assert!(Value::from(json!({ "a": 1 })) != json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn display_as_json() {
        assert_eq!("[1,\"a\",null]", Value::from(json!([1, "a", null])).to_string());
    }
}
