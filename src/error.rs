use serde::Serialize;
use serde_json::Value as Json;
use std::fmt;
use thiserror::Error;

/// One step from the root of a value: a property name or an array index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(&key.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_owned())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Renders a path as a `#/`-prefixed JSON pointer.
pub fn pointer(path: &[PathSegment]) -> String {
    let mut out = String::from("#/");
    for (i, segment) in path.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&segment.to_string());
    }

    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CastErrorReason {
    InvalidType,
    InvalidDate,
    InvalidDateTime,
    UnexpectedField,
    MissingField,
    MaxProperties,
    MinProperties,
    UnresolvedReference,
    MaxDepthExceeded,
}

impl CastErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CastErrorReason::InvalidType => "invalid_type",
            CastErrorReason::InvalidDate => "invalid_date",
            CastErrorReason::InvalidDateTime => "invalid_date_time",
            CastErrorReason::UnexpectedField => "unexpected_field",
            CastErrorReason::MissingField => "missing_field",
            CastErrorReason::MaxProperties => "max_properties",
            CastErrorReason::MinProperties => "min_properties",
            CastErrorReason::UnresolvedReference => "unresolved_reference",
            CastErrorReason::MaxDepthExceeded => "max_depth_exceeded",
        }
    }
}

impl fmt::Display for CastErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured cast failure.
///
/// `path` leads from the root of the input to the offending value, `expected`
/// describes what the schema wanted (a type, format, bound or reference
/// target) and `value` is the raw input that was rejected.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CastError {
    pub reason: CastErrorReason,
    pub path: Vec<PathSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    pub value: Json,
}

impl CastError {
    pub fn new(reason: CastErrorReason, path: Vec<PathSegment>, value: Json) -> Self {
        Self {
            reason,
            path,
            expected: None,
            value,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn message(&self) -> String {
        let expected = self.expected.as_deref().unwrap_or("value");
        match self.reason {
            CastErrorReason::InvalidType => {
                format!("Invalid {}. Got: {}", expected, json_type(&self.value))
            }
            CastErrorReason::InvalidDate => format!("Invalid date. Got: {}", self.value),
            CastErrorReason::InvalidDateTime => format!("Invalid date-time. Got: {}", self.value),
            CastErrorReason::UnexpectedField => format!("Unexpected field: {}", self.value),
            CastErrorReason::MissingField => match self.path.last() {
                Some(field) => format!("Missing field: {}", field),
                None => "Missing field".to_owned(),
            },
            CastErrorReason::MaxProperties => format!(
                "Object property count {} is greater than maxProperties: {}",
                property_count(&self.value),
                expected
            ),
            CastErrorReason::MinProperties => format!(
                "Object property count {} is less than minProperties: {}",
                property_count(&self.value),
                expected
            ),
            CastErrorReason::UnresolvedReference => {
                format!("Unresolved schema reference: {}", expected)
            }
            CastErrorReason::MaxDepthExceeded => "max depth exceeded".to_owned(),
        }
    }
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", pointer(&self.path), self.message())
    }
}

impl std::error::Error for CastError {}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidateError {
    /// Every violation found, one `#/`-prefixed line each.
    #[error("{0}")]
    Invalid(String),

    #[error("max depth exceeded")]
    MaxDepthExceeded,
}

impl ValidateError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<ValidateError> for String {
    fn from(err: ValidateError) -> Self {
        err.to_string()
    }
}

pub(crate) fn json_type(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn property_count(value: &Json) -> usize {
    value.as_object().map_or(0, |object| object.len())
}
