use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::str::FromStr;

/// Prefix every schema reference target must carry to be resolvable.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// An OpenAPI-flavored schema node.
///
/// All fields are optional and semantically orthogonal: a node may declare a
/// `type`, carry combinators, and name a discriminator all at once. Nodes are
/// never mutated by [`cast`][`crate::cast`] or [`validate`][`crate::validate`].
///
/// ```
/// use openapi_cast::{Schema, Type};
/// use serde_json::json;
///
/// let schema: Schema = serde_json::from_value(json!({
///     "type": "integer",
///     "minimum": 1,
/// }))
/// .unwrap();
///
/// assert_eq!(Some(Type::Integer), schema.type_);
/// assert_eq!(Some(1.0), schema.minimum);
/// ```
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<Type>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<ExclusiveBound>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<ExclusiveBound>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaOrRef>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaOrRef>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaOrRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<SchemaOrRef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaOrRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<SchemaOrRef>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Json>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,

    /// Name of the concrete type an object cast materializes into.
    #[serde(rename = "x-target-type", skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
}

impl Schema {
    pub fn new(type_: Type) -> Self {
        Self {
            type_: Some(type_),
            ..Default::default()
        }
    }

    pub fn nullable(&self) -> bool {
        self.nullable.unwrap_or(false)
    }

    /// The recognized format tag, if any. Unknown formats are annotations.
    pub fn format(&self) -> Option<Format> {
        self.format.as_deref().and_then(|f| f.parse().ok())
    }

    pub fn has_combinators(&self) -> bool {
        self.discriminator.is_some()
            || !self.all_of.is_empty()
            || !self.one_of.is_empty()
            || !self.any_of.is_empty()
            || self.not.is_some()
    }

    /// Whether this node describes an object by declaration rather than by
    /// the runtime shape of a value.
    pub fn is_object_shaped(&self) -> bool {
        self.type_ == Some(Type::Object) || self.properties.is_some()
    }
}

/// A named pointer into the [`Components`][`crate::Components`] registry.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub target: String,
}

impl Reference {
    pub fn new(name: &str) -> Self {
        Self {
            target: format!("{}{}", SCHEMA_REF_PREFIX, name),
        }
    }

    /// The schema name this reference points at, if the target is a
    /// components schema pointer.
    pub fn name(&self) -> Option<&str> {
        self.target
            .strip_prefix(SCHEMA_REF_PREFIX)
            .filter(|name| !name.is_empty())
    }
}

/// Either an inline schema or a reference to a named one.
///
/// Any object carrying `$ref` deserializes as a reference.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum SchemaOrRef {
    Ref(Reference),
    Schema(Box<Schema>),
}

impl SchemaOrRef {
    pub fn reference(name: &str) -> Self {
        SchemaOrRef::Ref(Reference::new(name))
    }
}

impl From<Schema> for SchemaOrRef {
    fn from(schema: Schema) -> Self {
        SchemaOrRef::Schema(Box::new(schema))
    }
}

impl From<Reference> for SchemaOrRef {
    fn from(reference: Reference) -> Self {
        SchemaOrRef::Ref(reference)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl Type {
    pub fn as_str(self) -> &'static str {
        match self {
            Type::String => "string",
            Type::Number => "number",
            Type::Integer => "integer",
            Type::Boolean => "boolean",
            Type::Array => "array",
            Type::Object => "object",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Date,
    DateTime,
    Int32,
    Int64,
    Float,
    Double,
    Email,
    Uuid,
    Byte,
    Binary,
    Password,
}

impl FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(Self::Date),
            "date-time" => Ok(Self::DateTime),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "email" => Ok(Self::Email),
            "uuid" => Ok(Self::Uuid),
            "byte" => Ok(Self::Byte),
            "binary" => Ok(Self::Binary),
            "password" => Ok(Self::Password),
            _ => Err(()),
        }
    }
}

/// `exclusiveMinimum` / `exclusiveMaximum`: a flag toggling the strictness of
/// `minimum` / `maximum`, or a standalone strict bound.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum ExclusiveBound {
    Flag(bool),
    Limit(f64),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<SchemaOrRef>),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<IndexMap<String, String>>,
}

impl Discriminator {
    /// Name of the schema selected by a discriminator value. Mapping entries
    /// may be bare names or full reference targets; a value with no mapping
    /// entry names the schema directly.
    pub fn schema_name<'a>(&'a self, tag: &'a str) -> &'a str {
        match self.mapping.as_ref().and_then(|mapping| mapping.get(tag)) {
            Some(target) => target.strip_prefix(SCHEMA_REF_PREFIX).unwrap_or(target),
            None => tag,
        }
    }
}
