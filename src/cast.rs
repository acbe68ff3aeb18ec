use crate::components::Components;
use crate::error::{json_type, CastError, CastErrorReason, PathSegment};
use crate::schema::{
    AdditionalProperties, Discriminator, Format, Reference, Schema, SchemaOrRef, Type,
};
use crate::value::{Instance, Value};
use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as Json};
use tracing::trace;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").unwrap());
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?$").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

#[derive(Default)]
pub struct CastOptions {
    max_depth: usize,
}

impl CastOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how many references and discriminators may be followed on the
    /// way down. Zero, the default, means no bound.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Coerces an untyped value into the typed shape `schema` describes.
///
/// A missing-required-fields failure reports every missing field; any other
/// failure reports the first problem found in evaluation order.
///
/// ```
/// use openapi_cast::{cast, Components, SchemaOrRef, Value};
/// use serde_json::json;
///
/// let schema: SchemaOrRef =
///     serde_json::from_value(json!({ "type": "array", "items": { "type": "integer" } })).unwrap();
///
/// assert_eq!(
///     Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
///     cast(&schema, &json!(["1", "2"]), &Components::new()).unwrap()
/// );
/// ```
pub fn cast(
    schema: &SchemaOrRef,
    value: &Json,
    components: &Components,
) -> Result<Value, Vec<CastError>> {
    cast_with_options(schema, value, components, CastOptions::new())
}

pub fn cast_with_options(
    schema: &SchemaOrRef,
    value: &Json,
    components: &Components,
    options: CastOptions,
) -> Result<Value, Vec<CastError>> {
    let mut caster = Caster {
        components,
        max_depth: options.max_depth,
        depth: 0,
        path: vec![],
    };

    caster.cast(schema, value, None)
}

type CastResult = Result<Value, Vec<CastError>>;

struct Caster<'a> {
    components: &'a Components,
    max_depth: usize,
    depth: usize,
    path: Vec<PathSegment>,
}

impl<'a> Caster<'a> {
    fn cast(&mut self, schema: &SchemaOrRef, value: &Json, parent_tag: Option<&str>) -> CastResult {
        match schema {
            SchemaOrRef::Schema(schema) => self.cast_schema(schema, value, parent_tag),
            SchemaOrRef::Ref(reference) => {
                let components = self.components;
                let resolved = components.resolve(reference).ok_or_else(|| {
                    vec![self
                        .error(CastErrorReason::UnresolvedReference, value)
                        .with_expected(reference.target.as_str())]
                })?;

                self.descend(value, |c| c.cast_schema(resolved, value, parent_tag))
            }
        }
    }

    fn cast_schema(
        &mut self,
        schema: &Schema,
        value: &Json,
        parent_tag: Option<&str>,
    ) -> CastResult {
        if value.is_null() && schema.nullable() {
            return Ok(Value::Null);
        }

        if let Some(discriminator) = &schema.discriminator {
            if parent_tag != Some(discriminator.property_name.as_str()) {
                return self.cast_discriminator(schema, discriminator, value);
            }

            trace!(
                property = %discriminator.property_name,
                "discriminator already resolved for this value"
            );
        }

        if !schema.all_of.is_empty() {
            return self.cast_all_of(schema, value, parent_tag);
        }

        if !schema.one_of.is_empty() {
            return self.cast_first_of(&schema.one_of, value, parent_tag);
        }

        if !schema.any_of.is_empty() {
            return self.cast_first_of(&schema.any_of, value, parent_tag);
        }

        match schema.type_ {
            None => Ok(Value::from(value)),
            Some(Type::Boolean) => self.cast_boolean(value),
            Some(Type::Integer) => self.cast_integer(value),
            Some(Type::Number) => self.cast_number(schema, value),
            Some(Type::String) => self.cast_string(schema, value),
            Some(Type::Array) => self.cast_array(schema, value),
            Some(Type::Object) => self.cast_object(schema, value, parent_tag),
        }
    }

    fn cast_boolean(&self, value: &Json) -> CastResult {
        match value {
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) if s == "true" => Ok(Value::Bool(true)),
            Json::String(s) if s == "false" => Ok(Value::Bool(false)),
            _ => Err(self.invalid_type(Type::Boolean, value)),
        }
    }

    fn cast_integer(&self, value: &Json) -> CastResult {
        let cast = match value {
            Json::Number(n) => n.as_i64(),
            Json::String(s) if INTEGER.is_match(s) => s.parse().ok(),
            _ => None,
        };

        cast.map(Value::Integer)
            .ok_or_else(|| self.invalid_type(Type::Integer, value))
    }

    fn cast_number(&self, schema: &Schema, value: &Json) -> CastResult {
        let cast = match value {
            Json::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Integer(i)),
                None => n.as_f64().map(Value::Float),
            },
            Json::String(s) if DECIMAL.is_match(s) => s.parse().ok().map(Value::Float),
            _ => None,
        };

        match (cast, schema.format()) {
            (Some(Value::Integer(i)), Some(Format::Float | Format::Double)) => {
                Ok(Value::Float(i as f64))
            }
            (Some(cast), _) => Ok(cast),
            (None, _) => Err(self.invalid_type(Type::Number, value)),
        }
    }

    fn cast_string(&self, schema: &Schema, value: &Json) -> CastResult {
        let s = match value {
            Json::String(s) => s,
            _ => return Err(self.invalid_type(Type::String, value)),
        };

        match schema.format() {
            Some(Format::Date) => parse_date(s)
                .map(Value::Date)
                .ok_or_else(|| vec![self.error(CastErrorReason::InvalidDate, value)]),
            Some(Format::DateTime) => DateTime::parse_from_rfc3339(s)
                .map(Value::DateTime)
                .map_err(|_| vec![self.error(CastErrorReason::InvalidDateTime, value)]),
            _ => Ok(Value::String(s.clone())),
        }
    }

    fn cast_array(&mut self, schema: &Schema, value: &Json) -> CastResult {
        let items = match value {
            Json::Array(items) => items,
            _ => return Err(self.invalid_type(Type::Array, value)),
        };

        let item_schema = match &schema.items {
            Some(item_schema) => item_schema,
            None => return Ok(Value::from(value)),
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(self.at(i.into(), |c| c.cast(item_schema, item, None))?);
        }

        Ok(Value::Array(out))
    }

    fn cast_object(
        &mut self,
        schema: &Schema,
        value: &Json,
        parent_tag: Option<&str>,
    ) -> CastResult {
        let input = match value {
            Json::Object(input) => input,
            _ => return Err(self.invalid_type(Type::Object, value)),
        };

        let typed_extras = match &schema.additional_properties {
            Some(AdditionalProperties::Schema(extra)) => Some(&**extra),
            _ => None,
        };

        let properties = match (&schema.properties, typed_extras) {
            (Some(properties), _) => properties,
            (None, Some(extra)) => return self.cast_values(schema, input, extra),
            (None, None) => return Ok(Value::from(value)),
        };

        let allows_extras = matches!(
            schema.additional_properties,
            Some(AdditionalProperties::Bool(true))
        );

        if !allows_extras && typed_extras.is_none() {
            let unexpected = input
                .keys()
                .find(|key| !properties.contains_key(*key) && parent_tag != Some(key.as_str()));

            if let Some(key) = unexpected {
                let key_value = Json::String(key.clone());
                return Err(vec![self.at(key.as_str().into(), |c| {
                    c.error(CastErrorReason::UnexpectedField, &key_value)
                })]);
            }
        }

        // Keys that survive normalization, paired with the schema their value
        // casts against. `None` passes a resolved discriminator tag through.
        let present: Vec<(&String, &Json, Option<&SchemaOrRef>)> = input
            .iter()
            .filter_map(|(key, raw)| match properties.get(key) {
                Some(property) => Some((key, raw, Some(property))),
                None if typed_extras.is_some() => Some((key, raw, typed_extras)),
                None if parent_tag == Some(key.as_str()) => Some((key, raw, None)),
                None => None,
            })
            .collect();

        let missing: Vec<CastError> = schema
            .required
            .iter()
            .filter(|name| !present.iter().any(|(key, _, _)| key == name))
            .map(|name| {
                self.at(name.as_str().into(), |c| {
                    c.error(CastErrorReason::MissingField, &Json::Null)
                })
            })
            .collect();

        if !missing.is_empty() {
            return Err(missing);
        }

        self.check_property_count(schema, present.len(), value)?;

        let mut fields = IndexMap::with_capacity(present.len());
        for (key, raw, property) in present {
            let cast = match property {
                Some(property) => self.at(key.as_str().into(), |c| c.cast(property, raw, None))?,
                None => Value::from(raw),
            };

            fields.insert(key.clone(), cast);
        }

        for (name, property) in properties {
            if fields.contains_key(name) || schema.required.contains(name) {
                continue;
            }

            let default = self
                .components
                .resolve_schema(property)
                .and_then(|property| property.default.as_ref());

            if let Some(default) = default {
                fields.insert(name.clone(), Value::from(default));
            }
        }

        Ok(materialize(schema, fields))
    }

    /// Objects with no declared properties whose extras are typed: every
    /// value casts against the `additionalProperties` schema.
    fn cast_values(
        &mut self,
        schema: &Schema,
        input: &Map<String, Json>,
        extra: &SchemaOrRef,
    ) -> CastResult {
        self.check_property_count(schema, input.len(), &Json::Object(input.clone()))?;

        let mut fields = IndexMap::with_capacity(input.len());
        for (key, raw) in input {
            let cast = self.at(key.as_str().into(), |c| c.cast(extra, raw, None))?;
            fields.insert(key.clone(), cast);
        }

        Ok(materialize(schema, fields))
    }

    fn check_property_count(
        &self,
        schema: &Schema,
        count: usize,
        value: &Json,
    ) -> Result<(), Vec<CastError>> {
        if let Some(max) = schema.max_properties {
            if count > max {
                return Err(vec![self
                    .error(CastErrorReason::MaxProperties, value)
                    .with_expected(max.to_string())]);
            }
        }

        if let Some(min) = schema.min_properties {
            if count < min {
                return Err(vec![self
                    .error(CastErrorReason::MinProperties, value)
                    .with_expected(min.to_string())]);
            }
        }

        Ok(())
    }

    fn cast_discriminator(
        &mut self,
        schema: &Schema,
        discriminator: &Discriminator,
        value: &Json,
    ) -> CastResult {
        let input = match value {
            Json::Object(input) => input,
            _ => return Err(self.invalid_type(Type::Object, value)),
        };

        let property_name = discriminator.property_name.as_str();

        // The node's own declared properties cast first, so a malformed tag
        // is reported against the node that declares it.
        let mut own = IndexMap::new();
        if let Some(properties) = &schema.properties {
            for (key, raw) in input {
                if let Some(property) = properties.get(key) {
                    let cast = self.at(key.as_str().into(), |c| c.cast(property, raw, None))?;
                    own.insert(key.as_str(), cast);
                }
            }
        }

        let tag = match (own.get(property_name), input.get(property_name)) {
            (Some(Value::String(tag)), _) => tag.clone(),
            (None, Some(Json::String(tag))) => tag.clone(),
            (Some(_), Some(raw)) | (None, Some(raw)) => {
                return Err(vec![self.at(property_name.into(), |c| {
                    c.error(CastErrorReason::InvalidType, raw)
                        .with_expected(Type::String.as_str())
                })]);
            }
            (_, None) => {
                return Err(vec![self.at(property_name.into(), |c| {
                    c.error(CastErrorReason::MissingField, &Json::Null)
                })]);
            }
        };

        let schema_name = discriminator.schema_name(&tag);
        let components = self.components;
        let target = components.get(schema_name).ok_or_else(|| {
            vec![self
                .error(CastErrorReason::UnresolvedReference, value)
                .with_expected(Reference::new(schema_name).target)]
        })?;

        self.descend(value, |c| c.cast_schema(target, value, Some(property_name)))
    }

    fn cast_all_of(
        &mut self,
        schema: &Schema,
        value: &Json,
        parent_tag: Option<&str>,
    ) -> CastResult {
        let mut parts = Vec::new();
        self.flatten_all_of(schema, value, &mut parts)?;

        if parts.iter().any(|part| part.is_object_shaped()) {
            let unified = unify(&parts);
            let out = self.cast_schema(&unified, value, parent_tag)?;

            // A part's discriminator already picks among its own branches.
            for part in parts.iter().filter(|part| part.discriminator.is_none()) {
                if !part.one_of.is_empty() {
                    self.cast_first_of(&part.one_of, value, parent_tag)?;
                }
                if !part.any_of.is_empty() {
                    self.cast_first_of(&part.any_of, value, parent_tag)?;
                }
            }

            return Ok(out);
        }

        let mut out = Value::from(value);
        for part in parts {
            // Nested allOf entries were flattened above.
            let part = Schema {
                all_of: vec![],
                ..part.clone()
            };

            if part.type_.is_some() || part.has_combinators() {
                out = self.cast_schema(&part, value, parent_tag)?;
            }
        }

        Ok(out)
    }

    /// Collects the node itself followed by every `allOf` entry, depth first,
    /// with references resolved.
    fn flatten_all_of<'s>(
        &mut self,
        schema: &'s Schema,
        value: &Json,
        parts: &mut Vec<&'s Schema>,
    ) -> Result<(), Vec<CastError>>
    where
        'a: 's,
    {
        parts.push(schema);
        for entry in &schema.all_of {
            let components = self.components;
            let part: &'s Schema = match entry {
                SchemaOrRef::Schema(part) => &**part,
                SchemaOrRef::Ref(reference) => components.resolve(reference).ok_or_else(|| {
                    vec![self
                        .error(CastErrorReason::UnresolvedReference, value)
                        .with_expected(reference.target.as_str())]
                })?,
            };

            self.descend(value, |c| c.flatten_all_of(part, value, parts))?;
        }

        Ok(())
    }

    fn cast_first_of(
        &mut self,
        branches: &[SchemaOrRef],
        value: &Json,
        parent_tag: Option<&str>,
    ) -> CastResult {
        let mut errors = Vec::new();
        for branch in branches {
            match self.cast(branch, value, parent_tag) {
                Ok(cast) => return Ok(cast),
                Err(branch_errors) if is_depth_error(&branch_errors) => return Err(branch_errors),
                Err(branch_errors) => errors = branch_errors,
            }
        }

        Err(errors)
    }

    fn at<T>(&mut self, segment: PathSegment, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    fn descend<T>(
        &mut self,
        value: &Json,
        f: impl FnOnce(&mut Self) -> Result<T, Vec<CastError>>,
    ) -> Result<T, Vec<CastError>> {
        if self.max_depth != 0 && self.depth == self.max_depth {
            return Err(vec![self.error(CastErrorReason::MaxDepthExceeded, value)]);
        }

        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn error(&self, reason: CastErrorReason, value: &Json) -> CastError {
        CastError::new(reason, self.path.clone(), value.clone())
    }

    fn invalid_type(&self, expected: Type, value: &Json) -> Vec<CastError> {
        trace!(expected = expected.as_str(), got = json_type(value), "cast type mismatch");
        vec![self
            .error(CastErrorReason::InvalidType, value)
            .with_expected(expected.as_str())]
    }
}

fn is_depth_error(errors: &[CastError]) -> bool {
    errors
        .iter()
        .any(|err| err.reason == CastErrorReason::MaxDepthExceeded)
}

/// ISO-8601 calendar date with exact field widths.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    if !DATE.is_match(s) {
        return None;
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn materialize(schema: &Schema, fields: IndexMap<String, Value>) -> Value {
    match &schema.target_type {
        Some(type_name) => Value::Instance(Instance {
            type_name: type_name.clone(),
            fields,
        }),
        None => Value::Object(fields),
    }
}

/// Merges the object-level keywords of flattened `allOf` parts into one
/// schema. The first part to declare a property or keyword governs it.
fn unify(parts: &[&Schema]) -> Schema {
    let mut unified = Schema {
        type_: Some(Type::Object),
        nullable: parts.first().and_then(|part| part.nullable),
        ..Default::default()
    };

    for part in parts {
        if let Some(properties) = &part.properties {
            let merged = unified.properties.get_or_insert_with(IndexMap::new);
            for (name, property) in properties {
                if !merged.contains_key(name) {
                    merged.insert(name.clone(), property.clone());
                }
            }
        }

        for name in &part.required {
            if !unified.required.contains(name) {
                unified.required.push(name.clone());
            }
        }

        if unified.additional_properties.is_none() {
            unified.additional_properties = part.additional_properties.clone();
        }
        if unified.min_properties.is_none() {
            unified.min_properties = part.min_properties;
        }
        if unified.max_properties.is_none() {
            unified.max_properties = part.max_properties;
        }
        if unified.target_type.is_none() {
            unified.target_type = part.target_type.clone();
        }
    }

    unified
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(json: Json) -> SchemaOrRef {
        serde_json::from_value(json).unwrap()
    }

    fn cast_ok(schema_json: Json, value: Json) -> Value {
        cast(&schema(schema_json), &value, &Components::new()).unwrap()
    }

    fn cast_err(schema_json: Json, value: Json) -> Vec<CastError> {
        cast(&schema(schema_json), &value, &Components::new()).unwrap_err()
    }

    fn reasons_and_paths(errors: &[CastError]) -> Vec<(CastErrorReason, Vec<PathSegment>)> {
        errors
            .iter()
            .map(|err| (err.reason, err.path.clone()))
            .collect()
    }

    fn pets() -> Components {
        serde_json::from_value(json!({
            "schemas": {
                "Pet": {
                    "type": "object",
                    "properties": { "pet_type": { "type": "string" } },
                    "required": ["pet_type"],
                    "discriminator": { "propertyName": "pet_type" },
                },
                "Cat": {
                    "allOf": [
                        { "$ref": "#/components/schemas/Pet" },
                        {
                            "type": "object",
                            "properties": { "meow": { "type": "boolean" } },
                            "required": ["meow"],
                        },
                    ],
                    "x-target-type": "Cat",
                },
                "Dog": {
                    "allOf": [
                        { "$ref": "#/components/schemas/Pet" },
                        {
                            "type": "object",
                            "properties": { "bark": { "type": "string" } },
                        },
                    ],
                },
            },
        }))
        .unwrap()
    }

    #[test]
    fn nullable_null_bypasses_everything() {
        assert_eq!(
            Value::Null,
            cast_ok(json!({ "type": "integer", "nullable": true, "minimum": 5 }), json!(null))
        );
        assert_eq!(
            CastErrorReason::InvalidType,
            cast_err(json!({ "type": "integer" }), json!(null))[0].reason
        );
    }

    #[test]
    fn untyped_schema_passes_through() {
        let value = json!({ "a": [1, "b", null] });
        assert_eq!(Value::from(&value), cast_ok(json!({}), value));
    }

    #[test]
    fn boolean() {
        assert_eq!(Value::Bool(true), cast_ok(json!({ "type": "boolean" }), json!(true)));
        assert_eq!(Value::Bool(true), cast_ok(json!({ "type": "boolean" }), json!("true")));
        assert_eq!(Value::Bool(false), cast_ok(json!({ "type": "boolean" }), json!("false")));

        for bad in [json!("True"), json!(1), json!("yes"), json!(null)] {
            let errors = cast_err(json!({ "type": "boolean" }), bad);
            assert_eq!(CastErrorReason::InvalidType, errors[0].reason);
            assert_eq!(Some("boolean"), errors[0].expected.as_deref());
        }
    }

    #[test]
    fn integer() {
        assert_eq!(Value::Integer(7), cast_ok(json!({ "type": "integer" }), json!(7)));
        assert_eq!(Value::Integer(-7), cast_ok(json!({ "type": "integer" }), json!("-7")));
        assert_eq!(Value::Integer(7), cast_ok(json!({ "type": "integer" }), json!("+7")));

        for bad in [json!(1.5), json!(1.0), json!(true), json!("1.0"), json!("12abc"), json!("")] {
            assert_eq!(
                CastErrorReason::InvalidType,
                cast_err(json!({ "type": "integer" }), bad)[0].reason
            );
        }
    }

    #[test]
    fn number() {
        assert_eq!(Value::Integer(3), cast_ok(json!({ "type": "number" }), json!(3)));
        assert_eq!(Value::Float(3.5), cast_ok(json!({ "type": "number" }), json!(3.5)));
        assert_eq!(Value::Float(-3.25), cast_ok(json!({ "type": "number" }), json!("-3.25")));
        assert_eq!(Value::Float(123.0), cast_ok(json!({ "type": "number" }), json!("123")));
        assert_eq!(
            Value::Float(3.0),
            cast_ok(json!({ "type": "number", "format": "double" }), json!(3))
        );
        assert_eq!(
            Value::Float(3.0),
            cast_ok(json!({ "type": "number", "format": "float" }), json!("3"))
        );

        for bad in [json!("1e5"), json!("abc"), json!(".5"), json!(false), json!([1])] {
            assert_eq!(
                CastErrorReason::InvalidType,
                cast_err(json!({ "type": "number" }), bad)[0].reason
            );
        }
    }

    #[test]
    fn string() {
        assert_eq!(
            Value::String("hi".to_owned()),
            cast_ok(json!({ "type": "string" }), json!("hi"))
        );

        for bad in [json!(1), json!(["hi"]), json!(null), json!({})] {
            assert_eq!(
                CastErrorReason::InvalidType,
                cast_err(json!({ "type": "string" }), bad)[0].reason
            );
        }
    }

    #[test]
    fn date() {
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()),
            cast_ok(json!({ "type": "string", "format": "date" }), json!("2018-01-01"))
        );

        for bad in ["2018-01-1", "2018-13-01", "2018-02-30", "20180101", "2018-01-01T00:00:00Z"] {
            let errors = cast_err(json!({ "type": "string", "format": "date" }), json!(bad));
            assert_eq!(CastErrorReason::InvalidDate, errors[0].reason);
            assert_eq!(json!(bad), errors[0].value);
        }
    }

    #[test]
    fn date_time() {
        assert_eq!(
            Value::DateTime(DateTime::parse_from_rfc3339("2018-01-01T00:00:00Z").unwrap()),
            cast_ok(
                json!({ "type": "string", "format": "date-time" }),
                json!("2018-01-01T00:00:00Z")
            )
        );
        assert!(matches!(
            cast_ok(
                json!({ "type": "string", "format": "date-time" }),
                json!("2018-01-01T10:30:00.5+02:00")
            ),
            Value::DateTime(_)
        ));

        for bad in ["2018-01-01T00:00:0Z", "2018-01-01T00:00:00", "2018-01-01"] {
            assert_eq!(
                CastErrorReason::InvalidDateTime,
                cast_err(json!({ "type": "string", "format": "date-time" }), json!(bad))[0].reason
            );
        }
    }

    #[test]
    fn array() {
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]),
            cast_ok(
                json!({ "type": "array", "items": { "type": "integer" } }),
                json!(["1", "2", "3"])
            )
        );

        assert_eq!(
            Value::from(json!(["a", 1])),
            cast_ok(json!({ "type": "array" }), json!(["a", 1]))
        );

        for bad in [json!("[1]"), json!({ "0": 1 }), json!(1)] {
            assert_eq!(
                CastErrorReason::InvalidType,
                cast_err(json!({ "type": "array" }), bad)[0].reason
            );
        }
    }

    #[test]
    fn array_reports_first_failing_element_only() {
        let errors = cast_err(
            json!({ "type": "array", "items": { "type": "integer" } }),
            json!(["1", "x", "y"]),
        );

        assert_eq!(
            vec![(CastErrorReason::InvalidType, vec![PathSegment::Index(1)])],
            reasons_and_paths(&errors)
        );
    }

    #[test]
    fn object_without_properties_is_open() {
        let value = json!({ "anything": [1, 2] });
        assert_eq!(Value::from(&value), cast_ok(json!({ "type": "object" }), value));
        assert_eq!(
            CastErrorReason::InvalidType,
            cast_err(json!({ "type": "object" }), json!([]))[0].reason
        );
    }

    #[test]
    fn object_casts_declared_properties() {
        let out = cast_ok(
            json!({
                "type": "object",
                "properties": {
                    "age": { "type": "integer" },
                    "born": { "type": "string", "format": "date" },
                },
            }),
            json!({ "born": "2000-02-29", "age": "30" }),
        );

        let fields = out.as_object().unwrap();
        assert_eq!(vec!["born", "age"], fields.keys().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(Value::Integer(30), fields["age"]);
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2000, 2, 29).unwrap()),
            fields["born"]
        );
    }

    #[test]
    fn object_rejects_first_unexpected_field_in_input_order() {
        let errors = cast_err(
            json!({ "type": "object", "properties": { "a": { "type": "string" } } }),
            json!({ "a": "x", "z": 1, "b": 2 }),
        );

        assert_eq!(
            vec![(CastErrorReason::UnexpectedField, vec![PathSegment::from("z")])],
            reasons_and_paths(&errors)
        );
        assert_eq!(json!("z"), errors[0].value);
    }

    #[test]
    fn object_drops_extras_when_additional_properties_true() {
        let out = cast_ok(
            json!({
                "type": "object",
                "properties": { "a": { "type": "integer" } },
                "additionalProperties": true,
            }),
            json!({ "a": "1", "z": 1 }),
        );

        assert_eq!(Value::from(json!({ "a": 1 })), out);
    }

    #[test]
    fn object_casts_typed_extras() {
        let out = cast_ok(
            json!({
                "type": "object",
                "properties": { "a": { "type": "string" } },
                "additionalProperties": { "type": "integer" },
            }),
            json!({ "a": "x", "z": "2" }),
        );
        assert_eq!(Value::from(json!({ "a": "x", "z": 2 })), out);

        let errors = cast_err(
            json!({ "type": "object", "additionalProperties": { "type": "integer" } }),
            json!({ "a": 1, "b": "x" }),
        );
        assert_eq!(
            vec![(CastErrorReason::InvalidType, vec![PathSegment::from("b")])],
            reasons_and_paths(&errors)
        );
    }

    #[test]
    fn object_accumulates_missing_fields_in_required_order() {
        let errors = cast_err(
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "string" },
                    "b": { "type": "string" },
                    "c": { "type": "string" },
                },
                "required": ["b", "a"],
            }),
            json!({}),
        );

        assert_eq!(
            vec![
                (CastErrorReason::MissingField, vec![PathSegment::from("b")]),
                (CastErrorReason::MissingField, vec![PathSegment::from("a")]),
            ],
            reasons_and_paths(&errors)
        );
    }

    #[test]
    fn object_reports_first_property_failure_in_input_order() {
        let errors = cast_err(
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" },
                },
            }),
            json!({ "b": "x", "a": "y" }),
        );

        assert_eq!(
            vec![(CastErrorReason::InvalidType, vec![PathSegment::from("b")])],
            reasons_and_paths(&errors)
        );
    }

    #[test]
    fn object_property_count_bounds() {
        let schema_json = json!({
            "type": "object",
            "properties": {
                "a": { "type": "integer" },
                "b": { "type": "integer" },
                "c": { "type": "integer" },
            },
            "minProperties": 1,
            "maxProperties": 2,
        });

        let errors = cast_err(schema_json.clone(), json!({ "a": 1, "b": 2, "c": 3 }));
        assert_eq!(CastErrorReason::MaxProperties, errors[0].reason);
        assert_eq!(Some("2"), errors[0].expected.as_deref());

        let errors = cast_err(schema_json.clone(), json!({}));
        assert_eq!(CastErrorReason::MinProperties, errors[0].reason);

        assert!(cast(&schema(schema_json), &json!({ "a": 1 }), &Components::new()).is_ok());
    }

    #[test]
    fn object_fills_defaults_for_absent_optional_properties() {
        let out = cast_ok(
            json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "integer", "default": 10 },
                    "q": { "type": "string" },
                    "page": { "type": "integer", "default": 1 },
                },
                "required": ["page"],
            }),
            json!({ "page": "2" }),
        );

        assert_eq!(Value::from(json!({ "page": 2, "limit": 10 })), out);
    }

    #[test]
    fn object_materializes_target_type() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct User {
            name: String,
            born: NaiveDate,
        }

        let out = cast_ok(
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "born": { "type": "string", "format": "date" },
                },
                "x-target-type": "User",
            }),
            json!({ "name": "Ada", "born": "1815-12-10" }),
        );

        match &out {
            Value::Instance(instance) => assert_eq!("User", instance.type_name),
            other => panic!("expected instance, got {:?}", other),
        }

        assert_eq!(
            User {
                name: "Ada".to_owned(),
                born: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
            },
            out.deserialize_into().unwrap()
        );
    }

    #[test]
    fn references_resolve_through_components() {
        let components = Components::new().with_schema("Id", Schema::new(Type::Integer));

        assert_eq!(
            Value::Integer(5),
            cast(&SchemaOrRef::reference("Id"), &json!("5"), &components).unwrap()
        );

        let errors =
            cast(&SchemaOrRef::reference("Missing"), &json!("5"), &components).unwrap_err();
        assert_eq!(CastErrorReason::UnresolvedReference, errors[0].reason);
        assert_eq!(
            Some("#/components/schemas/Missing"),
            errors[0].expected.as_deref()
        );
    }

    #[test]
    fn one_of_returns_first_successful_branch() {
        assert_eq!(
            Value::Float(123.0),
            cast_ok(
                json!({ "oneOf": [{ "type": "number" }, { "type": "string" }] }),
                json!("123")
            )
        );
        assert_eq!(
            Value::String("abc".to_owned()),
            cast_ok(
                json!({ "anyOf": [{ "type": "number" }, { "type": "string" }] }),
                json!("abc")
            )
        );
    }

    #[test]
    fn one_of_reports_last_branch_failure() {
        let errors = cast_err(
            json!({ "oneOf": [{ "type": "string" }, { "type": "boolean" }] }),
            json!(12),
        );

        assert_eq!(1, errors.len());
        assert_eq!(Some("boolean"), errors[0].expected.as_deref());
    }

    #[test]
    fn all_of_first_declaration_governs() {
        let out = cast_ok(
            json!({
                "allOf": [
                    { "type": "object", "properties": { "a": { "type": "integer" } } },
                    {
                        "type": "object",
                        "properties": {
                            "a": { "type": "string" },
                            "b": { "type": "boolean" },
                        },
                    },
                ],
            }),
            json!({ "a": "1", "b": "true" }),
        );

        assert_eq!(Value::from(json!({ "a": 1, "b": true })), out);
    }

    #[test]
    fn all_of_merges_required_and_rejects_undeclared() {
        let schema_json = json!({
            "allOf": [
                { "properties": { "a": { "type": "string" } }, "required": ["a"] },
                { "properties": { "b": { "type": "string" } }, "required": ["b"] },
            ],
        });

        let errors = cast_err(schema_json.clone(), json!({}));
        assert_eq!(
            vec![
                (CastErrorReason::MissingField, vec![PathSegment::from("a")]),
                (CastErrorReason::MissingField, vec![PathSegment::from("b")]),
            ],
            reasons_and_paths(&errors)
        );

        let errors = cast_err(schema_json, json!({ "a": "x", "b": "y", "c": 1 }));
        assert_eq!(CastErrorReason::UnexpectedField, errors[0].reason);
    }

    #[test]
    fn all_of_object_still_applies_part_variants() {
        let schema_json = json!({
            "allOf": [
                { "type": "object", "properties": { "id": { "type": "integer" } } },
                {
                    "anyOf": [
                        { "type": "object", "properties": { "id": {} }, "required": ["id"] },
                    ],
                },
            ],
        });

        assert_eq!(
            Value::from(json!({ "id": 7 })),
            cast_ok(schema_json.clone(), json!({ "id": "7" }))
        );

        let errors = cast_err(schema_json, json!({}));
        assert_eq!(
            vec![(CastErrorReason::MissingField, vec![PathSegment::from("id")])],
            reasons_and_paths(&errors)
        );
    }

    #[test]
    fn all_of_scalars_cast_through_each_part() {
        assert_eq!(
            Value::Integer(4),
            cast_ok(json!({ "allOf": [{ "type": "integer" }, { "minimum": 1 }] }), json!("4"))
        );
        assert_eq!(
            CastErrorReason::InvalidType,
            cast_err(json!({ "allOf": [{ "type": "integer" }] }), json!("x"))[0].reason
        );
    }

    #[test]
    fn discriminator_selects_schema_by_value() {
        let components = pets();
        let pet = SchemaOrRef::reference("Pet");

        let cat = cast(&pet, &json!({ "pet_type": "Cat", "meow": "true" }), &components).unwrap();
        match cat {
            Value::Instance(instance) => {
                assert_eq!("Cat", instance.type_name);
                assert_eq!(Value::Bool(true), instance.fields["meow"]);
                assert_eq!(Value::String("Cat".to_owned()), instance.fields["pet_type"]);
            }
            other => panic!("expected instance, got {:?}", other),
        }

        let dog = cast(&pet, &json!({ "pet_type": "Dog", "bark": "woof" }), &components).unwrap();
        assert_eq!(Value::from(json!({ "pet_type": "Dog", "bark": "woof" })), dog);
    }

    #[test]
    fn discriminator_errors() {
        let components = pets();
        let pet = SchemaOrRef::reference("Pet");

        let errors = cast(&pet, &json!({ "pet_type": "Cat" }), &components).unwrap_err();
        assert_eq!(
            vec![(CastErrorReason::MissingField, vec![PathSegment::from("meow")])],
            reasons_and_paths(&errors)
        );

        let errors = cast(&pet, &json!({ "meow": true }), &components).unwrap_err();
        assert_eq!(
            vec![(CastErrorReason::MissingField, vec![PathSegment::from("pet_type")])],
            reasons_and_paths(&errors)
        );

        let errors = cast(&pet, &json!({ "pet_type": 3 }), &components).unwrap_err();
        assert_eq!(
            vec![(CastErrorReason::InvalidType, vec![PathSegment::from("pet_type")])],
            reasons_and_paths(&errors)
        );

        let errors = cast(&pet, &json!({ "pet_type": "Fish" }), &components).unwrap_err();
        assert_eq!(CastErrorReason::UnresolvedReference, errors[0].reason);
        assert_eq!(
            Some("#/components/schemas/Fish"),
            errors[0].expected.as_deref()
        );
    }

    #[test]
    fn discriminator_mapping_and_one_of() {
        let components = pets();
        let schema = schema(json!({
            "oneOf": [
                { "$ref": "#/components/schemas/Cat" },
                { "$ref": "#/components/schemas/Dog" },
            ],
            "discriminator": {
                "propertyName": "pet_type",
                "mapping": { "kitty": "#/components/schemas/Cat", "puppy": "Dog" },
            },
        }));

        let dog = cast(&schema, &json!({ "pet_type": "puppy", "bark": "x" }), &components).unwrap();
        assert_eq!(Value::from(json!({ "pet_type": "puppy", "bark": "x" })), dog);

        let cat =
            cast(&schema, &json!({ "pet_type": "kitty", "meow": false }), &components).unwrap();
        assert!(matches!(cat, Value::Instance(_)));
    }

    #[test]
    fn self_referencing_discriminator_is_bounded_by_depth() {
        let components: Components = serde_json::from_value(json!({
            "schemas": {
                "Loop": {
                    "oneOf": [{ "$ref": "#/components/schemas/Loop" }],
                    "discriminator": { "propertyName": "kind", "mapping": { "a": "Loop" } },
                },
            },
        }))
        .unwrap();

        let errors = cast_with_options(
            &SchemaOrRef::reference("Loop"),
            &json!({ "kind": "a" }),
            &components,
            CastOptions::new().with_max_depth(8),
        )
        .unwrap_err();

        assert_eq!(CastErrorReason::MaxDepthExceeded, errors[0].reason);
    }

    #[test]
    fn nested_paths() {
        let errors = cast_err(
            json!({
                "type": "object",
                "properties": {
                    "tags": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": { "id": { "type": "integer" } },
                        },
                    },
                },
            }),
            json!({ "tags": [{ "id": 1 }, { "id": "x" }] }),
        );

        assert_eq!(
            vec![(
                CastErrorReason::InvalidType,
                vec!["tags".into(), 1.into(), "id".into()]
            )],
            reasons_and_paths(&errors)
        );
        assert_eq!("#/tags/1/id: Invalid integer. Got: string", errors[0].to_string());
    }

    #[test]
    fn cast_is_idempotent() {
        let schema_json = json!({
            "type": "object",
            "properties": {
                "n": { "type": "number", "format": "double" },
                "i": { "type": "integer" },
                "d": { "type": "string", "format": "date" },
                "t": { "type": "string", "format": "date-time" },
                "l": { "type": "array", "items": { "type": "boolean" } },
            },
            "x-target-type": "Thing",
        });

        let once = cast_ok(
            schema_json.clone(),
            json!({
                "n": "2",
                "i": "3",
                "d": "2018-01-01",
                "t": "2018-01-01T00:00:00Z",
                "l": ["true"],
            }),
        );
        let twice = cast_ok(schema_json, serde_json::to_value(&once).unwrap());

        assert_eq!(once, twice);
    }

    #[test]
    fn suite() {
        #[derive(serde::Deserialize)]
        struct TestCaseError {
            reason: String,
            path: Vec<Json>,
        }

        #[derive(serde::Deserialize)]
        struct TestCase {
            schema: SchemaOrRef,
            #[serde(default)]
            components: Components,
            input: Json,
            #[serde(default)]
            output: Option<Json>,
            #[serde(default)]
            errors: Vec<TestCaseError>,
        }

        let test_cases: IndexMap<String, TestCase> =
            serde_json::from_str(include_str!("../suite/cast.json")).expect("parse cast.json");

        for (name, test_case) in test_cases {
            let result = cast(&test_case.schema, &test_case.input, &test_case.components);

            match (result, test_case.output) {
                (Ok(out), Some(expected)) => assert_eq!(
                    expected,
                    serde_json::to_value(&out).unwrap(),
                    "wrong output: {}",
                    name
                ),
                (Err(errors), None) => {
                    let got: Vec<(String, Json)> = errors
                        .iter()
                        .map(|err| {
                            (
                                err.reason.to_string(),
                                serde_json::to_value(&err.path).unwrap(),
                            )
                        })
                        .collect();
                    let expected: Vec<(String, Json)> = test_case
                        .errors
                        .into_iter()
                        .map(|err| (err.reason, Json::Array(err.path)))
                        .collect();

                    assert_eq!(expected, got, "wrong errors: {}", name);
                }
                (Ok(out), None) => panic!("{}: expected errors, got {:?}", name, out),
                (Err(errors), Some(_)) => panic!("{}: expected output, got {:?}", name, errors),
            }
        }
    }
}
