use crate::cast::parse_date;
use crate::components::Components;
use crate::error::{pointer, PathSegment, ValidateError};
use crate::schema::{
    AdditionalProperties, Discriminator, ExclusiveBound, Format, Schema, SchemaOrRef, Type,
};
use crate::value::Value;
use chrono::DateTime;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Display;

#[derive(Default)]
pub struct ValidateOptions {
    max_depth: usize,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Checks `value` against the constraints of `schema`.
///
/// Violations come back as one message, a `#/`-prefixed line per violation.
/// Object properties and `allOf` report every violation they find; anything
/// else stops at the first.
///
/// ```
/// use openapi_cast::{validate, Components, SchemaOrRef, Value};
/// use serde_json::json;
///
/// let schema: SchemaOrRef =
///     serde_json::from_value(json!({ "type": "string", "maxLength": 3 })).unwrap();
///
/// assert!(validate(&schema, &Value::from(json!("abc")), &Components::new()).is_ok());
/// assert_eq!(
///     "#/: String length 4 is larger than maxLength: 3",
///     validate(&schema, &Value::from(json!("abcd")), &Components::new())
///         .unwrap_err()
///         .to_string()
/// );
/// ```
pub fn validate(
    schema: &SchemaOrRef,
    value: &Value,
    components: &Components,
) -> Result<(), ValidateError> {
    validate_with_options(schema, value, components, ValidateOptions::new())
}

pub fn validate_with_options(
    schema: &SchemaOrRef,
    value: &Value,
    components: &Components,
    options: ValidateOptions,
) -> Result<(), ValidateError> {
    let mut vm = Vm {
        components,
        max_depth: options.max_depth,
        depth: 0,
        instance_tokens: vec![],
        patterns: HashMap::new(),
    };

    match vm.validate(schema, value, None) {
        Ok(()) => Ok(()),
        Err(VmValidateError::Invalid(messages)) => Err(ValidateError::Invalid(messages.join("\n"))),
        Err(VmValidateError::MaxDepthExceeded) => Err(ValidateError::MaxDepthExceeded),
    }
}

struct Vm<'a> {
    components: &'a Components,
    max_depth: usize,
    depth: usize,
    instance_tokens: Vec<PathSegment>,
    patterns: HashMap<String, Result<Regex, regex::Error>>,
}

enum VmValidateError {
    Invalid(Vec<String>),
    MaxDepthExceeded,
}

type VmResult = Result<(), VmValidateError>;

impl<'a> Vm<'a> {
    fn validate(
        &mut self,
        schema: &SchemaOrRef,
        value: &Value,
        parent_tag: Option<&str>,
    ) -> VmResult {
        match schema {
            SchemaOrRef::Schema(schema) => self.validate_schema(schema, value, parent_tag),
            SchemaOrRef::Ref(reference) => {
                let components = self.components;
                match components.resolve(reference) {
                    Some(resolved) => {
                        self.descend(|vm| vm.validate_schema(resolved, value, parent_tag))
                    }
                    None => Err(self.violation(format!(
                        "Unresolved schema reference: {}",
                        reference.target
                    ))),
                }
            }
        }
    }

    fn validate_schema(
        &mut self,
        schema: &Schema,
        value: &Value,
        parent_tag: Option<&str>,
    ) -> VmResult {
        if value.is_null() && schema.nullable() {
            return Ok(());
        }

        if let Some(type_) = schema.type_ {
            self.validate_type(schema, type_, value)?;
        }

        if let Some(allowed) = &schema.enum_ {
            if !allowed.iter().any(|allowed| value == allowed) {
                return Err(self.violation(format!(
                    "Value {} is not one of the allowed values: {}",
                    value,
                    serde_json::Value::Array(allowed.clone())
                )));
            }
        }

        match value {
            Value::Integer(_) | Value::Float(_) => self.validate_number(schema, value)?,
            Value::String(s) => self.validate_string(schema, s)?,
            Value::Array(items) => self.validate_array(schema, items)?,
            Value::Object(fields) => self.validate_object(schema, fields, parent_tag)?,
            Value::Instance(instance) => {
                self.validate_object(schema, &instance.fields, parent_tag)?
            }
            _ => {}
        }

        if let Some(discriminator) = &schema.discriminator {
            if parent_tag != Some(discriminator.property_name.as_str()) {
                self.validate_discriminator(discriminator, value)?;
            }
        }

        if !schema.all_of.is_empty() {
            self.validate_all_of(&schema.all_of, value, parent_tag)?;
        }

        if !schema.one_of.is_empty() {
            self.validate_one_of(&schema.one_of, value, parent_tag)?;
        }

        if !schema.any_of.is_empty() {
            self.validate_any_of(&schema.any_of, value, parent_tag)?;
        }

        if let Some(not) = &schema.not {
            match self.validate(not, value, parent_tag) {
                Ok(()) => {
                    return Err(self.violation("Value must not validate against the `not` schema"))
                }
                Err(VmValidateError::Invalid(_)) => {}
                Err(VmValidateError::MaxDepthExceeded) => {
                    return Err(VmValidateError::MaxDepthExceeded)
                }
            }
        }

        Ok(())
    }

    fn validate_type(&mut self, schema: &Schema, type_: Type, value: &Value) -> VmResult {
        let matches = matches!(
            (type_, value),
            (Type::Boolean, Value::Bool(_))
                | (Type::Integer, Value::Integer(_))
                | (Type::Number, Value::Integer(_) | Value::Float(_))
                | (Type::String, Value::String(_) | Value::Date(_) | Value::DateTime(_))
                | (Type::Array, Value::Array(_))
                | (Type::Object, Value::Object(_) | Value::Instance(_))
        );

        if !matches {
            return Err(self.violation(format!(
                "Invalid {}. Got: {}",
                type_.as_str(),
                value.type_name()
            )));
        }

        match (type_, schema.format(), value) {
            (Type::String, Some(Format::Date), Value::String(s)) if parse_date(s).is_none() => {
                Err(self.violation(format!("Invalid date. Got: {:?}", s)))
            }
            (Type::String, Some(Format::Date), Value::DateTime(_)) => {
                Err(self.violation("Invalid date. Got: date-time"))
            }
            (Type::String, Some(Format::DateTime), Value::String(s))
                if DateTime::parse_from_rfc3339(s).is_err() =>
            {
                Err(self.violation(format!("Invalid date-time. Got: {:?}", s)))
            }
            (Type::String, Some(Format::DateTime), Value::Date(_)) => {
                Err(self.violation("Invalid date-time. Got: date"))
            }
            (Type::Integer, Some(Format::Int32), Value::Integer(n))
                if i32::try_from(*n).is_err() =>
            {
                Err(self.violation(format!("Integer {} is out of range for int32", n)))
            }
            _ => Ok(()),
        }
    }

    fn validate_number(&mut self, schema: &Schema, value: &Value) -> VmResult {
        let n = match value.as_f64() {
            Some(n) => n,
            None => return Ok(()),
        };

        if let Some(minimum) = schema.minimum {
            if schema.exclusive_minimum == Some(ExclusiveBound::Flag(true)) {
                if n <= minimum {
                    return Err(self.violation(format!(
                        "{} is smaller than exclusive minimum {}",
                        value, minimum
                    )));
                }
            } else if n < minimum {
                return Err(self.violation(format!(
                    "{} is smaller than inclusive minimum {}",
                    value, minimum
                )));
            }
        }

        if let Some(ExclusiveBound::Limit(limit)) = schema.exclusive_minimum {
            if n <= limit {
                return Err(self.violation(format!(
                    "{} is smaller than exclusive minimum {}",
                    value, limit
                )));
            }
        }

        if let Some(maximum) = schema.maximum {
            if schema.exclusive_maximum == Some(ExclusiveBound::Flag(true)) {
                if n >= maximum {
                    return Err(self.violation(format!(
                        "{} is larger than exclusive maximum {}",
                        value, maximum
                    )));
                }
            } else if n > maximum {
                return Err(self.violation(format!(
                    "{} is larger than inclusive maximum {}",
                    value, maximum
                )));
            }
        }

        if let Some(ExclusiveBound::Limit(limit)) = schema.exclusive_maximum {
            if n >= limit {
                return Err(self.violation(format!(
                    "{} is larger than exclusive maximum {}",
                    value, limit
                )));
            }
        }

        if let Some(multiple_of) = schema.multiple_of {
            if !is_multiple_of(value, multiple_of) {
                return Err(self.violation(format!(
                    "{} is not a multiple of {}",
                    value, multiple_of
                )));
            }
        }

        Ok(())
    }

    fn validate_string(&mut self, schema: &Schema, s: &str) -> VmResult {
        let length = s.chars().count();

        if let Some(min_length) = schema.min_length {
            if length < min_length {
                return Err(self.violation(format!(
                    "String length {} is smaller than minLength: {}",
                    length, min_length
                )));
            }
        }

        if let Some(max_length) = schema.max_length {
            if length > max_length {
                return Err(self.violation(format!(
                    "String length {} is larger than maxLength: {}",
                    length, max_length
                )));
            }
        }

        if let Some(pattern) = &schema.pattern {
            match self.pattern(pattern).map(|re| re.is_match(s)) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(self.violation(format!(
                        "String {:?} does not match pattern /{}/",
                        s, pattern
                    )))
                }
                Err(err) => {
                    return Err(self.violation(format!("Invalid pattern /{}/: {}", pattern, err)))
                }
            }
        }

        Ok(())
    }

    fn validate_array(&mut self, schema: &Schema, items: &[Value]) -> VmResult {
        if let Some(min_items) = schema.min_items {
            if items.len() < min_items {
                return Err(self.violation(format!(
                    "Array length {} is smaller than minItems: {}",
                    items.len(),
                    min_items
                )));
            }
        }

        if let Some(max_items) = schema.max_items {
            if items.len() > max_items {
                return Err(self.violation(format!(
                    "Array length {} is larger than maxItems: {}",
                    items.len(),
                    max_items
                )));
            }
        }

        if schema.unique_items == Some(true) {
            for (i, item) in items.iter().enumerate() {
                if items[i + 1..].contains(item) {
                    return Err(self.violation(format!(
                        "Array items must be unique. Got: {} twice",
                        item
                    )));
                }
            }
        }

        if let Some(item_schema) = &schema.items {
            for (i, item) in items.iter().enumerate() {
                self.at(i.into(), |vm| vm.validate(item_schema, item, None))?;
            }
        }

        Ok(())
    }

    fn validate_object(
        &mut self,
        schema: &Schema,
        fields: &IndexMap<String, Value>,
        parent_tag: Option<&str>,
    ) -> VmResult {
        if let Some(max_properties) = schema.max_properties {
            if fields.len() > max_properties {
                return Err(self.violation(format!(
                    "Object property count {} is greater than maxProperties: {}",
                    fields.len(),
                    max_properties
                )));
            }
        }

        if let Some(min_properties) = schema.min_properties {
            if fields.len() < min_properties {
                return Err(self.violation(format!(
                    "Object property count {} is less than minProperties: {}",
                    fields.len(),
                    min_properties
                )));
            }
        }

        let mut messages = Vec::new();

        for name in &schema.required {
            if !fields.contains_key(name) {
                messages.push(self.at(name.as_str().into(), |vm| {
                    vm.message("Missing required property")
                }));
            }
        }

        if let Some(properties) = &schema.properties {
            for (name, property) in properties {
                if let Some(field) = fields.get(name) {
                    let result =
                        self.at(name.as_str().into(), |vm| vm.validate(property, field, None));
                    collect(result, &mut messages)?;
                }
            }
        }

        let declared = |name: &str| {
            parent_tag == Some(name)
                || schema
                    .properties
                    .as_ref()
                    .map_or(false, |properties| properties.contains_key(name))
        };

        match &schema.additional_properties {
            Some(AdditionalProperties::Bool(false)) => {
                for name in fields.keys().filter(|name| !declared(name.as_str())) {
                    messages.push(self.at(name.as_str().into(), |vm| {
                        vm.message("Unexpected property")
                    }));
                }
            }
            Some(AdditionalProperties::Schema(extra)) => {
                for (name, field) in fields.iter().filter(|(name, _)| !declared(name.as_str())) {
                    let result =
                        self.at(name.as_str().into(), |vm| vm.validate(extra, field, None));
                    collect(result, &mut messages)?;
                }
            }
            _ => {}
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(VmValidateError::Invalid(messages))
        }
    }

    fn validate_discriminator(&mut self, discriminator: &Discriminator, value: &Value) -> VmResult {
        let fields = match value.as_object() {
            Some(fields) => fields,
            None => {
                return Err(self.violation(format!("Invalid object. Got: {}", value.type_name())))
            }
        };

        let property_name = discriminator.property_name.as_str();
        let tag = match fields.get(property_name) {
            Some(Value::String(tag)) => tag,
            Some(other) => {
                return Err(self.at(property_name.into(), |vm| {
                    vm.violation(format!("Invalid string. Got: {}", other.type_name()))
                }))
            }
            None => {
                return Err(self.at(property_name.into(), |vm| {
                    vm.violation("Missing discriminator property")
                }))
            }
        };

        let schema_name = discriminator.schema_name(tag);
        let components = self.components;
        match components.get(schema_name) {
            Some(target) => {
                self.descend(|vm| vm.validate_schema(target, value, Some(property_name)))
            }
            None => Err(self.at(property_name.into(), |vm| {
                vm.violation(format!("No schema named {:?} for discriminator value", schema_name))
            })),
        }
    }

    fn validate_all_of(
        &mut self,
        parts: &[SchemaOrRef],
        value: &Value,
        parent_tag: Option<&str>,
    ) -> VmResult {
        let mut messages = Vec::new();
        for part in parts {
            let result = self.validate(part, value, parent_tag);
            collect(result, &mut messages)?;
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(VmValidateError::Invalid(messages))
        }
    }

    fn validate_one_of(
        &mut self,
        branches: &[SchemaOrRef],
        value: &Value,
        parent_tag: Option<&str>,
    ) -> VmResult {
        let mut matched = 0;
        let mut messages = Vec::new();
        for branch in branches {
            match self.validate(branch, value, parent_tag) {
                Ok(()) => matched += 1,
                Err(VmValidateError::Invalid(branch_messages)) => messages.extend(branch_messages),
                Err(VmValidateError::MaxDepthExceeded) => {
                    return Err(VmValidateError::MaxDepthExceeded)
                }
            }
        }

        match matched {
            1 => Ok(()),
            0 => {
                messages.insert(0, self.message("Failed to validate against any schema in oneOf"));
                Err(VmValidateError::Invalid(messages))
            }
            n => Err(self.violation(format!(
                "Validated against {} schemas in oneOf when exactly one was expected",
                n
            ))),
        }
    }

    fn validate_any_of(
        &mut self,
        branches: &[SchemaOrRef],
        value: &Value,
        parent_tag: Option<&str>,
    ) -> VmResult {
        let mut messages = vec![self.message("Failed to validate against any schema in anyOf")];
        for branch in branches {
            match self.validate(branch, value, parent_tag) {
                Ok(()) => return Ok(()),
                Err(VmValidateError::Invalid(branch_messages)) => messages.extend(branch_messages),
                Err(VmValidateError::MaxDepthExceeded) => {
                    return Err(VmValidateError::MaxDepthExceeded)
                }
            }
        }

        Err(VmValidateError::Invalid(messages))
    }

    /// Compiles `pattern` to match whole strings only, once per call.
    fn pattern(&mut self, pattern: &str) -> Result<&Regex, regex::Error> {
        self.patterns
            .entry(pattern.to_owned())
            .or_insert_with(|| Regex::new(&format!("^(?:{})$", pattern)))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn at<T>(&mut self, token: PathSegment, f: impl FnOnce(&mut Self) -> T) -> T {
        self.instance_tokens.push(token);
        let out = f(self);
        self.instance_tokens.pop();
        out
    }

    fn descend(&mut self, f: impl FnOnce(&mut Self) -> VmResult) -> VmResult {
        if self.max_depth != 0 && self.depth == self.max_depth {
            return Err(VmValidateError::MaxDepthExceeded);
        }

        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn message(&self, message: impl Display) -> String {
        format!("{}: {}", pointer(&self.instance_tokens), message)
    }

    fn violation(&self, message: impl Display) -> VmValidateError {
        VmValidateError::Invalid(vec![self.message(message)])
    }
}

/// Folds a nested violation into `messages`; only a depth failure aborts.
fn collect(result: VmResult, messages: &mut Vec<String>) -> VmResult {
    match result {
        Ok(()) => Ok(()),
        Err(VmValidateError::Invalid(nested)) => {
            messages.extend(nested);
            Ok(())
        }
        Err(VmValidateError::MaxDepthExceeded) => Err(VmValidateError::MaxDepthExceeded),
    }
}

fn is_multiple_of(value: &Value, multiple_of: f64) -> bool {
    if multiple_of == 0.0 || !multiple_of.is_finite() {
        return false;
    }

    match value {
        Value::Integer(n) if multiple_of.fract() == 0.0 && multiple_of.abs() < i64::MAX as f64 => {
            // Only i64::MIN % -1 overflows, and its remainder is zero.
            n.checked_rem(multiple_of as i64).map_or(true, |rem| rem == 0)
        }
        _ => match value.as_f64() {
            Some(n) => {
                // Decimal steps such as 0.1 have no exact binary form.
                let quotient = n / multiple_of;
                quotient.is_finite()
                    && (quotient - quotient.round()).abs() <= 1e-9 * quotient.abs().max(1.0)
            }
            None => false,
        },
    }
}
