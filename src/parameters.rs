use crate::cast::cast;
use crate::components::Components;
use crate::error::CastError;
use crate::schema::{AdditionalProperties, Schema, SchemaOrRef, Type};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use tracing::debug;

/// Where a request parameter is carried. Locations are cast in declaration
/// order of this enum.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Path,
    Query,
    Header,
    Cookie,
}

impl Location {
    pub const ALL: [Location; 4] = [
        Location::Path,
        Location::Query,
        Location::Header,
        Location::Cookie,
    ];
}

/// A declared operation parameter, as found in an OpenAPI `parameters` list.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,

    #[serde(rename = "in")]
    pub location: Location,

    #[serde(default)]
    pub required: bool,

    pub schema: SchemaOrRef,
}

/// Builds the object schema that the raw values of one location cast
/// against.
///
/// Extra keys are rejected unless exactly one parameter schema of the
/// location declares `additionalProperties`, in which case its value carries
/// over.
pub fn location_schema(
    parameters: &[Parameter],
    location: Location,
    components: &Components,
) -> Schema {
    let declared: Vec<&Parameter> = parameters
        .iter()
        .filter(|parameter| parameter.location == location)
        .collect();

    let mut explicit: Vec<&AdditionalProperties> = declared
        .iter()
        .filter_map(|parameter| components.resolve_schema(&parameter.schema))
        .filter_map(|schema| schema.additional_properties.as_ref())
        .collect();

    let additional_properties = match (explicit.pop(), explicit.is_empty()) {
        (Some(only), true) => only.clone(),
        _ => AdditionalProperties::Bool(false),
    };

    Schema {
        properties: Some(
            declared
                .iter()
                .map(|parameter| (parameter.name.clone(), parameter.schema.clone()))
                .collect(),
        ),
        required: declared
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| parameter.name.clone())
            .collect(),
        additional_properties: Some(additional_properties),
        ..Schema::new(Type::Object)
    }
}

/// Casts the raw parameter values of every location and merges them into a
/// single map.
///
/// `inputs` holds, per location, the raw values already narrowed to the
/// parameters of that location. A location with declared parameters but no
/// entry in `inputs` casts as empty. The first location to fail fails the
/// whole call.
pub fn cast_parameters(
    parameters: &[Parameter],
    inputs: &BTreeMap<Location, Map<String, Json>>,
    components: &Components,
) -> Result<IndexMap<String, Value>, Vec<CastError>> {
    let mut out = IndexMap::new();

    for location in Location::ALL {
        if !parameters.iter().any(|parameter| parameter.location == location) {
            continue;
        }

        let schema = SchemaOrRef::from(location_schema(parameters, location, components));
        let raw = Json::Object(inputs.get(&location).cloned().unwrap_or_default());

        match cast(&schema, &raw, components) {
            Ok(Value::Object(fields)) => out.extend(fields),
            Ok(other) => {
                debug!(?location, got = other.type_name(), "parameters did not cast to an object");
            }
            Err(errors) => {
                debug!(?location, errors = errors.len(), "parameter cast failed");
                return Err(errors);
            }
        }
    }

    Ok(out)
}
