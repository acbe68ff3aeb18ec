use crate::schema::{Reference, Schema, SchemaOrRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Registry of named schemas that references resolve against.
///
/// Deserializes from an OpenAPI `components` object; component kinds other
/// than `schemas` are ignored. The registry is only ever borrowed by the
/// engines, so one instance can serve any number of concurrent calls.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Components {
    #[serde(default)]
    pub schemas: IndexMap<String, Schema>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, name: &str, schema: Schema) -> Self {
        self.schemas.insert(name.to_owned(), schema);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Looks up the schema a reference points at. No caching and no cycle
    /// detection; callers walking the tree bound their own recursion.
    pub fn resolve(&self, reference: &Reference) -> Option<&Schema> {
        let resolved = reference.name().and_then(|name| self.get(name));
        if resolved.is_none() {
            debug!(reference = %reference.target, "schema reference did not resolve");
        }

        resolved
    }

    pub fn resolve_schema<'a>(&'a self, schema: &'a SchemaOrRef) -> Option<&'a Schema> {
        match schema {
            SchemaOrRef::Ref(reference) => self.resolve(reference),
            SchemaOrRef::Schema(schema) => Some(schema.as_ref()),
        }
    }
}
