//! Casting and validation of JSON values against OpenAPI schemas.
//!
//! [`cast`] turns loosely typed input (query strings, form fields, JSON
//! bodies) into the [`Value`] a schema describes, coercing lexical forms such
//! as `"42"` or `"2018-01-01"` along the way. [`validate`] then checks a value
//! against the schema's constraints without coercing anything.
//!
//! ```
//! use openapi_cast::{cast, validate, Components, SchemaOrRef, Value};
//! use serde_json::json;
//!
//! let components: Components = serde_json::from_value(json!({
//!     "schemas": {
//!         "Page": { "type": "integer", "minimum": 1 },
//!     },
//! }))
//! .unwrap();
//!
//! let schema = SchemaOrRef::reference("Page");
//! let page = cast(&schema, &json!("0"), &components).unwrap();
//!
//! assert_eq!(Value::Integer(0), page);
//! assert!(validate(&schema, &page, &components).is_err());
//! ```

mod cast;
mod components;
mod error;
mod parameters;
mod schema;
mod validate;
mod value;

pub use cast::*;
pub use components::*;
pub use error::*;
pub use parameters::*;
pub use schema::*;
pub use validate::*;
pub use value::*;
