#![no_main]
use libfuzzer_sys::fuzz_target;
use openapi_cast::{cast_with_options, CastOptions, Components, SchemaOrRef};
use serde_json::Value;

// Input is a JSON array: `[schema, components, input]`.
fuzz_target!(|data: &[u8]| {
    let (schema, components, input): (SchemaOrRef, Components, Value) =
        match serde_json::from_slice(data) {
            Ok(parsed) => parsed,
            Err(_) => return,
        };

    // Self-referencing schemas recurse without a bound.
    let options = CastOptions::new().with_max_depth(32);
    let _ = cast_with_options(&schema, &input, &components, options);
});
