#![no_main]
use libfuzzer_sys::fuzz_target;
use openapi_cast::{
    cast_with_options, validate_with_options, CastOptions, Components, SchemaOrRef,
    ValidateOptions, Value,
};

// Input is a JSON array: `[schema, components, instance]`.
fuzz_target!(|data: &[u8]| {
    let (schema, components, instance): (SchemaOrRef, Components, serde_json::Value) =
        match serde_json::from_slice(data) {
            Ok(parsed) => parsed,
            Err(_) => return,
        };

    let options = ValidateOptions::new().with_max_depth(32);
    let _ = validate_with_options(&schema, &Value::from(&instance), &components, options);

    let options = CastOptions::new().with_max_depth(32);
    if let Ok(cast) = cast_with_options(&schema, &instance, &components, options) {
        let options = ValidateOptions::new().with_max_depth(32);
        let _ = validate_with_options(&schema, &cast, &components, options);
    }
});
