//! The output schema declared to the model, and drift detection against it.
//!
//! The schema is sent with every request so the service can enforce shape.
//! Replies are also checked locally; violations are reported for logging
//! but never change the outcome, since normalization repairs them anyway.

use serde_json::{json, Value};
use std::sync::OnceLock;

static BASIC_VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static EXTENDED_VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Build the reply schema.
///
/// The extended contract adds a required `analysisLog` array of strings.
pub fn reply_schema(extended: bool) -> Value {
    let mut properties = json!({
        "score": { "type": "number" },
        "status": {
            "type": "string",
            "enum": ["TERMINAL", "DISTRESSED", "RETAIL"]
        },
        "roast": { "type": "string" }
    });
    let mut required = vec!["score", "status", "roast"];

    if extended {
        properties["analysisLog"] = json!({
            "type": "array",
            "items": { "type": "string" }
        });
        required.push("analysisLog");
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn validator(extended: bool) -> Result<&'static jsonschema::Validator, String> {
    let cell = if extended {
        &EXTENDED_VALIDATOR
    } else {
        &BASIC_VALIDATOR
    };

    cell.get_or_init(|| {
        jsonschema::options()
            .build(&reply_schema(extended))
            .map_err(|e| format!("Failed to compile reply schema: {}", e))
    })
    .as_ref()
    .map_err(Clone::clone)
}

/// List every way `reply` departs from the declared schema.
///
/// An empty list means the reply conforms.
pub fn schema_drift(reply: &Value, extended: bool) -> Vec<String> {
    match validator(extended) {
        Ok(v) => v
            .iter_errors(reply)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "reply schema unavailable; skipping drift check");
            Vec::new()
        }
    }
}
