//! Small helpers shared by the auth handlers.

use regex::Regex;
use serde_json::{json, Value};

/// Normalize an email for provider calls and lookups.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Payload attached to missing-field failures: the fields the endpoint
/// requires and which of them the request actually carried.
pub(super) fn required_fields_payload(fields: &[(&str, bool)]) -> Value {
    let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
    let received: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(name, present)| ((*name).to_string(), Value::Bool(*present)))
        .collect();

    json!({ "required": required, "received": received })
}
