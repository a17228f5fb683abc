//! Phone number extraction from loosely shaped contact payloads.

use serde_json::Value;

const PHONE_KEYS: [&str; 3] = ["phone", "phone_number", "phoneNumber"];

/// Pulls a phone number out of a host response.
///
/// Accepts a bare non-empty string, a top-level `phone` / `phone_number` / `phoneNumber` field,
/// or the same fields nested under `contact`. Empty strings count as missing.
pub fn extract_phone(payload: &Value) -> Option<String> {
    match payload {
        Value::String(phone) => non_empty(phone),
        Value::Object(object) => direct_phone(object).or_else(|| {
            object
                .get("contact")
                .and_then(Value::as_object)
                .and_then(direct_phone)
        }),
        _ => None,
    }
}

fn direct_phone(object: &serde_json::Map<String, Value>) -> Option<String> {
    PHONE_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| value.as_str().and_then(non_empty))
}

fn non_empty(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}
