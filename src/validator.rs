use serde_json::{Map, Value};

/// Keys every complete character card must carry.
///
/// Presence is what counts: `null` or an empty string still satisfies
/// the check.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "uuid",
    "name",
    "description",
    "personality",
    "scenario",
    "first_mes",
    "mes_example",
    "creator_notes",
    "system_prompt",
];

/// Parses `payload` and returns its top-level object if it is a complete
/// character card.
///
/// Returns `None` for:
/// - Invalid JSON
/// - A top level that is not an object (array, string, number, …)
/// - An object missing any of `REQUIRED_FIELDS`
///
/// This function must NEVER panic.
pub fn parse_complete_record(payload: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(obj)) if has_required_fields(&obj) => Some(obj),
        _ => None,
    }
}

/// Boolean form of [`parse_complete_record`].
pub fn is_complete_record(payload: &str) -> bool {
    parse_complete_record(payload).is_some()
}

fn has_required_fields(obj: &Map<String, Value>) -> bool {
    REQUIRED_FIELDS.iter().all(|field| obj.contains_key(*field))
}
