#![forbid(unsafe_code)]

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Field name standing for "the whole payload" when either side is not a
/// JSON object.
pub const WHOLE_PAYLOAD: &str = "*";

/// RFC 7386 JSON merge patch: objects merge recursively, `null` removes a
/// member, anything else replaces the target.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_members) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target_members) = target else {
        return;
    };

    for (key, value) in patch_members {
        if value.is_null() {
            target_members.remove(key);
            continue;
        }
        let slot = target_members.entry(key.clone()).or_insert(Value::Null);
        apply_merge_patch(slot, value);
    }
}

/// Top-level payload fields whose values differ between `before` and
/// `after`. Non-object payloads compare as a single [`WHOLE_PAYLOAD`] field.
pub fn changed_fields(before: &Value, after: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, value) in a {
                if b.get(key) != Some(value) {
                    out.insert(key.clone());
                }
            }
            for key in b.keys() {
                if !a.contains_key(key) {
                    out.insert(key.clone());
                }
            }
        }
        (a, b) => {
            if a != b {
                out.insert(WHOLE_PAYLOAD.to_string());
            }
        }
    }
    out
}

/// Copies `fields` from `source` over `base`; fields absent from `source`
/// are removed. A [`WHOLE_PAYLOAD`] entry replaces the payload outright.
pub fn overlay_fields(base: &Value, source: &Value, fields: &BTreeSet<String>) -> Value {
    if fields.contains(WHOLE_PAYLOAD) {
        return source.clone();
    }
    let (Value::Object(base_members), Value::Object(source_members)) = (base, source) else {
        return source.clone();
    };
    let mut out = base_members.clone();
    for field in fields {
        match source_members.get(field) {
            Some(value) => {
                out.insert(field.clone(), value.clone());
            }
            None => {
                out.remove(field);
            }
        }
    }
    Value::Object(out)
}
