//! Deep merging of configuration fragments

use serde_json::Value;

/// Merge configuration fragment `other` into `base`, with `other` winning.
///
/// Objects merge key by key, recursing into nested objects, so a later
/// provider can add a bucket to a cluster an earlier one declared without
/// repeating its connection string. Anything else in `other`, arrays
/// included, replaces the value in `base` outright. Keys first seen in
/// `other` are appended after the keys `base` already had.
pub fn deep_merge(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Object(target), Value::Object(layer)) => {
            for (key, value) in layer {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, value) => *target = value.clone(),
    }
}
