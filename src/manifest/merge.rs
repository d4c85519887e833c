use serde_json::{Map, Value};

use super::AssetManifest;

/// Fold `source` into `target`.
///
/// - Arrays are concatenated, `target`'s entries first.  A missing target
///   array is initialised with a copy of the source's.
/// - Objects are merged one level deep: inner arrays concatenate the same
///   way, any other inner value overwrites.  A missing or non-object target
///   value is replaced by an empty object before merging.
/// - Scalars (including `null`) overwrite.
///
/// Values are cloned out of `source`, so later mutation of either manifest
/// never leaks into the other.
pub fn merge(target: &mut AssetManifest, source: &AssetManifest) {
    for (key, value) in source.iter() {
        match value {
            Value::Array(items) => append(&mut target.0, key, items),
            Value::Object(inner) => {
                let slot = target
                    .0
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(target_inner) = slot {
                    for (inner_key, inner_value) in inner {
                        match inner_value {
                            Value::Array(items) => append(target_inner, inner_key, items),
                            other => {
                                target_inner.insert(inner_key.clone(), other.clone());
                            }
                        }
                    }
                }
            }
            scalar => {
                target.0.insert(key.clone(), scalar.clone());
            }
        }
    }
}

/// Concatenate `items` onto `map[key]`, creating the array when absent.  A
/// non-array value already under `key` is replaced.
fn append(map: &mut Map<String, Value>, key: &str, items: &[Value]) {
    match map.get_mut(key) {
        Some(Value::Array(existing)) => existing.extend(items.iter().cloned()),
        _ => {
            map.insert(key.to_string(), Value::Array(items.to_vec()));
        }
    }
}
