//! Recursive content merge
//!
//! Keyframe content is deep-merged onto the base content: maps merge
//! key by key, arrays merge element by index and then truncate to the
//! overlay's length, scalars overwrite.

use serde_json::Value;

/// Merge `overlay` onto `base` in place.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(base_arr), Value::Array(overlay_arr)) => {
            for (index, value) in overlay_arr.iter().enumerate() {
                if index < base_arr.len() {
                    deep_merge(&mut base_arr[index], value);
                } else {
                    base_arr.push(value.clone());
                }
            }
            base_arr.truncate(overlay_arr.len());
        }
        (slot, value) => *slot = value.clone(),
    }
}
