//! Layering of YAML configuration documents.
//!
//! Mappings merge key by key; any other value in a higher tier replaces the
//! lower one, so lists such as `resource_roots` are never concatenated.

use serde_yaml::Value;

/// Merge `overlay` onto `base`. A null overlay keeps `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold documents from lowest to highest tier.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_overlay_wins_per_key() {
        let merged = deep_merge(
            yaml("directory_source: a.properties\ndefault_refresh_secs: 10\n"),
            yaml("default_refresh_secs: 20\n"),
        );
        assert_eq!(
            merged,
            yaml("directory_source: a.properties\ndefault_refresh_secs: 20\n")
        );
    }

    #[test]
    fn test_lists_are_replaced() {
        let merged = deep_merge(
            yaml("resource_roots: [a, b]\n"),
            yaml("resource_roots: [c]\n"),
        );
        assert_eq!(merged, yaml("resource_roots: [c]\n"));
    }

    #[test]
    fn test_null_keeps_base() {
        assert_eq!(deep_merge(yaml("x: 1"), Value::Null), yaml("x: 1"));
        assert_eq!(deep_merge_all(Vec::new()), Value::Null);
    }
}
