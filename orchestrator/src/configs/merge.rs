use log::warn;
use serde_json::{Map, Value};

use crate::error::{ConflictKind, MergeError};

/// Keys that are still accepted but no longer have any effect.
pub const DEPRECATED_OPTIONS: [&str; 1] = ["evaluate_model"];

/// Keys whose nested groups accept keys missing from the defaults.
const OPEN_GROUPS: [&str; 2] = ["model_options", "dataset_options"];

/// Merges `overrides` into `defaults`, key by key.
///
/// Nested groups present on both sides are merged recursively, values present on both sides
/// are replaced. A key missing from `defaults` is inserted when `allow_new` is set or when the
/// key is inside a `model_options` or `dataset_options` group, dropped with a warning when it's
/// deprecated and rejected otherwise.
///
/// # Arguments
/// * `defaults` - The options being overridden, modified in place.
/// * `overrides` - The options with a higher priority.
/// * `allow_new` - Whether keys missing from `defaults` are accepted at this level.
///
/// # Returns
/// An error with the path of the first conflicting key.
pub fn recursive_merge(
    defaults: &mut Map<String, Value>,
    overrides: Map<String, Value>,
    allow_new: bool,
) -> Result<(), MergeError> {
    merge_at(defaults, overrides, &mut Vec::new(), allow_new)
}

/// Same as `recursive_merge`, reporting conflicts below `prefix`.
pub fn recursive_merge_at(
    defaults: &mut Map<String, Value>,
    overrides: Map<String, Value>,
    prefix: &str,
    allow_new: bool,
) -> Result<(), MergeError> {
    merge_at(defaults, overrides, &mut vec![prefix.to_string()], allow_new)
}

fn merge_at(
    defaults: &mut Map<String, Value>,
    overrides: Map<String, Value>,
    path: &mut Vec<String>,
    allow_new: bool,
) -> Result<(), MergeError> {
    for (key, value) in overrides {
        let Some(default) = defaults.get_mut(&key) else {
            if allow_new {
                defaults.insert(key, value);
            } else if DEPRECATED_OPTIONS.contains(&key.as_str()) {
                warn!("key {key} is deprecated, ignoring it");
            } else {
                return Err(conflict(path, key, ConflictKind::UnknownKey));
            }
            continue;
        };

        match (default, value) {
            (Value::Object(default), Value::Object(value)) => {
                let allow_new = allow_new || OPEN_GROUPS.contains(&key.as_str());
                path.push(key);
                merge_at(default, value, path, allow_new)?;
                path.pop();
            }
            (Value::Object(_), _) => {
                return Err(conflict(path, key, ConflictKind::ObjectOverwritten));
            }
            (_, Value::Object(_)) => {
                return Err(conflict(path, key, ConflictKind::ScalarOverwritten));
            }
            (default, value) => *default = value,
        }
    }

    Ok(())
}

fn conflict(path: &[String], key: String, kind: ConflictKind) -> MergeError {
    let mut path = path.to_vec();
    path.push(key);
    MergeError { path, kind }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn merging_with_itself_is_the_identity() {
        let options = map(json!({
            "seed": 3,
            "train_options": {"init_lr": 0.1, "nested": {"a": [1, 2]}},
            "model_options": {},
        }));

        let mut merged = options.clone();
        recursive_merge(&mut merged, options.clone(), false).unwrap();
        assert_eq!(merged, options);
    }

    #[test]
    fn overrides_replace_values_and_keep_the_rest() {
        let mut defaults = map(json!({"a": 1, "b": {"c": 2, "d": 3}}));
        recursive_merge(&mut defaults, map(json!({"b": {"d": null}})), false).unwrap();
        assert_eq!(Value::Object(defaults), json!({"a": 1, "b": {"c": 2, "d": null}}));
    }

    #[test]
    fn conflicts_report_the_dotted_path() {
        let mut defaults = map(json!({"train_options": {"init_lr": 0.1}}));
        let err = recursive_merge(
            &mut defaults,
            map(json!({"train_options": {"init_lr": {"value": 1}}})),
            false,
        )
        .unwrap_err();
        assert_eq!(err.dotted_path(), "train_options.init_lr");
        assert_eq!(err.kind, ConflictKind::ScalarOverwritten);

        let mut defaults = map(json!({"train_options": {"init_lr": 0.1}}));
        let err = recursive_merge(&mut defaults, map(json!({"train_options": 1})), false)
            .unwrap_err();
        assert_eq!(err.dotted_path(), "train_options");
        assert_eq!(err.kind, ConflictKind::ObjectOverwritten);
    }

    #[test]
    fn unknown_keys_are_rejected_outside_open_groups() {
        let mut defaults = map(json!({"train_options": {}, "model_options": {"ar": true}}));

        let err = recursive_merge(&mut defaults, map(json!({"train_options": {"foo": 1}})), false)
            .unwrap_err();
        assert_eq!(err.dotted_path(), "train_options.foo");
        assert_eq!(err.kind, ConflictKind::UnknownKey);

        recursive_merge(
            &mut defaults,
            map(json!({"model_options": {"hidden_size": 4}})),
            false,
        )
        .unwrap();
        assert_eq!(defaults["model_options"]["hidden_size"], 4);
    }

    #[test]
    fn deprecated_keys_are_dropped() {
        let mut defaults = map(json!({"seed": 1}));
        recursive_merge(&mut defaults, map(json!({"evaluate_model": true})), false).unwrap();
        assert!(!defaults.contains_key("evaluate_model"));

        let err = recursive_merge(&mut defaults, map(json!({"plot_model": true})), false)
            .unwrap_err();
        assert_eq!(err.kind, ConflictKind::UnknownKey);
    }
}
