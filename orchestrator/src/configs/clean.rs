use serde_json::{Map, Value};

use super::{DATASETS, MODELS, merge::recursive_merge_at};
use crate::{OrchestratorError, Result};

/// Keeps only the option blocks of the selected dataset and model.
///
/// Every `<name>_options` block of a known dataset or model is removed, then the block of the
/// selected one becomes the defaults of `dataset_options` / `model_options`, which override it.
///
/// # Returns
/// An error if the selected dataset or model is unknown, or if the overrides don't fit the
/// selected block.
pub fn clean_options(mut options: Map<String, Value>) -> Result<Map<String, Value>> {
    let dataset = selector(&options, "dataset", DATASETS.as_slice())
        .map_err(OrchestratorError::UnknownDataset)?;
    let model =
        selector(&options, "model", MODELS.as_slice()).map_err(OrchestratorError::UnknownModel)?;

    let mut blocks = Map::new();
    for name in DATASETS.iter().chain(MODELS.iter()) {
        if let Some(block) = options.remove(&format!("{name}_options")) {
            blocks.insert(name.to_string(), block);
        }
    }

    for (group, name) in [("dataset_options", dataset), ("model_options", model)] {
        let defaults = match blocks.remove(&name) {
            Some(Value::Object(block)) => block,
            _ => Map::new(),
        };

        let overrides = match options.remove(group) {
            Some(Value::Object(overrides)) => overrides,
            Some(Value::Null) | None => Map::new(),
            Some(other) => {
                return Err(OrchestratorError::InvalidConfig(format!(
                    "{group} must be a mapping, got {other}"
                )));
            }
        };

        let mut merged = defaults;
        recursive_merge_at(&mut merged, overrides, group, false)?;
        options.insert(group.to_string(), Value::Object(merged));
    }

    Ok(options)
}

/// Reads the name selected by `key`, the name itself as the error if it isn't known.
fn selector(
    options: &Map<String, Value>,
    key: &str,
    known: &[&str],
) -> std::result::Result<String, String> {
    match options.get(key) {
        Some(Value::String(name)) if known.contains(&name.as_str()) => Ok(name.clone()),
        Some(Value::String(name)) => Err(name.clone()),
        Some(other) => Err(other.to_string()),
        None => Err(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        configs::default_options,
        error::{ConflictKind, MergeError},
    };

    fn with(key: &str, value: Value) -> Map<String, Value> {
        let mut options = default_options().unwrap();
        options.insert(key.into(), value);
        options
    }

    #[test]
    fn only_the_selected_blocks_survive() {
        let options = clean_options(with("model", json!("mlp"))).unwrap();

        for name in DATASETS.iter().chain(MODELS.iter()) {
            assert!(!options.contains_key(&format!("{name}_options")));
        }
        assert_eq!(options["model_options"]["hidden_size"], json!(8));
        assert_eq!(options["dataset_options"]["data_dir"], json!("data/f16gvt"));
    }

    #[test]
    fn overrides_replace_block_values() {
        let mut options = with("dataset", json!("chen"));
        options.insert("dataset_options".into(), json!({"seq_len": 10}));

        let options = clean_options(options).unwrap();
        assert_eq!(options["dataset_options"]["seq_len"], json!(10));
        assert_eq!(options["dataset_options"]["train"]["ntotbatch"], json!(100));
    }

    #[test]
    fn unknown_selectors_are_rejected() {
        let err = clean_options(with("dataset", json!("wiener"))).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownDataset(name) if name == "wiener"));

        let err = clean_options(with("model", json!("gru"))).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownModel(name) if name == "gru"));
    }

    #[test]
    fn unknown_block_keys_are_rejected_with_their_path() {
        let mut options = default_options().unwrap();
        options.insert("model_options".into(), json!({"hiden_size": 3}));

        let Err(OrchestratorError::Merge(MergeError { path, kind })) = clean_options(options) else {
            panic!("expected a merge error");
        };
        assert_eq!(path, ["model_options", "hiden_size"]);
        assert_eq!(kind, ConflictKind::UnknownKey);
    }
}
