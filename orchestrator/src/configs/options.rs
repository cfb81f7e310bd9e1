use std::{fs, path::PathBuf};

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{
    DatasetConfig, ModelConfig, OptimizerOptions, TestOptions, TrainOptions, clean_options,
    default_options, merge::recursive_merge,
};
use crate::{OrchestratorError, Result};

/// A set of options overriding the ones below it.
#[derive(Debug, Clone)]
pub enum OptionLayer {
    Inline(Map<String, Value>),
    /// A JSON file holding a mapping.
    File(PathBuf),
}

impl OptionLayer {
    fn load(self) -> Result<Map<String, Value>> {
        match self {
            Self::Inline(map) => Ok(map),
            Self::File(path) => {
                let text = fs::read_to_string(&path)?;
                serde_json::from_str(&text)
                    .map_err(OrchestratorError::json(path.display().to_string()))
            }
        }
    }
}

/// Builds the cleaned options of a run out of the defaults and `layers`.
///
/// # Arguments
/// * `layers` - The option layers, highest priority first.
///
/// # Returns
/// The full options or an error if a layer can't be read or doesn't fit the defaults.
pub fn create_full_options(layers: Vec<OptionLayer>) -> Result<Map<String, Value>> {
    let mut options = default_options()?;

    for layer in layers.into_iter().rev() {
        debug!(layer:? = layer; "merging option layer");
        recursive_merge(&mut options, layer.load()?, false)?;
    }

    clean_options(options)
}

/// The cleaned options of a run, with every value checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub cuda: bool,
    pub seed: u64,
    pub logdir: Option<PathBuf>,
    pub run_name: Option<String>,
    pub load_model: Option<PathBuf>,
    pub normalize: bool,
    pub normalize_n_std: f32,
    pub train: TrainOptions,
    pub test: TestOptions,
    pub optimizer: OptimizerOptions,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptions {
    cuda: bool,
    seed: u64,
    logdir: Option<PathBuf>,
    run_name: Option<String>,
    load_model: Option<PathBuf>,
    normalize: bool,
    normalize_n_std: f32,
    train_options: TrainOptions,
    test_options: TestOptions,
    optimizer: OptimizerOptions,
    dataset: String,
    dataset_options: Value,
    model: String,
    model_options: Value,
}

impl Options {
    /// Checks the cleaned options `map`, as returned by `create_full_options`.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let raw: RawOptions = serde_json::from_value(Value::Object(map.clone()))
            .map_err(OrchestratorError::json("options"))?;

        Ok(Self {
            cuda: raw.cuda,
            seed: raw.seed,
            logdir: raw.logdir,
            run_name: raw.run_name,
            load_model: raw.load_model,
            normalize: raw.normalize,
            normalize_n_std: raw.normalize_n_std,
            train: raw.train_options,
            test: raw.test_options,
            optimizer: raw.optimizer,
            dataset: DatasetConfig::from_parts(&raw.dataset, raw.dataset_options)?,
            model: ModelConfig::from_parts(&raw.model, raw.model_options)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::configs::{ActFnConfig, OptimKind};

    fn inline(value: Value) -> OptionLayer {
        match value {
            Value::Object(map) => OptionLayer::Inline(map),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn higher_layers_win() {
        let options = create_full_options(vec![
            inline(json!({"seed": 3})),
            inline(json!({"seed": 2, "normalize": true})),
        ])
        .unwrap();

        assert_eq!(options["seed"], json!(3));
        assert_eq!(options["normalize"], json!(true));
    }

    #[test]
    fn defaults_parse_into_typed_options() {
        let options = Options::from_map(&create_full_options(Vec::new()).unwrap()).unwrap();

        assert_eq!(options.seed, 1111);
        assert_eq!(options.normalize_n_std, 1.);
        assert_eq!(options.optimizer.optim, OptimKind::Adam);
        assert!(matches!(options.dataset, DatasetConfig::F16gvt(_)));
        let ModelConfig::Tcn(tcn) = options.model else {
            panic!("expected a tcn");
        };
        assert_eq!(tcn.n_channels, [50, 50, 50, 50]);
    }

    #[test]
    fn model_options_override_the_selected_model() {
        let options = create_full_options(vec![inline(json!({
            "model": "mlp",
            "model_options": {"ar": false},
        }))])
        .unwrap();

        let ModelConfig::Mlp(mlp) = Options::from_map(&options).unwrap().model else {
            panic!("expected an mlp");
        };
        assert!(!mlp.ar);
        assert_eq!(mlp.activation_fn, ActFnConfig::Sigmoid);
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        let res = create_full_options(vec![inline(json!({"sed": 3}))]);
        assert!(matches!(res, Err(OrchestratorError::Merge(_))));
    }

    #[test]
    fn deprecated_keys_are_dropped() {
        let options = create_full_options(vec![inline(json!({"evaluate_model": true}))]).unwrap();
        assert!(!options.contains_key("evaluate_model"));
    }
}
