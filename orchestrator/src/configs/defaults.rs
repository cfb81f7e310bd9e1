use serde::Serialize;
use serde_json::{Map, Value};

use super::{
    ChenOptions, F16gvtOptions, LstmOptions, MlpOptions, OptimizerOptions, SilverboxOptions,
    TcnOptions, TestOptions, TrainOptions,
};
use crate::{OrchestratorError, Result};

/// Every option a run accepts, with its default value.
#[derive(Debug, Serialize)]
struct Defaults {
    cuda: bool,
    seed: u64,
    logdir: Option<String>,
    run_name: Option<String>,
    load_model: Option<String>,
    normalize: bool,
    normalize_n_std: u32,
    train_options: TrainOptions,
    test_options: TestOptions,
    optimizer: OptimizerOptions,
    dataset: &'static str,
    dataset_options: Map<String, Value>,
    chen_options: ChenOptions,
    silverbox_options: SilverboxOptions,
    f16gvt_options: F16gvtOptions,
    model: &'static str,
    model_options: Map<String, Value>,
    tcn_options: TcnOptions,
    lstm_options: LstmOptions,
    mlp_options: MlpOptions,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            cuda: false,
            seed: 1111,
            logdir: None,
            run_name: None,
            load_model: None,
            normalize: false,
            normalize_n_std: 1,
            train_options: TrainOptions::default(),
            test_options: TestOptions::default(),
            optimizer: OptimizerOptions::default(),
            dataset: "f16gvt",
            dataset_options: Map::new(),
            chen_options: ChenOptions::default(),
            silverbox_options: SilverboxOptions::default(),
            f16gvt_options: F16gvtOptions::default(),
            model: "tcn",
            model_options: Map::new(),
            tcn_options: TcnOptions::default(),
            lstm_options: LstmOptions::default(),
            mlp_options: MlpOptions::default(),
        }
    }
}

/// Returns a fresh copy of the default options, before cleaning.
pub fn default_options() -> Result<Map<String, Value>> {
    match serde_json::to_value(Defaults::default()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OrchestratorError::InvalidConfig(
            "default options must be a mapping".into(),
        )),
        Err(e) => Err(OrchestratorError::json("default options")(e)),
    }
}
