use std::path::PathBuf;

use clap::Parser;
use serde_json::{Map, Value};

use crate::{OrchestratorError, Result, configs::OptionLayer};

/// Trains a dynamic system identification model.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Directory the runs are written to.
    #[arg(long)]
    pub logdir: Option<String>,

    /// Name of the run directory.
    #[arg(long = "run_name")]
    pub run_name: Option<String>,

    /// Checkpoint to continue from.
    #[arg(long = "load_model")]
    pub load_model: Option<PathBuf>,

    /// Deprecated, ignored.
    #[arg(long = "evaluate_model", num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool)]
    pub evaluate_model: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = parse_bool)]
    pub cuda: Option<bool>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON file with options.
    #[arg(long = "option_file")]
    pub option_file: Option<PathBuf>,

    /// Inline JSON mapping with options.
    #[arg(long = "option_dict", default_value = "{}")]
    pub option_dict: String,
}

impl Args {
    /// Returns the option layers given on the command line, highest priority first.
    ///
    /// The flags themselves come first, then the option dict and then the option file.
    pub fn into_layers(self) -> Result<Vec<OptionLayer>> {
        let mut flags = Map::new();
        let mut flag = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                flags.insert(key.to_string(), value);
            }
        };

        flag("logdir", self.logdir.map(Value::from));
        flag("run_name", self.run_name.map(Value::from));
        flag(
            "load_model",
            self.load_model
                .map(|path| Value::from(path.display().to_string())),
        );
        flag("evaluate_model", self.evaluate_model.map(Value::from));
        flag("cuda", self.cuda.map(Value::from));
        flag("seed", self.seed.map(Value::from));

        let dict = serde_json::from_str(&self.option_dict)
            .map_err(OrchestratorError::json("option_dict"))?;

        let mut layers = vec![OptionLayer::Inline(flags), OptionLayer::Inline(dict)];
        layers.extend(self.option_file.map(OptionLayer::File));
        Ok(layers)
    }
}

/// Parses a boolean the way it's usually spelled on a command line.
pub fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.to_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        _ => Err(format!("boolean value expected, got {s}")),
    }
}
