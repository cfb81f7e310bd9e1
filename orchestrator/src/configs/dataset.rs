use std::path::PathBuf;

use machine_learning::dataset::{ChenSplit, F16gvtSplits, SilverboxSplits};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OrchestratorError, Result};

/// The names of the supported datasets.
pub const DATASETS: [&str; 3] = ["chen", "silverbox", "f16gvt"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChenSplitOptions {
    pub ntotbatch: usize,
    pub seed: u64,
    pub sd_v: f32,
    pub sd_w: f32,
}

impl From<ChenSplitOptions> for ChenSplit {
    fn from(o: ChenSplitOptions) -> Self {
        Self {
            ntotbatch: o.ntotbatch,
            seed: o.seed,
            sd_v: o.sd_v,
            sd_w: o.sd_w,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChenOptions {
    pub seq_len: usize,
    pub train: ChenSplitOptions,
    pub valid: ChenSplitOptions,
    pub test: ChenSplitOptions,
}

impl Default for ChenOptions {
    fn default() -> Self {
        let split = |ntotbatch, seed, sd| ChenSplitOptions {
            ntotbatch,
            seed,
            sd_v: sd,
            sd_w: sd,
        };

        Self {
            seq_len: 100,
            train: split(100, 1, 0.3),
            valid: split(5, 2, 0.3),
            test: split(5, 3, 0.),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SilverboxOptions {
    pub seq_len_train: Option<usize>,
    pub seq_len_val: Option<usize>,
    pub seq_len_test: Option<usize>,
    pub train_split: Option<f32>,
    pub shuffle_seed: Option<u64>,
    pub data_dir: PathBuf,
}

impl Default for SilverboxOptions {
    fn default() -> Self {
        Self {
            seq_len_train: Some(2048),
            seq_len_val: Some(2048),
            seq_len_test: None,
            train_split: None,
            shuffle_seed: None,
            data_dir: PathBuf::from("data/silverbox"),
        }
    }
}

impl From<&SilverboxOptions> for SilverboxSplits {
    fn from(o: &SilverboxOptions) -> Self {
        Self {
            seq_len_train: o.seq_len_train,
            seq_len_val: o.seq_len_val,
            seq_len_test: o.seq_len_test,
            train_split: o.train_split,
            shuffle_seed: o.shuffle_seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct F16gvtOptions {
    pub seq_len_train: Option<usize>,
    pub seq_len_val: Option<usize>,
    pub seq_len_test: Option<usize>,
    pub data_dir: PathBuf,
}

impl Default for F16gvtOptions {
    fn default() -> Self {
        Self {
            seq_len_train: Some(2048),
            seq_len_val: Some(2048),
            seq_len_test: None,
            data_dir: PathBuf::from("data/f16gvt"),
        }
    }
}

impl From<&F16gvtOptions> for F16gvtSplits {
    fn from(o: &F16gvtOptions) -> Self {
        Self {
            seq_len_train: o.seq_len_train,
            seq_len_val: o.seq_len_val,
            seq_len_test: o.seq_len_test,
        }
    }
}

/// The dataset of a run along with its options.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetConfig {
    Chen(ChenOptions),
    Silverbox(SilverboxOptions),
    F16gvt(F16gvtOptions),
}

impl DatasetConfig {
    /// Parses the options of the dataset called `name`.
    ///
    /// # Arguments
    /// * `name` - One of `DATASETS`.
    /// * `options` - The cleaned `dataset_options` group.
    pub fn from_parts(name: &str, options: Value) -> Result<Self> {
        let what = "dataset_options";
        let config = match name {
            "chen" => Self::Chen(serde_json::from_value(options).map_err(OrchestratorError::json(what))?),
            "silverbox" => {
                Self::Silverbox(serde_json::from_value(options).map_err(OrchestratorError::json(what))?)
            }
            "f16gvt" => Self::F16gvt(serde_json::from_value(options).map_err(OrchestratorError::json(what))?),
            other => return Err(OrchestratorError::UnknownDataset(other.to_string())),
        };

        Ok(config)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chen(_) => "chen",
            Self::Silverbox(_) => "silverbox",
            Self::F16gvt(_) => "f16gvt",
        }
    }
}
