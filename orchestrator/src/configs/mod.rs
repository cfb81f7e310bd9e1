//! The options of a run: defaults, merging of option layers and the typed view of the result.

mod clean;
mod dataset;
mod defaults;
pub mod merge;
mod model;
mod options;
mod training;

pub use clean::clean_options;
pub use dataset::{
    ChenOptions, ChenSplitOptions, DATASETS, DatasetConfig, F16gvtOptions, SilverboxOptions,
};
pub use defaults::default_options;
pub use merge::{DEPRECATED_OPTIONS, recursive_merge};
pub use model::{
    ActFnConfig, LstmOptions, MODELS, MlpOptions, ModelConfig, NormalizationConfig, TcnOptions,
};
pub use options::{OptionLayer, Options, create_full_options};
pub use training::{OptimKind, OptimizerOptions, TestOptions, TrainOptions};
