use machine_learning::arch::RunMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainOptions {
    pub init_lr: f32,
    pub min_lr: f32,
    pub batch_size: usize,
    pub epochs: usize,
    /// The amount of epochs without improvement before the learning rate is reduced.
    pub lr_scheduler_nepochs: usize,
    /// What the learning rate is divided by when reduced.
    pub lr_scheduler_factor: f32,
    pub log_interval: usize,
    /// The mode the validation loss is computed in.
    pub training_mode: RunMode,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            init_lr: 0.001,
            min_lr: 1e-6,
            batch_size: 1,
            epochs: 10000,
            lr_scheduler_nepochs: 10,
            lr_scheduler_factor: 10.,
            log_interval: 1,
            training_mode: RunMode::OneStepAhead,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestOptions {
    pub plot: bool,
    pub plotly: bool,
    pub batch_size: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            plot: true,
            plotly: true,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimKind {
    #[default]
    Adam,
    #[serde(rename = "SGD")]
    Sgd,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerOptions {
    pub optim: OptimKind,
}
