use std::{fs, path::Path};

use log::info;
use machine_learning::{
    dynamic::{DynamicModel, Normalizer1D},
    optimization::{Adam, GradientDescent, Optimizer},
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    OrchestratorError, Result,
    builder::{build_predictor, io_config},
    configs::{ModelConfig, OptimKind},
};

/// The file the best model of a run is saved to.
pub const BEST_MODEL: &str = "best_model.json";
/// The file the model is saved to once training ends.
pub const FINAL_MODEL: &str = "final_model.json";

/// What a checkpoint file holds.
#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    epoch: usize,
    params: Vec<f32>,
    #[serde(default)]
    buffers: Vec<f32>,
}

/// A dynamic model together with the optimizer training it.
pub struct ModelState {
    pub model: DynamicModel,
    pub optimizer: Box<dyn Optimizer>,
}

impl ModelState {
    /// Creates a new `ModelState` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `seed` - The seed of the parameter initialization and the dropout masks.
    /// * `nu` - The amount of input channels.
    /// * `ny` - The amount of output channels.
    /// * `optim` - The optimization algorithm.
    /// * `init_lr` - The initial learning rate.
    /// * `config` - The model and its options.
    /// * `normalizers` - The input and output normalizers, identities if `None`.
    pub fn new(
        seed: u64,
        nu: usize,
        ny: usize,
        optim: OptimKind,
        init_lr: f32,
        config: &ModelConfig,
        normalizers: Option<(Normalizer1D, Normalizer1D)>,
    ) -> Result<Self> {
        let io = io_config(config, nu, ny);
        let predictor = build_predictor(config, io, seed)?;

        let (normalizer_in, normalizer_out) = normalizers
            .unwrap_or_else(|| (Normalizer1D::identity(nu), Normalizer1D::identity(ny)));

        let mut model = DynamicModel::new(predictor, io, normalizer_in, normalizer_out)?;
        model.init_params(&mut StdRng::seed_from_u64(seed))?;

        let size = model.params().len();
        let optimizer: Box<dyn Optimizer> = match optim {
            OptimKind::Adam => Box::new(Adam::with_defaults(size, init_lr)),
            OptimKind::Sgd => Box::new(GradientDescent::new(init_lr)),
        };

        info!(model = config.name(), params = size; "model created");
        Ok(Self { model, optimizer })
    }

    /// Writes the parameters of the model to `path`.
    pub fn save_model(&self, epoch: usize, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint {
            epoch,
            params: self.model.params().to_vec(),
            buffers: self.model.buffers(),
        };

        let text = serde_json::to_string(&checkpoint)
            .map_err(OrchestratorError::json(path.display().to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Restores the parameters of the model from the checkpoint at `path`.
    ///
    /// # Returns
    /// The epoch the checkpoint was saved at.
    pub fn load_model(&mut self, path: &Path) -> Result<usize> {
        let text = fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&text)
            .map_err(OrchestratorError::json(path.display().to_string()))?;

        self.model.load_params(&checkpoint.params)?;
        self.model.load_buffers(&checkpoint.buffers)?;

        info!(path:? = path, epoch = checkpoint.epoch; "model restored");
        Ok(checkpoint.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::{MlpOptions, TcnOptions};

    fn state(seed: u64, config: &ModelConfig) -> ModelState {
        ModelState::new(seed, 1, 1, OptimKind::Adam, 0.01, config, None).unwrap()
    }

    #[test]
    fn checkpoints_restore_params_and_epoch() {
        let config = ModelConfig::Tcn(TcnOptions {
            n_channels: vec![2, 2],
            ..Default::default()
        });
        let path = std::env::temp_dir().join(format!("sysid-ckpt-{}.json", std::process::id()));

        let saved = state(1, &config);
        saved.save_model(7, &path).unwrap();

        let mut loaded = state(2, &config);
        assert_ne!(loaded.model.params(), saved.model.params());
        assert_eq!(loaded.load_model(&path).unwrap(), 7);
        assert_eq!(loaded.model.params(), saved.model.params());
        assert_eq!(loaded.model.buffers(), saved.model.buffers());

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn checkpoints_of_other_models_are_rejected() {
        let path = std::env::temp_dir().join(format!("sysid-other-{}.json", std::process::id()));
        state(1, &ModelConfig::Mlp(MlpOptions::default()))
            .save_model(0, &path)
            .unwrap();

        let mut tcn = state(1, &ModelConfig::Tcn(TcnOptions::default()));
        assert!(tcn.load_model(&path).is_err());

        fs::remove_file(path).unwrap();
    }
}
