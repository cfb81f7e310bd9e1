use ndarray::Array3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// How a dynamic model produces its outputs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Conditions each prediction on the measured output history.
    #[default]
    OneStepAhead,
    /// Feeds the model's own predictions back as output history.
    FreeRunSimulation,
}

/// A causal sequence predictor over flat parameters.
///
/// Implementors map `(batch, inputs, time)` into `(batch, outputs, time)` where the output at
/// time `t` only depends on inputs up to `t`. Parameters and gradients live outside of the
/// model, which only knows how to view them.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the amount of past time steps, the current one included, a single output
    /// depends on.
    fn receptive_field(&self) -> usize;

    /// Fills `params` with the initial values of the model's parameters.
    fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()>;

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input, shaped `(batch, inputs, time)`.
    ///
    /// # Returns
    /// The prediction, shaped `(batch, outputs, time)`.
    fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>>;

    /// Propagates the deltas of the last output backwards, **accumulating** into `grad`.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for the gradient, same length as `params`.
    /// * `d` - The deltas of the last output.
    ///
    /// # Returns
    /// The deltas of the last input.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array3<f32>)
    -> Result<Array3<f32>>;

    fn set_mode(&mut self, _mode: RunMode) {}

    /// Switches between the training and evaluation behavior of layers like dropout.
    fn set_training(&mut self, _training: bool) {}

    /// Forgets any state carried between forward calls.
    fn reset_state(&mut self) {}

    /// Returns the values the model keeps outside of its parameters, e.g. running statistics.
    fn buffers(&self) -> Vec<f32> {
        Vec::new()
    }

    fn load_buffers(&mut self, buffers: &[f32]) -> Result<()> {
        if !buffers.is_empty() {
            return Err(MlErr::SizeMismatch {
                what: "model buffers",
                got: buffers.len(),
                expected: 0,
            });
        }

        Ok(())
    }
}
