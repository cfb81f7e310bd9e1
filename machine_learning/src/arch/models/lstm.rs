use ndarray::Array3;
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{Model, RunMode, Sequential, layers::Layer},
};

/// Stacked LSTM layers followed by a pointwise output layer.
///
/// Outputs only depend on the current input and the carried hidden state, so the receptive
/// field is a single time step. During a free run simulation the layers keep their state
/// between calls, a simulation must call `reset_state` before its first step.
#[derive(Debug, Clone)]
pub struct LstmNet {
    net: Sequential,
}

impl LstmNet {
    /// Creates a new `LstmNet`.
    ///
    /// # Arguments
    /// * `input_size` - The amount of input channels.
    /// * `output_size` - The amount of output channels.
    /// * `hidden_size` - The amount of hidden units of every layer.
    /// * `num_layers` - The amount of stacked layers.
    /// * `dropout` - The dropout probability between stacked layers.
    /// * `seed` - The seed for the dropout masks.
    pub fn new(
        input_size: usize,
        output_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f32,
        seed: u64,
    ) -> Result<Self> {
        if hidden_size == 0 || num_layers == 0 {
            return Err(MlErr::InvalidOption(
                "lstm hidden_size and num_layers must be greater than 0".into(),
            ));
        }

        let mut layers = Vec::with_capacity(2 * num_layers);
        layers.push(Layer::lstm(input_size, hidden_size));
        for i in 1..num_layers {
            layers.push(Layer::dropout(dropout, seed.wrapping_add(i as u64))?);
            layers.push(Layer::lstm(hidden_size, hidden_size));
        }
        layers.push(Layer::conv(hidden_size, output_size, 1, 1));

        Ok(Self {
            net: Sequential::new(layers),
        })
    }
}

impl Model for LstmNet {
    fn size(&self) -> usize {
        self.net.size()
    }

    fn receptive_field(&self) -> usize {
        1
    }

    fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        self.net.init_params(params, rng)
    }

    fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
        self.net.forward(params, x)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        self.net.backward(params, grad, d)
    }

    fn set_mode(&mut self, mode: RunMode) {
        self.net
            .set_stateful(mode == RunMode::FreeRunSimulation);
    }

    fn set_training(&mut self, training: bool) {
        self.net.set_training(training);
    }

    fn reset_state(&mut self) {
        self.net.reset_state();
    }
}

#[cfg(test)]
mod tests {
    use ndarray::s;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn stacked_layers_add_up() {
        let net = LstmNet::new(2, 1, 3, 2, 0.5, 0).unwrap();
        let lstm = |i: usize, h: usize| 4 * h * i + 4 * h * h + 4 * h;
        assert_eq!(net.size(), lstm(2, 3) + lstm(3, 3) + 3 + 1);
        assert_eq!(net.receptive_field(), 1);
    }

    #[test]
    fn free_run_mode_carries_state_between_calls() {
        let mut net = LstmNet::new(1, 1, 4, 1, 0., 0).unwrap();
        let mut params = vec![0.; net.size()];
        net.init_params(&mut params, &mut StdRng::seed_from_u64(2))
            .unwrap();

        let x = Array3::from_shape_fn((1, 1, 5), |(_, _, t)| (t as f32).sin());
        let full = net.forward(&params, x.clone()).unwrap();

        net.set_mode(RunMode::FreeRunSimulation);
        net.reset_state();
        for t in 0..5 {
            let yt = net
                .forward(&params, x.slice(s![.., .., t..t + 1]).to_owned())
                .unwrap();
            assert!((yt[[0, 0, 0]] - full[[0, 0, t]]).abs() < 1e-6);
        }
    }
}
