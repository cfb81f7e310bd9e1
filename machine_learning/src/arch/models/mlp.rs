use ndarray::Array3;
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{Model, Sequential, activations::ActFn, layers::Layer},
};

/// A one hidden layer perceptron applied over a sliding window of the last `max_past_input`
/// time steps.
///
/// The window is implemented as a causal convolution so the whole sequence is predicted in a
/// single pass; the output layer is pointwise.
#[derive(Debug, Clone)]
pub struct Mlp {
    net: Sequential,
}

impl Mlp {
    /// Creates a new `Mlp`.
    ///
    /// # Arguments
    /// * `input_size` - The amount of input channels.
    /// * `output_size` - The amount of output channels.
    /// * `hidden_size` - The amount of hidden units.
    /// * `max_past_input` - The length of the input window.
    /// * `act_fn` - The activation of the hidden layer.
    ///
    /// # Returns
    /// An error if any of the sizes is zero.
    pub fn new(
        input_size: usize,
        output_size: usize,
        hidden_size: usize,
        max_past_input: usize,
        act_fn: ActFn,
    ) -> Result<Self> {
        if hidden_size == 0 || max_past_input == 0 {
            return Err(MlErr::InvalidOption(
                "mlp hidden_size and max_past_input must be greater than 0".into(),
            ));
        }

        let net = Sequential::new([
            Layer::conv(input_size, hidden_size, max_past_input, 1),
            Layer::activation(act_fn),
            Layer::conv(hidden_size, output_size, 1, 1),
        ]);

        Ok(Self { net })
    }
}

impl Model for Mlp {
    fn size(&self) -> usize {
        self.net.size()
    }

    fn receptive_field(&self) -> usize {
        self.net.receptive_field()
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
}

#[cfg(test)]
mod tests {
    use ndarray::s;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn receptive_field_is_the_input_window() {
        let mlp = Mlp::new(3, 2, 8, 4, ActFn::sigmoid(1.)).unwrap();
        assert_eq!(mlp.receptive_field(), 4);
        assert_eq!(mlp.size(), (3 * 4 * 8 + 8) + (8 * 2 + 2));
    }

    #[test]
    fn outputs_are_causal() {
        let mut mlp = Mlp::new(1, 1, 4, 3, ActFn::tanh()).unwrap();
        let mut params = vec![0.; mlp.size()];
        mlp.init_params(&mut params, &mut StdRng::seed_from_u64(1))
            .unwrap();

        let x = Array3::from_shape_fn((1, 1, 8), |(_, _, t)| t as f32);
        let mut x_future = x.clone();
        x_future.slice_mut(s![.., .., 5..]).fill(-10.);

        let y = mlp.forward(&params, x).unwrap();
        let y_future = mlp.forward(&params, x_future).unwrap();
        assert_eq!(y.slice(s![.., .., ..5]), y_future.slice(s![.., .., ..5]));
    }
}
