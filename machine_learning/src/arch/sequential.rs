use std::mem;

use ndarray::Array3;
use rand::Rng;

use super::{
    layers::Layer,
    params::{BackIter, FrontIter},
};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Returns the amount of parameters in the network.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    /// Returns the amount of time steps one output depends on, composing the layers' own.
    pub fn receptive_field(&self) -> usize {
        1 + self
            .layers
            .iter()
            .map(|layer| layer.receptive_field() - 1)
            .sum::<usize>()
    }

    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        self.check_size(params.len())?;

        let mut rest = params;
        for layer in &self.layers {
            let (head, tail) = mem::take(&mut rest).split_at_mut(layer.size());
            layer.init_params(head, rng)?;
            rest = tail;
        }

        Ok(())
    }

    pub fn set_training(&mut self, training: bool) {
        self.layers
            .iter_mut()
            .for_each(|layer| layer.set_training(training));
    }

    pub fn set_stateful(&mut self, stateful: bool) {
        self.layers
            .iter_mut()
            .for_each(|layer| layer.set_stateful(stateful));
    }

    pub fn reset_state(&mut self) {
        self.layers.iter_mut().for_each(Layer::reset_state);
    }

    pub fn buffer_size(&self) -> usize {
        self.layers.iter().map(Layer::buffer_size).sum()
    }

    pub fn buffers(&self, out: &mut Vec<f32>) {
        self.layers.iter().for_each(|layer| layer.buffers(out));
    }

    pub fn load_buffers(&mut self, buffers: &[f32]) -> Result<()> {
        let mut front = FrontIter::new(buffers);
        for layer in self.layers.iter_mut() {
            let size = layer.buffer_size();
            layer.load_buffers(front.next(size)?)?;
        }

        Ok(())
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The parameters of the network.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, params: &[f32], mut x: Array3<f32>) -> Result<Array3<f32>> {
        self.check_size(params.len())?;

        let mut front = FrontIter::new(params);
        for layer in self.layers.iter_mut() {
            let params = front.next(layer.size())?;
            x = layer.forward(params, x)?;
        }

        Ok(x)
    }

    /// Propagates the *deltas* of the last output backwards through every layer.
    ///
    /// # Arguments
    /// * `params` - The parameters of the network.
    /// * `grad` - The gradient buffer the layers accumulate into.
    /// * `d` - The deltas of the last output.
    ///
    /// # Returns
    /// The deltas of the last input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        self.check_size(params.len())?;

        let mut back = BackIter::new(params, grad)?;
        for layer in self.layers.iter_mut().rev() {
            let (params, grad) = back.next(layer.size())?;
            d = layer.backward(params, grad, d)?;
        }

        Ok(d)
    }

    fn check_size(&self, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what: "sequential params",
                got,
                expected,
            });
        }

        Ok(())
    }
}
