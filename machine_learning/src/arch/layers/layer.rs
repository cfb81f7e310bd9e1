use ndarray::Array3;
use rand::Rng;

use super::{Activation, BatchNorm1d, Conv1d, Dropout, Lstm};
use crate::{Result, arch::activations::ActFn};

/// A layer of a sequential network. Every layer maps `(batch, channel, time)` arrays.
#[derive(Debug, Clone)]
pub enum Layer {
    Conv(Conv1d),
    BatchNorm(BatchNorm1d),
    Activation(Activation),
    Dropout(Dropout),
    Lstm(Lstm),
}
use Layer::*;

impl Layer {
    pub fn conv(in_channels: usize, out_channels: usize, ksize: usize, dilation: usize) -> Self {
        Self::Conv(Conv1d::new(in_channels, out_channels, ksize, dilation))
    }

    pub fn batch_norm(channels: usize) -> Self {
        Self::BatchNorm(BatchNorm1d::new(channels))
    }

    pub fn activation(act_fn: ActFn) -> Self {
        Self::Activation(Activation::new(act_fn))
    }

    pub fn dropout(p: f32, seed: u64) -> Result<Self> {
        Ok(Self::Dropout(Dropout::new(p, seed)?))
    }

    pub fn lstm(input_size: usize, hidden_size: usize) -> Self {
        Self::Lstm(Lstm::new(input_size, hidden_size))
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Conv(l) => l.size(),
            BatchNorm(l) => l.size(),
            Lstm(l) => l.size(),
            Activation(_) | Dropout(_) => 0,
        }
    }

    /// Returns the amount of values this layer keeps outside of its parameters.
    pub fn buffer_size(&self) -> usize {
        match self {
            BatchNorm(l) => l.buffer_size(),
            _ => 0,
        }
    }

    /// Returns the amount of time steps one output depends on.
    pub fn receptive_field(&self) -> usize {
        match self {
            Conv(l) => l.receptive_field(),
            _ => 1,
        }
    }

    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Conv(l) => l.init_params(params, rng),
            Lstm(l) => l.init_params(params, rng),
            BatchNorm(l) => {
                l.init_params(params);
                Ok(())
            }
            Activation(_) | Dropout(_) => Ok(()),
        }
    }

    pub fn set_training(&mut self, training: bool) {
        match self {
            BatchNorm(l) => l.set_training(training),
            Dropout(l) => l.set_training(training),
            _ => {}
        }
    }

    pub fn set_stateful(&mut self, stateful: bool) {
        if let Lstm(l) = self {
            l.set_stateful(stateful);
        }
    }

    pub fn reset_state(&mut self) {
        if let Lstm(l) = self {
            l.reset_state();
        }
    }

    pub fn buffers(&self, out: &mut Vec<f32>) {
        if let BatchNorm(l) = self {
            l.buffers(out);
        }
    }

    pub fn load_buffers(&mut self, buffers: &[f32]) -> Result<()> {
        match self {
            BatchNorm(l) => l.load_buffers(buffers),
            _ => Ok(()),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
        match self {
            Conv(l) => l.forward(params, x),
            BatchNorm(l) => l.forward(params, x),
            Lstm(l) => l.forward(params, x),
            Activation(l) => Ok(l.forward(x)),
            Dropout(l) => Ok(l.forward(x)),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        match self {
            Conv(l) => l.backward(params, grad, d.view()),
            BatchNorm(l) => l.backward(params, grad, d),
            Lstm(l) => l.backward(params, grad, d),
            Activation(l) => Ok(l.backward(d)),
            Dropout(l) => Ok(l.backward(d)),
        }
    }
}
