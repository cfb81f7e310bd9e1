use ndarray::Array3;
use rand::Rng;

use super::{LstmNet, Mlp, Tcn};
use crate::{
    Result,
    arch::{Model, RunMode},
};

/// The architectures a dynamic model can wrap.
#[derive(Debug, Clone)]
pub enum Predictor {
    Mlp(Mlp),
    Tcn(Tcn),
    Lstm(LstmNet),
}

impl Model for Predictor {
    fn size(&self) -> usize {
        match self {
            Self::Mlp(m) => m.size(),
            Self::Tcn(m) => m.size(),
            Self::Lstm(m) => m.size(),
        }
    }

    fn receptive_field(&self) -> usize {
        match self {
            Self::Mlp(m) => m.receptive_field(),
            Self::Tcn(m) => m.receptive_field(),
            Self::Lstm(m) => m.receptive_field(),
        }
    }

    fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Self::Mlp(m) => m.init_params(params, rng),
            Self::Tcn(m) => m.init_params(params, rng),
            Self::Lstm(m) => m.init_params(params, rng),
        }
    }

    fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
        match self {
            Self::Mlp(m) => m.forward(params, x),
            Self::Tcn(m) => m.forward(params, x),
            Self::Lstm(m) => m.forward(params, x),
        }
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        match self {
            Self::Mlp(m) => m.backward(params, grad, d),
            Self::Tcn(m) => m.backward(params, grad, d),
            Self::Lstm(m) => m.backward(params, grad, d),
        }
    }

    fn set_mode(&mut self, mode: RunMode) {
        match self {
            Self::Mlp(m) => m.set_mode(mode),
            Self::Tcn(m) => m.set_mode(mode),
            Self::Lstm(m) => m.set_mode(mode),
        }
    }

    fn set_training(&mut self, training: bool) {
        match self {
            Self::Mlp(m) => m.set_training(training),
            Self::Tcn(m) => m.set_training(training),
            Self::Lstm(m) => m.set_training(training),
        }
    }

    fn reset_state(&mut self) {
        match self {
            Self::Mlp(m) => m.reset_state(),
            Self::Tcn(m) => m.reset_state(),
            Self::Lstm(m) => m.reset_state(),
        }
    }

    fn buffers(&self) -> Vec<f32> {
        match self {
            Self::Mlp(m) => m.buffers(),
            Self::Tcn(m) => m.buffers(),
            Self::Lstm(m) => m.buffers(),
        }
    }

    fn load_buffers(&mut self, buffers: &[f32]) -> Result<()> {
        match self {
            Self::Mlp(m) => m.load_buffers(buffers),
            Self::Tcn(m) => m.load_buffers(buffers),
            Self::Lstm(m) => m.load_buffers(buffers),
        }
    }
}
