use ndarray::Array3;

use crate::arch::activations::ActFn;

/// Applies an activation function element-wise.
#[derive(Debug, Clone)]
pub struct Activation {
    act_fn: ActFn,
    z: Array3<f32>,
}

impl Activation {
    pub fn new(act_fn: ActFn) -> Self {
        Self {
            act_fn,
            z: Array3::zeros((0, 0, 0)),
        }
    }

    pub fn forward(&mut self, z: Array3<f32>) -> Array3<f32> {
        let a = z.mapv(|z| self.act_fn.f(z));
        self.z = z;
        a
    }

    pub fn backward(&mut self, mut d: Array3<f32>) -> Array3<f32> {
        d.zip_mut_with(&self.z, |d, &z| *d *= self.act_fn.df(z));
        d
    }
}
