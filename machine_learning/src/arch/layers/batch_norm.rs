use ndarray::prelude::*;

use crate::{MlErr, Result};

const EPS: f32 = 1e-5;
const MOMENTUM: f32 = 0.1;

/// Per channel batch normalization over the `(batch, time)` axes.
///
/// Parameters are laid out as the scales `gamma` followed by the shifts `beta`. The running
/// statistics used outside of training are not parameters, they are exported as buffers.
#[derive(Debug, Clone)]
pub struct BatchNorm1d {
    channels: usize,
    training: bool,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,

    // Forward metadata
    xhat: Array3<f32>,
    inv_std: Array1<f32>,
}

impl BatchNorm1d {
    /// Creates a new `BatchNorm1d`.
    ///
    /// # Arguments
    /// * `channels` - The amount of channels to normalize.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            training: true,
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            xhat: Array3::zeros((0, channels, 0)),
            inv_std: Array1::ones(channels),
        }
    }

    pub fn size(&self) -> usize {
        2 * self.channels
    }

    pub fn buffer_size(&self) -> usize {
        2 * self.channels
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Sets `gamma` to one and `beta` to zero.
    pub fn init_params(&self, params: &mut [f32]) {
        let (gamma, beta) = params.split_at_mut(self.channels);
        gamma.fill(1.);
        beta.fill(0.);
    }

    pub fn buffers(&self, out: &mut Vec<f32>) {
        out.extend(self.running_mean.iter());
        out.extend(self.running_var.iter());
    }

    pub fn load_buffers(&mut self, buffers: &[f32]) -> Result<()> {
        if buffers.len() != self.buffer_size() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm buffers",
                got: buffers.len(),
                expected: self.buffer_size(),
            });
        }

        let (mean, var) = buffers.split_at(self.channels);
        self.running_mean.assign(&ArrayView1::from(mean));
        self.running_var.assign(&ArrayView1::from(var));
        Ok(())
    }

    pub fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
        let (gamma, beta) = self.view_params(params)?;
        let (nbatch, channels, len) = x.dim();
        if channels != self.channels {
            return Err(MlErr::SizeMismatch {
                what: "batch norm channels",
                got: channels,
                expected: self.channels,
            });
        }

        let (mean, var) = if self.training {
            let n = (nbatch * len).max(1) as f32;
            let mean = x.sum_axis(Axis(2)).sum_axis(Axis(0)) / n;
            let centered = &x - &per_channel(&mean);
            let var = centered.mapv(|v| v * v).sum_axis(Axis(2)).sum_axis(Axis(0)) / n;

            let unbiased = if n > 1. { &var * (n / (n - 1.)) } else { var.clone() };
            self.running_mean = &self.running_mean * (1. - MOMENTUM) + &mean * MOMENTUM;
            self.running_var = &self.running_var * (1. - MOMENTUM) + &unbiased * MOMENTUM;

            (mean, var)
        } else {
            (self.running_mean.clone(), self.running_var.clone())
        };

        self.inv_std = var.mapv(|v| 1. / (v + EPS).sqrt());
        self.xhat = (x - &per_channel(&mean)) * &per_channel(&self.inv_std);

        let y = &self.xhat * &per_channel(&gamma.to_owned()) + &per_channel(&beta.to_owned());
        Ok(y)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        let (gamma, _) = self.view_params(params)?;
        if d.dim() != self.xhat.dim() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm deltas",
                got: d.len(),
                expected: self.xhat.len(),
            });
        }

        let (dgamma, dbeta) = grad.split_at_mut(self.channels);
        let d_xhat_sum = (&d * &self.xhat).sum_axis(Axis(2)).sum_axis(Axis(0));
        let d_sum = d.sum_axis(Axis(2)).sum_axis(Axis(0));

        dgamma.iter_mut().zip(&d_xhat_sum).for_each(|(g, v)| *g += v);
        dbeta.iter_mut().zip(&d_sum).for_each(|(g, v)| *g += v);

        let gamma = gamma.to_owned();
        let dxhat = d * &per_channel(&gamma);

        if !self.training {
            return Ok(dxhat * &per_channel(&self.inv_std));
        }

        let (nbatch, _, len) = self.xhat.dim();
        let n = (nbatch * len).max(1) as f32;
        let dxhat_sum = dxhat.sum_axis(Axis(2)).sum_axis(Axis(0));
        let dxhat_xhat_sum = (&dxhat * &self.xhat).sum_axis(Axis(2)).sum_axis(Axis(0));

        let dx = (dxhat * n - &per_channel(&dxhat_sum)
            - &self.xhat * &per_channel(&dxhat_xhat_sum))
            * &per_channel(&(&self.inv_std / n));

        Ok(dx)
    }

    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm params",
                got: params.len(),
                expected: self.size(),
            });
        }

        let (gamma, beta) = params.split_at(self.channels);
        Ok((ArrayView1::from(gamma), ArrayView1::from(beta)))
    }
}

/// Views a per channel vector as a `(1, channel, 1)` array so it broadcasts over batches and
/// time steps.
fn per_channel(v: &Array1<f32>) -> ArrayView3<'_, f32> {
    v.view().insert_axis(Axis(0)).insert_axis(Axis(2))
}
