use ndarray::{Zip, linalg, prelude::*};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result};

/// A causal, dilated 1-d convolution over `(batch, channel, time)` arrays.
///
/// The output at time `t` only depends on the input at times `t, t - dilation, ...,
/// t - (ksize - 1) * dilation`, the missing history is read as zeros. A `ksize` of one turns
/// this layer into a pointwise dense layer applied to every time step.
///
/// Parameters are laid out as the weights `(out, in, ksize)` followed by the biases `(out)`.
#[derive(Debug, Clone)]
pub struct Conv1d {
    in_channels: usize,
    out_channels: usize,
    ksize: usize,
    dilation: usize,
    size: usize,

    // Forward metadata
    x: Array3<f32>,
}

impl Conv1d {
    /// Creates a new `Conv1d`.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of input channels.
    /// * `out_channels` - The amount of output channels.
    /// * `ksize` - The kernel size, at least one.
    /// * `dilation` - The spacing between kernel taps, at least one.
    pub fn new(in_channels: usize, out_channels: usize, ksize: usize, dilation: usize) -> Self {
        let ksize = ksize.max(1);

        Self {
            in_channels,
            out_channels,
            ksize,
            dilation: dilation.max(1),
            size: out_channels * in_channels * ksize + out_channels,
            x: Array3::zeros((0, in_channels, 0)),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of time steps one output depends on.
    pub fn receptive_field(&self) -> usize {
        (self.ksize - 1) * self.dilation + 1
    }

    /// Fills `params` with values drawn from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `rng` - A random number generator.
    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let fan_in = (self.in_channels * self.ksize).max(1);
        let bound = 1. / (fan_in as f32).sqrt();
        let distribution = Uniform::new_inclusive(-bound, bound)
            .map_err(|e| MlErr::InvalidOption(format!("conv initialization: {e}")))?;

        params
            .iter_mut()
            .for_each(|p| *p = distribution.sample(rng));

        Ok(())
    }

    /// Makes a forward pass through the layer.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `x` - The input, shaped `(batch, in_channels, time)`.
    ///
    /// # Returns
    /// The output, shaped `(batch, out_channels, time)`.
    pub fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
        let (nbatch, channels, len) = x.dim();
        if channels != self.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv input channels",
                got: channels,
                expected: self.in_channels,
            });
        }

        let (w, b) = self.view_params(params)?;
        let b = b.insert_axis(Axis(1));
        let (ksize, dilation) = (self.ksize, self.dilation);

        let mut y = Array3::zeros((nbatch, self.out_channels, len));
        Zip::from(y.outer_iter_mut())
            .and(x.outer_iter())
            .par_for_each(|mut yb, xb| {
                yb += &b;

                for j in 0..ksize {
                    let shift = (ksize - 1 - j) * dilation;
                    if shift >= len {
                        continue;
                    }

                    let wj = w.index_axis(Axis(2), j);
                    let mut out = yb.slice_mut(s![.., shift..]);
                    linalg::general_mat_mul(1., &wj, &xb.slice(s![.., ..len - shift]), 1., &mut out);
                }
            });

        self.x = x;
        Ok(y)
    }

    /// Propagates the *deltas* of this layer's output backwards, accumulating the gradient.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's gradient, accumulated into.
    /// * `d` - The deltas of the output, shaped like the last output.
    ///
    /// # Returns
    /// The deltas of the last input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView3<f32>,
    ) -> Result<Array3<f32>> {
        let (nbatch, _, len) = self.x.dim();
        let expected = (nbatch, self.out_channels, len);
        if d.dim() != expected {
            return Err(MlErr::SizeMismatch {
                what: "conv deltas",
                got: d.len(),
                expected: nbatch * self.out_channels * len,
            });
        }

        let (w, _) = self.view_params(params)?;
        let (mut dw, mut db) = self.view_grad(grad)?;
        let (ksize, dilation) = (self.ksize, self.dilation);

        db += &d.sum_axis(Axis(2)).sum_axis(Axis(0));

        for (xb, d_b) in self.x.outer_iter().zip(d.outer_iter()) {
            for j in 0..ksize {
                let shift = (ksize - 1 - j) * dilation;
                if shift >= len {
                    continue;
                }

                let mut dwj = dw.index_axis_mut(Axis(2), j);
                linalg::general_mat_mul(
                    1.,
                    &d_b.slice(s![.., shift..]),
                    &xb.slice(s![.., ..len - shift]).t(),
                    1.,
                    &mut dwj,
                );
            }
        }

        let mut dx = Array3::zeros(self.x.raw_dim());
        Zip::from(dx.outer_iter_mut())
            .and(d.outer_iter())
            .par_for_each(|mut dxb, d_b| {
                for j in 0..ksize {
                    let shift = (ksize - 1 - j) * dilation;
                    if shift >= len {
                        continue;
                    }

                    let wj = w.index_axis(Axis(2), j);
                    let mut out = dxb.slice_mut(s![.., ..len - shift]);
                    linalg::general_mat_mul(1., &wj.t(), &d_b.slice(s![.., shift..]), 1., &mut out);
                }
            });

        Ok(dx)
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView3<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_size(params.len())?;

        let w_size = self.size - self.out_channels;
        let shape = (self.out_channels, self.in_channels, self.ksize);
        let weights = ArrayView3::from_shape(shape, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.out_channels, &params[w_size..])?;
        Ok((weights, biases))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut3<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_size(grad.len())?;

        let w_size = self.size - self.out_channels;
        let shape = (self.out_channels, self.in_channels, self.ksize);
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut3::from_shape(shape, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.out_channels, db_raw)?;
        Ok((dw, db))
    }

    fn check_size(&self, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what: "conv params",
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn causal_kernel_only_sees_the_past() {
        // out = 1 * x[t] + 2 * x[t - 2] + 0.5
        let mut conv = Conv1d::new(1, 1, 2, 2);
        let params = [2., 1., 0.5];
        let x = Array3::from_shape_vec((1, 1, 4), vec![1., 2., 3., 4.]).unwrap();

        let y = conv.forward(&params, x).unwrap();

        let expected = [1.5, 2.5, 5.5, 8.5];
        assert_eq!(y.iter().copied().collect::<Vec<_>>(), expected);
        assert_eq!(conv.receptive_field(), 3);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut conv = Conv1d::new(2, 3, 3, 1);
        let params: Vec<f32> = (0..conv.size()).map(|i| (i as f32 * 0.37).sin()).collect();
        let x = Array3::from_shape_fn((2, 2, 5), |(b, c, t)| (b + 2 * c + t) as f32 * 0.1);

        let y = conv.forward(&params, x.clone()).unwrap();
        let mut grad = vec![0.; conv.size()];
        conv.backward(&params, &mut grad, Array3::ones(y.raw_dim()).view())
            .unwrap();

        let h = 1e-2;
        for k in 0..params.len() {
            let mut plus = params.clone();
            plus[k] += h;
            let mut minus = params.clone();
            minus[k] -= h;

            let f_plus = conv.forward(&plus, x.clone()).unwrap().sum();
            let f_minus = conv.forward(&minus, x.clone()).unwrap().sum();
            let numeric = (f_plus - f_minus) / (2. * h);
            assert!((numeric - grad[k]).abs() < 1e-2, "param {k}: {numeric} vs {}", grad[k]);
        }
    }
}
