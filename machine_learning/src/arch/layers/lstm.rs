use ndarray::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result};

/// What a single time step leaves behind for the backward pass.
#[derive(Debug, Clone)]
struct StepCache {
    x: Array2<f32>,
    h_prev: Array2<f32>,
    c_prev: Array2<f32>,
    gates: Array2<f32>,
    tanh_c: Array2<f32>,
}

/// A long short-term memory layer unrolled over the time axis.
///
/// Maps `(batch, input_size, time)` into the hidden states `(batch, hidden_size, time)`.
/// Parameters are laid out as `w_ih (4h, in)`, `w_hh (4h, h)` and `b (4h)`, gates in the
/// order input, forget, cell, output.
///
/// When stateful, the last hidden and cell states are carried into the next forward call,
/// which lets a simulation feed the layer one time step at a time.
#[derive(Debug, Clone)]
pub struct Lstm {
    input_size: usize,
    hidden_size: usize,
    size: usize,
    stateful: bool,
    state: Option<(Array2<f32>, Array2<f32>)>,

    // Forward metadata
    cache: Vec<StepCache>,
}

impl Lstm {
    /// Creates a new `Lstm`.
    ///
    /// # Arguments
    /// * `input_size` - The amount of input channels.
    /// * `hidden_size` - The amount of hidden units, which is also the amount of output channels.
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        let gates = 4 * hidden_size;

        Self {
            input_size,
            hidden_size,
            size: gates * input_size + gates * hidden_size + gates,
            stateful: false,
            state: None,
            cache: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn set_stateful(&mut self, stateful: bool) {
        self.stateful = stateful;
        self.state = None;
    }

    pub fn reset_state(&mut self) {
        self.state = None;
    }

    /// Fills `params` with values drawn from `U(-1/sqrt(h), 1/sqrt(h))`.
    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let bound = 1. / (self.hidden_size.max(1) as f32).sqrt();
        let distribution = Uniform::new_inclusive(-bound, bound)
            .map_err(|e| MlErr::InvalidOption(format!("lstm initialization: {e}")))?;

        params
            .iter_mut()
            .for_each(|p| *p = distribution.sample(rng));

        Ok(())
    }

    pub fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
        let (nbatch, channels, len) = x.dim();
        if channels != self.input_size {
            return Err(MlErr::SizeMismatch {
                what: "lstm input channels",
                got: channels,
                expected: self.input_size,
            });
        }

        let (w_ih, w_hh, b) = self.view_params(params)?;
        let hs = self.hidden_size;

        let zeros = || Array2::zeros((nbatch, hs));
        let (mut h, mut c) = match self.state.take() {
            Some((h, c)) if self.stateful && h.nrows() == nbatch => (h, c),
            _ => (zeros(), zeros()),
        };

        self.cache.clear();
        let mut out = Array3::zeros((nbatch, hs, len));

        for t in 0..len {
            let xt = x.index_axis(Axis(2), t).to_owned();
            let mut gates = xt.dot(&w_ih.t()) + h.dot(&w_hh.t()) + &b;

            gates
                .slice_mut(s![.., ..2 * hs])
                .mapv_inplace(|v| 1. / (1. + (-v).exp()));
            gates.slice_mut(s![.., 2 * hs..3 * hs]).mapv_inplace(f32::tanh);
            gates
                .slice_mut(s![.., 3 * hs..])
                .mapv_inplace(|v| 1. / (1. + (-v).exp()));

            let (c_new, tanh_c, h_new) = {
                let i = gates.slice(s![.., ..hs]);
                let f = gates.slice(s![.., hs..2 * hs]);
                let g = gates.slice(s![.., 2 * hs..3 * hs]);
                let o = gates.slice(s![.., 3 * hs..]);

                let c_new = &f * &c + &i * &g;
                let tanh_c = c_new.mapv(f32::tanh);
                let h_new = &o * &tanh_c;
                (c_new, tanh_c, h_new)
            };

            out.index_axis_mut(Axis(2), t).assign(&h_new);
            self.cache.push(StepCache {
                x: xt,
                h_prev: h,
                c_prev: c,
                gates,
                tanh_c,
            });

            h = h_new;
            c = c_new;
        }

        if self.stateful {
            self.state = Some((h, c));
        }

        Ok(out)
    }

    /// Back-propagates through time over the steps of the last forward call.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        let hs = self.hidden_size;
        let len = self.cache.len();
        let nbatch = d.len_of(Axis(0));
        if d.dim() != (nbatch, hs, len) {
            return Err(MlErr::SizeMismatch {
                what: "lstm deltas",
                got: d.len(),
                expected: nbatch * hs * len,
            });
        }

        let (w_ih, w_hh, _) = self.view_params(params)?;
        let (mut dw_ih, mut dw_hh, mut db) = self.view_grad(grad)?;

        let mut dh_next = Array2::zeros((nbatch, hs));
        let mut dc_next = Array2::zeros((nbatch, hs));
        let mut dx = Array3::zeros((nbatch, self.input_size, len));

        for (t, step) in self.cache.iter().enumerate().rev() {
            let i = step.gates.slice(s![.., ..hs]);
            let f = step.gates.slice(s![.., hs..2 * hs]);
            let g = step.gates.slice(s![.., 2 * hs..3 * hs]);
            let o = step.gates.slice(s![.., 3 * hs..]);

            let dh = &d.index_axis(Axis(2), t) + &dh_next;
            let d_o = &dh * &step.tanh_c;
            let dc = &dh * &o * &step.tanh_c.mapv(|v| 1. - v * v) + &dc_next;

            let d_i = &dc * &g;
            let d_f = &dc * &step.c_prev;
            let d_g = &dc * &i;
            dc_next = &dc * &f;

            let mut dgates = Array2::zeros((nbatch, 4 * hs));
            dgates
                .slice_mut(s![.., ..hs])
                .assign(&(d_i * &i.mapv(|v| v * (1. - v))));
            dgates
                .slice_mut(s![.., hs..2 * hs])
                .assign(&(d_f * &f.mapv(|v| v * (1. - v))));
            dgates
                .slice_mut(s![.., 2 * hs..3 * hs])
                .assign(&(d_g * &g.mapv(|v| 1. - v * v)));
            dgates
                .slice_mut(s![.., 3 * hs..])
                .assign(&(d_o * &o.mapv(|v| v * (1. - v))));

            dw_ih += &dgates.t().dot(&step.x);
            dw_hh += &dgates.t().dot(&step.h_prev);
            db += &dgates.sum_axis(Axis(0));

            dx.index_axis_mut(Axis(2), t).assign(&dgates.dot(&w_ih));
            dh_next = dgates.dot(&w_hh);
        }

        Ok(dx)
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_size(params.len())?;

        let gates = 4 * self.hidden_size;
        let ih_size = gates * self.input_size;
        let hh_size = gates * self.hidden_size;

        let w_ih = ArrayView2::from_shape((gates, self.input_size), &params[..ih_size])?;
        let w_hh =
            ArrayView2::from_shape((gates, self.hidden_size), &params[ih_size..ih_size + hh_size])?;
        let b = ArrayView1::from_shape(gates, &params[ih_size + hh_size..])?;
        Ok((w_ih, w_hh, b))
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(
        ArrayViewMut2<'a, f32>,
        ArrayViewMut2<'a, f32>,
        ArrayViewMut1<'a, f32>,
    )> {
        self.check_size(grad.len())?;

        let gates = 4 * self.hidden_size;
        let (ih, rest) = grad.split_at_mut(gates * self.input_size);
        let (hh, b) = rest.split_at_mut(gates * self.hidden_size);

        let dw_ih = ArrayViewMut2::from_shape((gates, self.input_size), ih)?;
        let dw_hh = ArrayViewMut2::from_shape((gates, self.hidden_size), hh)?;
        let db = ArrayViewMut1::from_shape(gates, b)?;
        Ok((dw_ih, dw_hh, db))
    }

    fn check_size(&self, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what: "lstm params",
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}
