use ndarray::{concatenate, prelude::*};
use rand::Rng;

use super::{Normalizer1D, delay, window};
use crate::{
    MlErr, Result,
    arch::{Model, RunMode, models::Predictor},
    optimization::Optimizer,
};

/// How the inputs and outputs of a dynamic model line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoConfig {
    /// The amount of input channels.
    pub nu: usize,
    /// The amount of output channels.
    pub ny: usize,
    /// Whether the output history is fed to the predictor.
    pub ar: bool,
    /// The amount of time steps the inputs are delayed by.
    pub io_delay: i64,
}

impl IoConfig {
    /// Returns the amount of channels the wrapped predictor receives.
    pub fn num_model_inputs(&self) -> usize {
        if self.ar { self.nu + self.ny } else { self.nu }
    }
}

/// Wraps a predictor with the signal handling of a dynamical system: normalization, input
/// delay and, for autoregressive models, output feedback.
///
/// The model owns its flat parameters and the gradient accumulated by `backward`.
#[derive(Debug, Clone)]
pub struct DynamicModel<M: Model = Predictor> {
    model: M,
    io: IoConfig,
    normalizer_in: Normalizer1D,
    normalizer_out: Normalizer1D,
    mode: RunMode,
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl<M: Model> DynamicModel<M> {
    /// Creates a new `DynamicModel` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `model` - The predictor, taking `io.num_model_inputs()` channels into `io.ny`.
    /// * `io` - The input and output layout.
    /// * `normalizer_in` - The normalization of the inputs.
    /// * `normalizer_out` - The normalization of the outputs.
    ///
    /// # Returns
    /// An error if the normalizers don't match the layout.
    pub fn new(
        mut model: M,
        io: IoConfig,
        normalizer_in: Normalizer1D,
        normalizer_out: Normalizer1D,
    ) -> Result<Self> {
        if normalizer_in.channels() != io.nu {
            return Err(MlErr::SizeMismatch {
                what: "input normalizer",
                got: normalizer_in.channels(),
                expected: io.nu,
            });
        }

        if normalizer_out.channels() != io.ny {
            return Err(MlErr::SizeMismatch {
                what: "output normalizer",
                got: normalizer_out.channels(),
                expected: io.ny,
            });
        }

        let mode = RunMode::default();
        model.set_mode(mode);
        let size = model.size();

        Ok(Self {
            model,
            io,
            normalizer_in,
            normalizer_out,
            mode,
            params: vec![0.; size],
            grad: vec![0.; size],
        })
    }

    /// Draws the initial parameters of the predictor.
    pub fn init_params<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        self.model.init_params(&mut self.params, rng)
    }

    pub fn io(&self) -> IoConfig {
        self.io
    }

    pub fn num_model_inputs(&self) -> usize {
        self.io.num_model_inputs()
    }

    pub fn receptive_field(&self) -> usize {
        self.model.receptive_field()
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
        self.model.set_mode(mode);
    }

    pub fn set_training(&mut self, training: bool) {
        self.model.set_training(training);
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Replaces the parameters of the model.
    ///
    /// # Returns
    /// An error if `params` has the wrong length.
    pub fn load_params(&mut self, params: &[f32]) -> Result<()> {
        if params.len() != self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "model params",
                got: params.len(),
                expected: self.params.len(),
            });
        }

        self.params.copy_from_slice(params);
        Ok(())
    }

    pub fn buffers(&self) -> Vec<f32> {
        self.model.buffers()
    }

    pub fn load_buffers(&mut self, buffers: &[f32]) -> Result<()> {
        self.model.load_buffers(buffers)
    }

    /// Runs the model in its current mode.
    ///
    /// # Arguments
    /// * `u` - The inputs, shaped `(batch, nu, time)`.
    /// * `y` - The measured outputs, shaped `(batch, ny, time)`, required by autoregressive
    ///   models.
    ///
    /// # Returns
    /// The predicted outputs, shaped `(batch, ny, time)`.
    pub fn forward(&mut self, u: ArrayView3<f32>, y: Option<ArrayView3<f32>>) -> Result<Array3<f32>> {
        match self.mode {
            RunMode::OneStepAhead => self.one_step_ahead(u, y),
            RunMode::FreeRunSimulation => self.free_run_simulation(u, y),
        }
    }

    /// Predicts every output from the inputs and, when autoregressive, the measured outputs up
    /// to the previous time step.
    pub fn one_step_ahead(
        &mut self,
        u: ArrayView3<f32>,
        y: Option<ArrayView3<f32>>,
    ) -> Result<Array3<f32>> {
        let u_delayed = self.delayed_inputs(u)?;

        let x = if self.io.ar {
            let y = y.ok_or(MlErr::MissingOutputHistory)?;
            let y_normalized = self.normalizer_out.normalize(y)?;
            let y_delayed = delay(y_normalized.view(), 1);
            concatenate(Axis(1), &[u_delayed.view(), y_delayed.view()])?
        } else {
            u_delayed
        };

        let y_pred = self.model.forward(&self.params, x)?;
        self.normalizer_out.unnormalize(y_pred.view())
    }

    /// Simulates the outputs in closed loop, feeding the model its own predictions as output
    /// history. A model that isn't autoregressive only sees inputs, so this falls back to
    /// `one_step_ahead`.
    pub fn free_run_simulation(
        &mut self,
        u: ArrayView3<f32>,
        y: Option<ArrayView3<f32>>,
    ) -> Result<Array3<f32>> {
        if !self.io.ar {
            return self.one_step_ahead(u, y);
        }

        let u_delayed = self.delayed_inputs(u)?;

        self.model.set_mode(RunMode::FreeRunSimulation);
        self.model.reset_state();

        let y_sim = self.simulate(u_delayed.view());
        self.model.set_mode(self.mode);

        self.normalizer_out.unnormalize(y_sim?.view())
    }

    fn simulate(&mut self, u_delayed: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (nbatch, _, len) = u_delayed.dim();
        let rf = self.model.receptive_field();
        let mut y_sim = Array3::zeros((nbatch, self.io.ny, len));

        for i in 0..len {
            let y_in = window(y_sim.view(), i, rf);
            let u_in = window(u_delayed, i + 1, rf);
            let x = concatenate(Axis(1), &[u_in.view(), y_in.view()])?;

            let out = self.model.forward(&self.params, x)?;
            let last = out.len_of(Axis(2)) - 1;
            y_sim
                .index_axis_mut(Axis(2), i)
                .assign(&out.index_axis(Axis(2), last));
        }

        Ok(y_sim)
    }

    /// Propagates the *deltas* of the last one step ahead prediction backwards, accumulating
    /// into the gradient.
    ///
    /// # Arguments
    /// * `d` - The deltas of the unnormalized prediction.
    pub fn backward(&mut self, d: Array3<f32>) -> Result<()> {
        let d = self.normalizer_out.scale_deltas(d)?;
        self.model.backward(&self.params, &mut self.grad, d)?;
        Ok(())
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    /// Takes an optimization step with the accumulated gradient.
    pub fn optimize<O>(&mut self, optimizer: &mut O) -> Result<()>
    where
        O: Optimizer + ?Sized,
    {
        optimizer.update_params(&self.grad, &mut self.params)
    }

    fn delayed_inputs(&self, u: ArrayView3<f32>) -> Result<Array3<f32>> {
        let u_normalized = self.normalizer_in.normalize(u)?;
        Ok(delay(u_normalized.view(), self.io.io_delay))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::s;

    use super::*;
    use crate::optimization::GradientDescent;

    /// Predicts `y[t] = a * u[t] + b * y_in[t] + c * y_in[t - 1]` from `(u, y_in)` channels.
    #[derive(Debug, Clone)]
    struct Stub;

    impl Model for Stub {
        fn size(&self) -> usize {
            3
        }

        fn receptive_field(&self) -> usize {
            2
        }

        fn init_params<R: Rng>(&self, params: &mut [f32], _rng: &mut R) -> Result<()> {
            params.copy_from_slice(&[1., 0.5, -0.25]);
            Ok(())
        }

        fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
            let (nbatch, _, len) = x.dim();
            Ok(Array3::from_shape_fn((nbatch, 1, len), |(b, _, t)| {
                let prev = if t > 0 { x[[b, 1, t - 1]] } else { 0. };
                params[0] * x[[b, 0, t]] + params[1] * x[[b, 1, t]] + params[2] * prev
            }))
        }

        fn backward(
            &mut self,
            _params: &[f32],
            grad: &mut [f32],
            d: Array3<f32>,
        ) -> Result<Array3<f32>> {
            grad[0] += d.sum();
            Ok(d)
        }
    }

    fn stub_model(io_delay: i64) -> DynamicModel<Stub> {
        let io = IoConfig {
            nu: 1,
            ny: 1,
            ar: true,
            io_delay,
        };
        let mut model =
            DynamicModel::new(Stub, io, Normalizer1D::identity(1), Normalizer1D::identity(1))
                .unwrap();
        model.init_params(&mut rand::rng()).unwrap();
        model
    }

    /// Simulates the stub by hand over already delayed inputs.
    fn stub_recurrence(u_delayed: &[f32]) -> Vec<f32> {
        // The window at step i holds (y[i - 2], y[i - 1]) so the stub reads y[i - 1] and y[i - 2].
        let mut y = vec![0f32; u_delayed.len()];
        for i in 0..y.len() {
            let y1 = if i >= 1 { y[i - 1] } else { 0. };
            let y2 = if i >= 2 { y[i - 2] } else { 0. };
            y[i] = u_delayed[i] + 0.5 * y1 - 0.25 * y2;
        }
        y
    }

    fn free_run(io_delay: i64, u: &[f32]) -> Vec<f32> {
        let mut model = stub_model(io_delay);
        let u = Array3::from_shape_vec((1, 1, u.len()), u.to_vec()).unwrap();

        model.set_mode(RunMode::FreeRunSimulation);
        let y_sim = model.forward(u.view(), None).unwrap();
        y_sim.slice(s![0, 0, ..]).to_vec()
    }

    fn assert_close(got: &[f32], expected: &[f32]) {
        assert_eq!(got.len(), expected.len());
        assert!(
            got.iter().zip(expected).all(|(a, b)| (a - b).abs() < 1e-6),
            "{got:?} != {expected:?}"
        );
    }

    #[test]
    fn free_run_matches_a_manual_recurrence() {
        let u = [1., -2., 0.5, 3., 1.];
        assert_close(&free_run(0, &u), &stub_recurrence(&u));
    }

    #[test]
    fn free_run_reads_delayed_inputs() {
        let u = [1., -2., 0.5, 3., 1.];

        assert_close(&free_run(2, &u), &stub_recurrence(&[0., 0., 1., -2., 0.5]));
        assert_close(&free_run(-1, &u), &stub_recurrence(&[-2., 0.5, 3., 1., 0.]));
    }

    #[test]
    fn one_step_ahead_uses_the_measured_history() {
        let mut model = stub_model(0);
        let u = Array3::from_shape_vec((1, 1, 4), vec![1., 1., 1., 1.]).unwrap();
        let y = Array3::from_shape_vec((1, 1, 4), vec![2., 4., 8., 16.]).unwrap();

        let y_pred = model.forward(u.view(), Some(y.view())).unwrap();

        // y_in = [0, 2, 4, 8]
        let expected = [1., 1. + 1., 1. + 2. - 0.5, 1. + 4. - 1.];
        assert_eq!(y_pred.slice(s![0, 0, ..]).to_vec(), expected);
    }

    #[test]
    fn autoregressive_models_need_the_output_history() {
        let mut model = stub_model(0);
        let u = Array3::zeros((1, 1, 3));
        assert!(matches!(
            model.one_step_ahead(u.view(), None),
            Err(MlErr::MissingOutputHistory)
        ));
    }

    #[test]
    fn inputs_are_delayed_before_predicting() {
        let mut model = stub_model(2);
        let u = Array3::from_shape_vec((1, 1, 4), vec![1., 2., 3., 4.]).unwrap();
        let y = Array3::zeros((1, 1, 4));

        let y_pred = model.forward(u.view(), Some(y.view())).unwrap();
        assert_eq!(y_pred.slice(s![0, 0, ..]).to_vec(), vec![0., 0., 1., 2.]);
    }

    #[test]
    fn outputs_are_unnormalized() {
        let io = IoConfig {
            nu: 1,
            ny: 1,
            ar: true,
            io_delay: 0,
        };
        let norm_out = Normalizer1D::new(1, Some(&[2.][..]), Some(&[1.][..])).unwrap();
        let mut model = DynamicModel::new(Stub, io, Normalizer1D::identity(1), norm_out).unwrap();
        model.init_params(&mut rand::rng()).unwrap();

        let u = Array3::from_elem((1, 1, 2), 3.);
        let y = Array3::from_elem((1, 1, 2), 5.);
        let y_pred = model.forward(u.view(), Some(y.view())).unwrap();

        // y_in = [0, (5 - 1) / 2]
        let expected = [3. * 2. + 1., (3. + 0.5 * 2.) * 2. + 1.];
        assert!(y_pred.iter().zip(expected).all(|(a, b)| (a - b).abs() < 1e-5));
    }

    #[test]
    fn backward_scales_deltas_and_optimize_steps() {
        let mut model = stub_model(0);
        model.backward(Array3::ones((1, 1, 3))).unwrap();
        assert_eq!(model.grad()[0], 3.);

        model.optimize(&mut GradientDescent::new(0.1)).unwrap();
        assert!((model.params()[0] - 0.7).abs() < 1e-6);

        model.zero_grad();
        assert!(model.grad().iter().all(|&g| g == 0.));
    }

    #[test]
    fn load_params_checks_the_size() {
        let mut model = stub_model(0);
        assert!(model.load_params(&[1., 2.]).is_err());
        model.load_params(&[3., 2., 1.]).unwrap();
        assert_eq!(model.params(), &[3., 2., 1.]);
    }

    #[test]
    fn model_inputs_include_outputs_when_autoregressive() {
        let mut io = IoConfig {
            nu: 2,
            ny: 3,
            ar: true,
            io_delay: 0,
        };
        assert_eq!(io.num_model_inputs(), 5);
        io.ar = false;
        assert_eq!(io.num_model_inputs(), 2);
    }
}
