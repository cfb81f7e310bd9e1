use crate::{
    MlErr, Result,
    arch::{
        Model, RunMode,
        loss::{LossFn, Mse},
    },
    dataset::DataLoader,
    dynamic::DynamicModel,
    optimization::Optimizer,
};

/// Trains and evaluates dynamic models one epoch at a time.
///
/// Training always predicts one step ahead, which is what the gradient is computed for.
/// Evaluation may run in any mode.
#[derive(Debug, Clone)]
pub struct Trainer<L: LossFn = Mse> {
    loss_fn: L,
}

impl<L: LossFn> Trainer<L> {
    /// Creates a new `Trainer`.
    ///
    /// # Arguments
    /// * `loss_fn` - The loss function used to measure the difference between a model's output
    ///   and the expected one.
    pub fn new(loss_fn: L) -> Self {
        Self { loss_fn }
    }

    /// Makes one optimization step per batch of `loader`.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `optimizer` - The optimizer taking the steps.
    /// * `loader` - The training data.
    ///
    /// # Returns
    /// The mean loss over the sequences of the epoch.
    pub fn train_epoch<M, O>(
        &self,
        model: &mut DynamicModel<M>,
        optimizer: &mut O,
        loader: &mut DataLoader,
    ) -> Result<f32>
    where
        M: Model,
        O: Optimizer + ?Sized,
    {
        let mode = model.mode();
        model.set_mode(RunMode::OneStepAhead);
        model.set_training(true);

        let res = self.run_epoch(loader, "training", |batch_u, batch_y| {
            model.zero_grad();
            let y_pred = model.one_step_ahead(batch_u, Some(batch_y))?;

            let loss = self.loss_fn.loss(y_pred.view(), batch_y);
            let d = self.loss_fn.loss_prime(y_pred.view(), batch_y);
            model.backward(d)?;
            model.optimize(optimizer)?;

            Ok(loss)
        });

        model.set_mode(mode);
        res
    }

    /// Computes the mean loss of `model` over the sequences of `loader` without training it.
    ///
    /// # Arguments
    /// * `model` - The model to evaluate.
    /// * `loader` - The evaluation data.
    /// * `mode` - The mode the model runs in while evaluating.
    pub fn evaluate<M: Model>(
        &self,
        model: &mut DynamicModel<M>,
        loader: &mut DataLoader,
        mode: RunMode,
    ) -> Result<f32> {
        let prev = model.mode();
        model.set_mode(mode);
        model.set_training(false);

        let res = self.run_epoch(loader, "evaluation", |batch_u, batch_y| {
            let y_pred = model.forward(batch_u, Some(batch_y))?;
            Ok(self.loss_fn.loss(y_pred.view(), batch_y))
        });

        model.set_mode(prev);
        res
    }

    fn run_epoch<F>(&self, loader: &mut DataLoader, split: &'static str, mut step: F) -> Result<f32>
    where
        F: FnMut(ndarray::ArrayView3<f32>, ndarray::ArrayView3<f32>) -> Result<f32>,
    {
        let mut total = 0.;
        let mut count = 0;

        for batch in loader.epoch() {
            let n = batch.u.len_of(ndarray::Axis(0));
            total += step(batch.u.view(), batch.y.view())? * n as f32;
            count += n;
        }

        if count == 0 {
            return Err(MlErr::EmptyDataset(split));
        }

        Ok(total / count as f32)
    }
}
