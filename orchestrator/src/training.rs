use std::path::Path;

use log::{debug, info};
use machine_learning::{
    arch::{RunMode, loss::Mse},
    training::Trainer,
};

use crate::{
    OrchestratorError, Result,
    configs::TrainOptions,
    loader::Loaders,
    model_state::{BEST_MODEL, FINAL_MODEL, ModelState},
};

/// What a finished training run achieved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    /// The epoch training stopped at.
    pub epoch: usize,
    /// The epoch with the lowest validation loss.
    pub best_epoch: usize,
    pub best_valid_loss: f32,
    pub test_loss_one_step_ahead: f32,
    pub test_loss_free_run: f32,
}

/// Lowers the learning rate once the validation loss stops improving.
#[derive(Debug)]
struct Plateau {
    patience: usize,
    factor: f32,
    best: f32,
    stale: usize,
}

impl Plateau {
    fn new(patience: usize, factor: f32) -> Self {
        Self {
            patience,
            factor,
            best: f32::INFINITY,
            stale: 0,
        }
    }

    /// Records the loss of an epoch, returning the new learning rate if it has to change.
    fn step(&mut self, loss: f32, lr: f32) -> Option<f32> {
        if loss < self.best {
            self.best = loss;
            self.stale = 0;
            return None;
        }

        self.stale += 1;
        if self.stale <= self.patience {
            return None;
        }

        self.stale = 0;
        Some(lr / self.factor)
    }
}

/// Trains the model of `state` until it stops improving.
///
/// Every epoch takes one optimization step per training batch and measures the validation
/// loss in `options.training_mode`. The model with the lowest validation loss is saved to
/// `best_model.json` under `run_path`, and the model at the end to `final_model.json`. Finally
/// the best model is restored and tested in both run modes.
///
/// # Arguments
/// * `start_epoch` - The epoch to continue from, the one of the restored checkpoint if any.
/// * `state` - The model and its optimizer.
/// * `run_path` - The directory of the run.
/// * `loaders` - The data of the run.
/// * `options` - The training options.
pub fn run_train(
    start_epoch: usize,
    state: &mut ModelState,
    run_path: &Path,
    loaders: &mut Loaders,
    options: &TrainOptions,
) -> Result<TrainReport> {
    if options.lr_scheduler_factor <= 1. {
        return Err(OrchestratorError::InvalidConfig(format!(
            "lr_scheduler_factor must be greater than 1, got {}",
            options.lr_scheduler_factor
        )));
    }

    let trainer = Trainer::new(Mse);
    let mut scheduler = Plateau::new(options.lr_scheduler_nepochs, options.lr_scheduler_factor);
    let best_path = run_path.join(BEST_MODEL);

    state.optimizer.set_learning_rate(options.init_lr);
    let mut best_epoch = start_epoch;
    let mut best_valid_loss = f32::INFINITY;
    let mut epoch = start_epoch;

    while epoch < options.epochs {
        let train_loss = trainer.train_epoch(
            &mut state.model,
            state.optimizer.as_mut(),
            &mut loaders.train,
        )?;
        let valid_loss =
            trainer.evaluate(&mut state.model, &mut loaders.valid, options.training_mode)?;
        epoch += 1;

        if valid_loss < best_valid_loss {
            best_valid_loss = valid_loss;
            best_epoch = epoch;
            state.save_model(epoch, &best_path)?;
            debug!(epoch = epoch, valid_loss = valid_loss; "best model saved");
        }

        if options.log_interval > 0 && epoch % options.log_interval == 0 {
            info!(
                epoch = epoch,
                train_loss = train_loss,
                valid_loss = valid_loss,
                lr = state.optimizer.learning_rate();
                "epoch done"
            );
        }

        let lr = state.optimizer.learning_rate();
        if let Some(lr) = scheduler.step(valid_loss, lr) {
            info!(epoch = epoch, lr = lr; "validation loss stopped improving");
            if lr < options.min_lr {
                info!(min_lr = options.min_lr; "learning rate below its minimum, stopping");
                break;
            }
            state.optimizer.set_learning_rate(lr);
        }
    }

    state.save_model(epoch, &run_path.join(FINAL_MODEL))?;
    if best_path.exists() {
        state.load_model(&best_path)?;
    }

    let test_loss_one_step_ahead =
        trainer.evaluate(&mut state.model, &mut loaders.test, RunMode::OneStepAhead)?;
    let test_loss_free_run =
        trainer.evaluate(&mut state.model, &mut loaders.test, RunMode::FreeRunSimulation)?;

    info!(
        best_epoch = best_epoch,
        best_valid_loss = best_valid_loss,
        test_loss_one_step_ahead = test_loss_one_step_ahead,
        test_loss_free_run = test_loss_free_run;
        "training finished"
    );

    Ok(TrainReport {
        epoch,
        best_epoch,
        best_valid_loss,
        test_loss_one_step_ahead,
        test_loss_free_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plateau_waits_for_the_patience_to_run_out() {
        let mut plateau = Plateau::new(2, 2.);

        assert_eq!(plateau.step(1., 1.), None);
        assert_eq!(plateau.step(1., 1.), None);
        assert_eq!(plateau.step(2., 1.), None);
        assert_eq!(plateau.step(1., 1.), Some(0.5));
        assert_eq!(plateau.step(0.5, 0.5), None);
    }
}
