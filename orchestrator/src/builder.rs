use machine_learning::{
    arch::{
        activations::ActFn,
        models::{LstmNet, Mlp, Predictor, Tcn, TcnNormalization},
    },
    dynamic::IoConfig,
};

use crate::{
    Result,
    configs::{ActFnConfig, ModelConfig, NormalizationConfig},
};

/// Returns how the inputs and outputs of `config` line up, for `nu` inputs and `ny` outputs.
pub fn io_config(config: &ModelConfig, nu: usize, ny: usize) -> IoConfig {
    IoConfig {
        nu,
        ny,
        ar: config.ar(),
        io_delay: config.io_delay(),
    }
}

/// Builds the predictor described by `config`.
///
/// # Arguments
/// * `config` - The model and its options.
/// * `io` - The layout of the dynamic model the predictor is wrapped in.
/// * `seed` - The seed of the dropout masks.
pub fn build_predictor(config: &ModelConfig, io: IoConfig, seed: u64) -> Result<Predictor> {
    let input_size = io.num_model_inputs();

    let predictor = match config {
        ModelConfig::Mlp(o) => {
            let act_fn = match o.activation_fn {
                ActFnConfig::Sigmoid => ActFn::sigmoid(1.),
                ActFnConfig::Tanh => ActFn::tanh(),
                ActFnConfig::Relu => ActFn::relu(),
            };

            Predictor::Mlp(Mlp::new(
                input_size,
                io.ny,
                o.hidden_size,
                o.max_past_input,
                act_fn,
            )?)
        }
        ModelConfig::Tcn(o) => {
            let normalization = match o.normalization {
                NormalizationConfig::BatchNorm => TcnNormalization::BatchNorm,
                NormalizationConfig::None => TcnNormalization::None,
            };

            Predictor::Tcn(Tcn::new(
                input_size,
                io.ny,
                &o.n_channels,
                o.ksize,
                o.dilation_sizes.as_deref(),
                o.dropout,
                normalization,
                seed,
            )?)
        }
        ModelConfig::Lstm(o) => Predictor::Lstm(LstmNet::new(
            input_size,
            io.ny,
            o.hidden_size,
            o.num_layers,
            o.dropout,
            seed,
        )?),
    };

    Ok(predictor)
}
