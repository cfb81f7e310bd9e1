mod lstm;
mod mlp;
mod predictor;
mod tcn;

pub use lstm::LstmNet;
pub use mlp::Mlp;
pub use predictor::Predictor;
pub use tcn::{Tcn, TcnNormalization, TemporalBlock};
