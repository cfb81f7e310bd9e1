mod dynamic_model;
mod normalizer;
mod signal;

pub use dynamic_model::{DynamicModel, IoConfig};
pub use normalizer::{EPSILON, Normalizer1D};
pub use signal::{delay, window};
