mod activation;
mod batch_norm;
mod conv;
mod dropout;
mod layer;
mod lstm;

pub use activation::Activation;
pub use batch_norm::BatchNorm1d;
pub use conv::Conv1d;
pub use dropout::Dropout;
pub use layer::Layer;
pub use lstm::Lstm;
