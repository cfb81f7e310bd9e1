pub mod activations;
pub mod layers;
pub mod loss;
pub mod models;
mod model;
mod params;
mod sequential;

pub use model::{Model, RunMode};
pub use params::{BackIter, FrontIter};
pub use sequential::Sequential;
