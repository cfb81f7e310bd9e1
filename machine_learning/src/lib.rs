pub mod arch;
pub mod dataset;
pub mod dynamic;
pub mod error;
pub mod optimization;
pub mod training;

pub use error::{MlErr, Result};
