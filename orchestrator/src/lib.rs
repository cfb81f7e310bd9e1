//! Option handling, model assembly and training of dynamic system identification runs.

pub mod builder;
pub mod cli;
pub mod configs;
pub mod error;
pub mod loader;
pub mod logger;
pub mod model_state;
pub mod normalizers;
mod session;
pub mod training;

pub use error::{ConflictKind, MergeError, OrchestratorError, Result};
pub use session::{OPTIONS_FILE, Outcome, Session, get_run_path, run};
