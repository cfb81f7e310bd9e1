use std::{fmt, io};

use machine_learning::MlErr;

/// The result type used in the entire orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Two option layers disagree on the shape of a key, or a key isn't known.
    Merge(MergeError),
    UnknownDataset(String),
    UnknownModel(String),
    /// An option has a value of the wrong type or out of range.
    InvalidConfig(String),
    /// A JSON document couldn't be parsed or produced.
    Json {
        what: String,
        source: serde_json::Error,
    },
    /// Building, running or loading a model failed.
    Model(MlErr),
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge(e) => write!(f, "{e}"),
            Self::UnknownDataset(name) => write!(f, "unknown dataset: {name}"),
            Self::UnknownModel(name) => write!(f, "unknown model: {name}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Json { what, source } => write!(f, "invalid json in {what}: {source}"),
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Merge(e) => Some(e),
            Self::Json { source, .. } => Some(source),
            Self::Model(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MergeError> for OrchestratorError {
    fn from(e: MergeError) -> Self {
        Self::Merge(e)
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Model(e)
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl OrchestratorError {
    pub(crate) fn json(what: impl Into<String>) -> impl FnOnce(serde_json::Error) -> Self {
        let what = what.into();
        move |source| Self::Json { what, source }
    }
}

/// How an option layer conflicts with the options below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A nested group of options is overwritten by a single value.
    ObjectOverwritten,
    /// A single value is overwritten by a nested group of options.
    ScalarOverwritten,
    /// The key has no default value.
    UnknownKey,
}

/// A failed merge of two option layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeError {
    /// The keys leading to the conflict, outermost first.
    pub path: Vec<String>,
    pub kind: ConflictKind,
}

impl MergeError {
    /// Returns the path of the conflict joined by dots, e.g. `train_options.init_lr`.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.dotted_path();
        match self.kind {
            ConflictKind::ObjectOverwritten => {
                write!(f, "conflict at {path}: a group of options can't be set to a value")
            }
            ConflictKind::ScalarOverwritten => {
                write!(f, "conflict at {path}: a value can't be set to a group of options")
            }
            ConflictKind::UnknownKey => write!(f, "default value not found at {path}"),
        }
    }
}

impl std::error::Error for MergeError {}
