use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    MissingOutputHistory,
    InvalidOption(String),
    EmptyDataset(&'static str),
    Parse {
        file: String,
        line: usize,
        msg: String,
    },
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch for {what}, got {got} and expected {expected}")
            }
            MlErr::Shape(e) => format!("Failed to view an array with the requested shape: {e}"),
            MlErr::MissingOutputHistory => {
                "An autoregressive model needs the output history to make a prediction".to_string()
            }
            MlErr::InvalidOption(msg) => format!("Invalid option: {msg}"),
            MlErr::EmptyDataset(split) => format!("The {split} dataset has no sequences"),
            MlErr::Parse { file, line, msg } => format!("{file}, line {line}: {msg}"),
            MlErr::Io(e) => format!("I/O error: {e}"),
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(e: ShapeError) -> Self {
        Self::Shape(e)
    }
}

impl From<io::Error> for MlErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
