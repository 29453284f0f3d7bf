use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

use crate::initialization::InitErr;

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
    IncompatibleLayer {
        layer: usize,
        kind: &'static str,
        input: Vec<usize>,
    },
    InvalidLayer(String),
    Init(InitErr),
    Shape(ShapeError),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::IncompatibleLayer { layer, kind, input } => write!(
                f,
                "Layer {layer} ({kind}) can't be applied to an input of shape {input:?}"
            ),
            MlErr::InvalidLayer(msg) => write!(f, "Invalid layer: {msg}"),
            MlErr::Init(e) => write!(f, "Failed to initialize the parameters: {e}"),
            MlErr::Shape(e) => write!(f, "Array shape error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Init(e) => Some(e),
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InitErr> for MlErr {
    fn from(value: InitErr) -> Self {
        Self::Init(value)
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
