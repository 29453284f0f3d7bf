use std::{error::Error, fmt};

use flatbuffers::InvalidFlatbuffer;
use machine_learning::MlErr;

/// The converter's result type.
pub type Result<T> = std::result::Result<T, ConvertErr>;

/// Conversion and loading failures.
#[derive(Debug)]
pub enum ConvertErr {
    /// The model or its parameters are inconsistent.
    Model(MlErr),
    /// A layer can't be expressed with the runtime's builtin operators.
    UnsupportedOperation { layer: String, op: String },
    /// The bytes don't carry the `TFL3` file identifier.
    MissingIdentifier,
    /// The flatbuffer failed structural verification.
    InvalidFlatbuffer(InvalidFlatbuffer),
    /// The flatbuffer is well formed but its contents are inconsistent.
    InvalidModel(String),
}

impl fmt::Display for ConvertErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::UnsupportedOperation { layer, op } => {
                write!(f, "layer {layer}: {op} is not supported by the runtime")
            }
            Self::MissingIdentifier => write!(f, "not a TFLite flatbuffer: missing identifier"),
            Self::InvalidFlatbuffer(e) => write!(f, "invalid flatbuffer: {e}"),
            Self::InvalidModel(msg) => write!(f, "invalid model: {msg}"),
        }
    }
}

impl Error for ConvertErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(e) => Some(e),
            Self::InvalidFlatbuffer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for ConvertErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}

impl From<InvalidFlatbuffer> for ConvertErr {
    fn from(value: InvalidFlatbuffer) -> Self {
        Self::InvalidFlatbuffer(value)
    }
}
