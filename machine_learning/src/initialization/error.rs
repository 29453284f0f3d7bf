use std::{error::Error, fmt};

pub type Result<T> = std::result::Result<T, InitErr>;

/// Returned when an initializer can't be built from its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum InitErr {
    /// `low..high` is empty or not finite.
    InvalidRange { low: f32, high: f32 },
    /// Glorot initialization needs at least one input or output unit.
    ZeroFan,
}

impl fmt::Display for InitErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange { low, high } => {
                write!(f, "can't sample uniformly from {low}..{high}")
            }
            Self::ZeroFan => write!(f, "glorot initialization of a layer without units"),
        }
    }
}

impl Error for InitErr {}
