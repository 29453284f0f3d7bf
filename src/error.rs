use std::{error::Error, fmt, io, path::PathBuf};

use converter::ConvertErr;
use machine_learning::MlErr;

pub type Result<T> = std::result::Result<T, ExportErr>;

/// All errors that can occur while exporting the model.
#[derive(Debug)]
pub enum ExportErr {
    /// The network couldn't be built or initialized.
    Model(MlErr),
    /// The network couldn't be converted.
    Convert(ConvertErr),
    /// Writing the model failed.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ExportErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::Convert(e) => write!(f, "conversion failed: {e}"),
            Self::Io { path, source } => write!(f, "failed to write {}: {source}", path.display()),
        }
    }
}

impl Error for ExportErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(e) => Some(e),
            Self::Convert(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<MlErr> for ExportErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}

impl From<ConvertErr> for ExportErr {
    fn from(value: ConvertErr) -> Self {
        Self::Convert(value)
    }
}
