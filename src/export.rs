use std::{
    fs,
    path::{Path, PathBuf},
};

use converter::{Converter, ModelSummary};
use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::{
    config::ExportConfig,
    error::{ExportErr, Result},
    network::facenet,
};

/// The outcome of a successful export.
#[derive(Debug, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub summary: ModelSummary,
}

/// Builds the network, initializes it, converts it and writes the result.
///
/// # Arguments
/// * `config` - Where to write, how to optimize and how to seed the weights.
///
/// # Returns
/// The written path with a summary of the model read back from its bytes, or the
/// first error that occurred.
pub fn export(config: &ExportConfig) -> Result<ExportReport> {
    let model = facenet()?;

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let params = model.init_params(rng)?;

    let bytes = Converter::from_model(&model, &params)
        .optimization(config.optimization)
        .convert()?;
    let summary = converter::load(&bytes)?;

    write_model(&config.output_path, &bytes)?;

    Ok(ExportReport {
        path: config.output_path.clone(),
        summary,
    })
}

/// Writes `bytes` to `path`, creating its parent directories and replacing any
/// previous file.
pub fn write_model(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ExportErr::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!("ensured {} exists", dir.display());
    }

    fs::write(path, bytes).map_err(|source| ExportErr::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
