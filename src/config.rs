use std::path::PathBuf;

use converter::Optimization;
use serde::{Deserialize, Serialize};

/// Where the model is written unless told otherwise.
pub const DEFAULT_OUTPUT_PATH: &str = "assets/facenet_model.tflite";

/// Everything a single export run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExportConfig {
    pub output_path: PathBuf,
    pub optimization: Optimization,
    /// Seeds parameter initialization, `None` draws fresh weights on every run.
    pub seed: Option<u64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            optimization: Optimization::default(),
            seed: None,
        }
    }
}
