//! Exports an untrained face embedding network as a TensorFlow Lite model.

pub mod config;
pub mod error;
pub mod export;
pub mod network;

pub use config::{DEFAULT_OUTPUT_PATH, ExportConfig};
pub use error::{ExportErr, Result};
pub use export::{ExportReport, export, write_model};
pub use network::{EMBEDDING_DIM, INPUT_SHAPE, facenet};
