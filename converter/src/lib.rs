//! Converts `machine_learning` networks into TensorFlow Lite flatbuffers.

mod convert;
mod error;
pub mod graph;
mod inspect;
mod lower;
mod quantize;
pub mod schema;
mod serialize;

pub use convert::{Converter, DEFAULT_DESCRIPTION};
pub use error::{ConvertErr, Result};
pub use inspect::{ModelSummary, OperatorInfo, TensorInfo, load};
pub use lower::INPUT_TENSOR;
pub use quantize::{MIN_QUANTIZED_ELEMENTS, Optimization, quantize_symmetric};
pub use serialize::{MIN_RUNTIME_VERSION, SIGNATURE_KEY, serialize};
