//! The subset of the TensorFlow Lite flatbuffer schema (version 3) this crate reads and writes.

pub mod reader;

/// The file identifier every TFLite flatbuffer carries right after the root offset.
pub const FILE_IDENTIFIER: &str = "TFL3";

/// The schema version written to `Model.version`.
pub const SCHEMA_VERSION: u32 = 3;

/// Builtin operator codes as assigned by the TFLite schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BuiltinOperator {
    Conv2d = 3,
    Dequantize = 6,
    FullyConnected = 9,
    L2Normalization = 11,
    Logistic = 14,
    MaxPool2d = 17,
    Reshape = 22,
}

impl BuiltinOperator {
    const ALL: [Self; 7] = [
        Self::Conv2d,
        Self::Dequantize,
        Self::FullyConnected,
        Self::L2Normalization,
        Self::Logistic,
        Self::MaxPool2d,
        Self::Reshape,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Conv2d => "CONV_2D",
            Self::Dequantize => "DEQUANTIZE",
            Self::FullyConnected => "FULLY_CONNECTED",
            Self::L2Normalization => "L2_NORMALIZATION",
            Self::Logistic => "LOGISTIC",
            Self::MaxPool2d => "MAX_POOL_2D",
            Self::Reshape => "RESHAPE",
        }
    }

    /// The first runtime release able to execute this operator at `version`.
    pub fn min_runtime_version(self, version: i32) -> &'static str {
        match (self, version) {
            (Self::Conv2d, 5) => "2.4.0",
            (Self::Conv2d, 2) | (Self::FullyConnected, 3) => "1.14.0",
            (Self::Dequantize, 3) => "1.15.0",
            _ => "1.5.0",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum TensorType {
    Float32 = 0,
    Float16 = 1,
    Int32 = 2,
    Int8 = 9,
}

impl TensorType {
    const ALL: [Self; 4] = [Self::Float32, Self::Float16, Self::Int32, Self::Int8];

    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Float32 => "FLOAT32",
            Self::Float16 => "FLOAT16",
            Self::Int32 => "INT32",
            Self::Int8 => "INT8",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i8)]
pub enum Padding {
    Same = 0,
    Valid = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i8)]
pub enum FusedActivation {
    None = 0,
    Relu = 1,
    Relu6 = 3,
}

/// Tags of the `BuiltinOptions` union.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionsType {
    None = 0,
    Conv2d = 1,
    Pool2d = 5,
    FullyConnected = 8,
    L2Norm = 12,
    Reshape = 17,
}
