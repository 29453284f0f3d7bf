//! In-memory form of a single TFLite subgraph, built by lowering and rewritten by the
//! optimization passes before serialization.

use half::f16;

use crate::schema::{BuiltinOperator, FusedActivation, Padding, TensorType};

/// The contents of a constant tensor.
#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F16(Vec<f16>),
    I32(Vec<i32>),
    I8(Vec<i8>),
}

impl TensorData {
    pub fn dtype(&self) -> TensorType {
        match self {
            Self::F32(_) => TensorType::Float32,
            Self::F16(_) => TensorType::Float16,
            Self::I32(_) => TensorType::Int32,
            Self::I8(_) => TensorType::Int8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw little-endian bytes as stored in the model's buffers.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::F32(v) => bytemuck::cast_slice(v),
            Self::F16(v) => bytemuck::cast_slice(v),
            Self::I32(v) => bytemuck::cast_slice(v),
            Self::I8(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Affine quantization of a tensor: `real = scale * (q - zero_point)`.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantParams {
    pub scale: Vec<f32>,
    pub zero_point: Vec<i64>,
    pub quantized_dimension: i32,
}

#[derive(Clone, Debug)]
pub struct TensorDef {
    pub name: String,
    pub shape: Vec<i32>,
    pub shape_signature: Option<Vec<i32>>,
    pub dtype: TensorType,
    pub data: Option<TensorData>,
    pub quantization: Option<QuantParams>,
}

impl TensorDef {
    /// A float32 activation with a dynamic batch: `shape` is `[1, ..]` and the signature `[-1, ..]`.
    pub fn activation(name: impl Into<String>, sample_shape: &[usize]) -> Self {
        let dims = sample_shape.iter().map(|&d| d as i32);
        let shape = std::iter::once(1).chain(dims.clone()).collect();
        let signature = std::iter::once(-1).chain(dims).collect();

        Self {
            name: name.into(),
            shape,
            shape_signature: Some(signature),
            dtype: TensorType::Float32,
            data: None,
            quantization: None,
        }
    }

    pub fn constant(name: impl Into<String>, shape: Vec<i32>, data: TensorData) -> Self {
        Self {
            name: name.into(),
            shape,
            shape_signature: None,
            dtype: data.dtype(),
            data: Some(data),
            quantization: None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.data.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OpOptions {
    None,
    Conv2d {
        padding: Padding,
        stride_w: i32,
        stride_h: i32,
        activation: FusedActivation,
    },
    Pool2d {
        padding: Padding,
        stride_w: i32,
        stride_h: i32,
        filter_w: i32,
        filter_h: i32,
        activation: FusedActivation,
    },
    FullyConnected {
        activation: FusedActivation,
        keep_num_dims: bool,
    },
    L2Norm {
        activation: FusedActivation,
    },
    Reshape {
        new_shape: Vec<i32>,
    },
}

#[derive(Clone, Debug)]
pub struct OperatorDef {
    pub op: BuiltinOperator,
    pub version: i32,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub options: OpOptions,
}

impl OperatorDef {
    /// Creates a float operator at version 1.
    pub fn new(op: BuiltinOperator, inputs: Vec<usize>, outputs: Vec<usize>, options: OpOptions) -> Self {
        Self {
            op,
            version: 1,
            inputs,
            outputs,
            options,
        }
    }
}

/// A single subgraph: tensors, operators in execution order, and the graph's inputs and outputs.
#[derive(Clone, Debug)]
pub struct Graph {
    pub name: String,
    pub tensors: Vec<TensorDef>,
    pub operators: Vec<OperatorDef>,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tensors: Vec::new(),
            operators: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Appends a tensor and returns its index.
    pub fn add_tensor(&mut self, tensor: TensorDef) -> usize {
        self.tensors.push(tensor);
        self.tensors.len() - 1
    }

    pub fn add_operator(&mut self, op: OperatorDef) {
        self.operators.push(op);
    }

    /// The amount of bytes held by constant tensors.
    pub fn data_len(&self) -> usize {
        self.tensors
            .iter()
            .filter_map(|t| t.data.as_ref())
            .map(|d| d.as_bytes().len())
            .sum()
    }

    /// The first runtime release able to run every operator in the graph.
    pub fn min_runtime_version(&self) -> &'static str {
        self.operators
            .iter()
            .map(|op| op.op.min_runtime_version(op.version))
            .max_by_key(|v| parse_version(v))
            .unwrap_or("1.5.0")
    }
}

fn parse_version(v: &str) -> Vec<u32> {
    v.split('.').filter_map(|p| p.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_has_dynamic_batch() {
        let t = TensorDef::activation("x", &[160, 160, 3]);

        assert_eq!(t.shape, [1, 160, 160, 3]);
        assert_eq!(t.shape_signature.as_deref(), Some(&[-1, 160, 160, 3][..]));
        assert!(!t.is_constant());
    }

    #[test]
    fn data_is_little_endian_bytes() {
        let data = TensorData::I32(vec![-1, 2]);

        assert_eq!(data.as_bytes(), [255, 255, 255, 255, 2, 0, 0, 0]);
        assert_eq!(TensorData::F16(vec![f16::ONE]).as_bytes(), [0x00, 0x3c]);
    }

    #[test]
    fn runtime_version_is_the_highest_required() {
        let mut graph = Graph::new("main");
        graph.add_operator(OperatorDef::new(BuiltinOperator::Reshape, vec![], vec![], OpOptions::None));
        assert_eq!(graph.min_runtime_version(), "1.5.0");

        let mut conv = OperatorDef::new(BuiltinOperator::Conv2d, vec![], vec![], OpOptions::None);
        conv.version = 5;
        graph.add_operator(conv);
        let mut fc = OperatorDef::new(BuiltinOperator::FullyConnected, vec![], vec![], OpOptions::None);
        fc.version = 3;
        graph.add_operator(fc);

        assert_eq!(graph.min_runtime_version(), "2.4.0");
    }
}
