use serde::Serialize;

use crate::{
    ConvertErr, Result,
    schema::{
        BuiltinOperator, FILE_IDENTIFIER, TensorType,
        reader::{Model, SubGraph},
    },
    serialize::MIN_RUNTIME_VERSION,
};

/// A tensor at the boundary of the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TensorInfo {
    pub name: String,
    pub shape: Vec<i32>,
    pub dtype: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperatorInfo {
    pub op: String,
    pub version: i32,
}

/// What a TFLite flatbuffer holds, as read back from its bytes.
#[derive(Clone, Debug, Serialize)]
pub struct ModelSummary {
    pub version: u32,
    pub description: Option<String>,
    pub size_bytes: usize,
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
    pub operators: Vec<OperatorInfo>,
    pub int8_tensors: usize,
    pub float16_tensors: usize,
    pub metadata: Vec<String>,
    pub signatures: Vec<String>,
    pub min_runtime_version: Option<String>,
}

impl ModelSummary {
    /// The operator names in execution order.
    pub fn op_names(&self) -> Vec<&str> {
        self.operators.iter().map(|op| op.op.as_str()).collect()
    }
}

/// Verifies a TFLite flatbuffer and summarizes its first subgraph.
///
/// # Arguments
/// * `bytes` - The contents of a `.tflite` file.
///
/// # Returns
/// The model's summary or an error if the bytes aren't a well formed TFLite model.
pub fn load(bytes: &[u8]) -> Result<ModelSummary> {
    if bytes.get(4..8) != Some(FILE_IDENTIFIER.as_bytes()) {
        return Err(ConvertErr::MissingIdentifier);
    }

    let model = flatbuffers::root::<Model>(bytes)?;
    let subgraph = model
        .subgraphs()
        .filter(|s| !s.is_empty())
        .map(|s| s.get(0))
        .ok_or_else(|| ConvertErr::InvalidModel("the model has no subgraphs".into()))?;

    let codes: Vec<(i32, i32)> = model
        .operator_codes()
        .map(|codes| codes.iter().map(|c| (c.builtin_code(), c.version())).collect())
        .unwrap_or_default();

    let operators = subgraph
        .operators()
        .map(|ops| {
            ops.iter()
                .map(|op| {
                    let (code, version) = codes
                        .get(op.opcode_index() as usize)
                        .copied()
                        .ok_or_else(|| {
                            ConvertErr::InvalidModel(format!(
                                "opcode index {} out of range",
                                op.opcode_index()
                            ))
                        })?;

                    let op = BuiltinOperator::from_code(code)
                        .map(|op| op.name().to_string())
                        .unwrap_or_else(|| format!("BUILTIN_{code}"));

                    Ok(OperatorInfo { op, version })
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    let types: Vec<i8> = subgraph
        .tensors()
        .map(|ts| ts.iter().map(|t| t.type_()).collect())
        .unwrap_or_default();
    let count = |ty: TensorType| types.iter().filter(|&&t| t == ty.code()).count();

    let metadata: Vec<_> = model
        .metadata()
        .map(|ms| ms.iter().filter_map(|m| m.name()).map(String::from).collect())
        .unwrap_or_default();

    let signatures = model
        .signature_defs()
        .map(|ss| {
            ss.iter()
                .filter_map(|s| s.signature_key())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelSummary {
        version: model.version(),
        description: model.description().map(String::from),
        size_bytes: bytes.len(),
        inputs: tensor_infos(&subgraph, subgraph.inputs())?,
        outputs: tensor_infos(&subgraph, subgraph.outputs())?,
        operators,
        int8_tensors: count(TensorType::Int8),
        float16_tensors: count(TensorType::Float16),
        metadata,
        signatures,
        min_runtime_version: min_runtime_version(&model),
    })
}

fn tensor_infos(
    subgraph: &SubGraph,
    indices: Option<flatbuffers::Vector<'_, i32>>,
) -> Result<Vec<TensorInfo>> {
    let Some(indices) = indices else {
        return Ok(Vec::new());
    };
    let tensors = subgraph
        .tensors()
        .ok_or_else(|| ConvertErr::InvalidModel("the subgraph has no tensors".into()))?;

    indices
        .iter()
        .map(|i| {
            let tensor = usize::try_from(i)
                .ok()
                .filter(|&i| i < tensors.len())
                .map(|i| tensors.get(i))
                .ok_or_else(|| ConvertErr::InvalidModel(format!("tensor {i} out of range")))?;

            let dtype = TensorType::from_code(tensor.type_())
                .map(|ty| ty.name().to_string())
                .unwrap_or_else(|| format!("TYPE_{}", tensor.type_()));

            Ok(TensorInfo {
                name: tensor.name().unwrap_or_default().to_string(),
                shape: tensor.shape().map(|s| s.iter().collect()).unwrap_or_default(),
                dtype,
            })
        })
        .collect()
}

fn min_runtime_version(model: &Model) -> Option<String> {
    let entry = model
        .metadata()?
        .iter()
        .find(|m| m.name() == Some(MIN_RUNTIME_VERSION))?;
    let buffers = model.buffers()?;
    let index = entry.buffer() as usize;
    if index >= buffers.len() {
        return None;
    }

    let data = buffers.get(index).data()?;
    let version = data.bytes().split(|&b| b == 0).next()?;
    String::from_utf8(version.to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_bytes() {
        assert!(matches!(load(b""), Err(ConvertErr::MissingIdentifier)));
        assert!(matches!(
            load(b"\x10\x00\x00\x00ONNX0000"),
            Err(ConvertErr::MissingIdentifier)
        ));
    }

    #[test]
    fn rejects_truncated_flatbuffers() {
        let bytes = b"\xff\xff\x00\x00TFL3";

        assert!(matches!(load(bytes), Err(ConvertErr::InvalidFlatbuffer(_))));
    }
}
