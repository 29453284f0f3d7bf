use flatbuffers::{FlatBufferBuilder, Push, TableFinishedWIPOffset, VOffsetT, WIPOffset};
use log::debug;

use crate::{
    graph::{Graph, OpOptions, OperatorDef, QuantParams, TensorDef},
    schema::{
        BuiltinOperator, FILE_IDENTIFIER, OptionsType, SCHEMA_VERSION,
        reader::{
            Buffer, Metadata, Model, Operator, OperatorCode, QuantizationParameters,
            SignatureDef, SubGraph, Tensor, TensorMap,
        },
    },
};

/// Name of the metadata entry holding the first runtime release able to run the model.
pub const MIN_RUNTIME_VERSION: &str = "min_runtime_version";

/// Key of the model's only signature.
pub const SIGNATURE_KEY: &str = "serving_default";

const MIN_RUNTIME_VERSION_LEN: usize = 16;

/// Alignment of every buffer payload, as the schema's `force_align` demands.
const BUFFER_ALIGNMENT: usize = 16;

type Offset = WIPOffset<TableFinishedWIPOffset>;

/// Serializes a graph into a TFLite flatbuffer.
///
/// # Arguments
/// * `graph` - The graph to write, already optimized.
/// * `description` - Free text stored as the model's description.
///
/// # Returns
/// The bytes of the model, carrying the `TFL3` file identifier.
pub fn serialize(graph: &Graph, description: &str) -> Vec<u8> {
    let mut fbb = FlatBufferBuilder::with_capacity(graph.data_len() + 4096);

    // buffer 0 is the empty sentinel shared by every non constant tensor
    let mut buffers = vec![buffer(&mut fbb, None)];
    let mut tensor_buffers = vec![0u32; graph.tensors.len()];
    for (i, tensor) in graph.tensors.iter().enumerate() {
        if let Some(data) = &tensor.data {
            tensor_buffers[i] = buffers.len() as u32;
            buffers.push(buffer(&mut fbb, Some(data.as_bytes())));
        }
    }

    let version = graph.min_runtime_version();
    let mut padded = [0u8; MIN_RUNTIME_VERSION_LEN];
    padded[..version.len()].copy_from_slice(version.as_bytes());
    let version_buffer = buffers.len() as u32;
    buffers.push(buffer(&mut fbb, Some(&padded[..])));

    let mut codes: Vec<(BuiltinOperator, i32)> = Vec::new();
    let opcode_indices: Vec<u32> = graph
        .operators
        .iter()
        .map(|op| {
            let key = (op.op, op.version);
            match codes.iter().position(|&c| c == key) {
                Some(i) => i as u32,
                None => {
                    codes.push(key);
                    codes.len() as u32 - 1
                }
            }
        })
        .collect();

    let codes: Vec<_> = codes
        .iter()
        .map(|&(op, version)| operator_code(&mut fbb, op, version))
        .collect();

    let tensors: Vec<_> = graph
        .tensors
        .iter()
        .zip(&tensor_buffers)
        .map(|(tensor, &buffer)| tensor_table(&mut fbb, tensor, buffer))
        .collect();

    let operators: Vec<_> = graph
        .operators
        .iter()
        .zip(&opcode_indices)
        .map(|(op, &index)| operator(&mut fbb, op, index))
        .collect();

    let subgraph = subgraph(&mut fbb, graph, &tensors, &operators);
    let signature = signature_def(&mut fbb, graph);
    let metadata = metadata(&mut fbb, MIN_RUNTIME_VERSION, version_buffer);

    let codes = fbb.create_vector(&codes);
    let subgraphs = fbb.create_vector(&[subgraph]);
    let description = fbb.create_string(description);
    let buffers = fbb.create_vector(&buffers);
    let metadata = fbb.create_vector(&[metadata]);
    let signatures = fbb.create_vector(&[signature]);

    let start = fbb.start_table();
    fbb.push_slot::<u32>(Model::VT_VERSION, SCHEMA_VERSION, 0);
    fbb.push_slot_always(Model::VT_OPERATOR_CODES, codes);
    fbb.push_slot_always(Model::VT_SUBGRAPHS, subgraphs);
    fbb.push_slot_always(Model::VT_DESCRIPTION, description);
    fbb.push_slot_always(Model::VT_BUFFERS, buffers);
    fbb.push_slot_always(Model::VT_METADATA, metadata);
    fbb.push_slot_always(Model::VT_SIGNATURE_DEFS, signatures);
    let model = fbb.end_table(start);

    fbb.finish(model, Some(FILE_IDENTIFIER));

    let bytes = fbb.finished_data().to_vec();
    debug!(
        "serialized {} tensors, {} operators into {} bytes (runtime {version})",
        graph.tensors.len(),
        graph.operators.len(),
        bytes.len()
    );
    bytes
}

/// Zero sized value whose only effect on the builder is raising its alignment.
#[repr(align(16))]
struct Align16;

impl Push for Align16 {
    type Output = Align16;

    unsafe fn push(&self, _dst: &mut [u8], _written_len: usize) {}
}

/// Pads the builder so that a vector of `len` bytes created next starts on a
/// `BUFFER_ALIGNMENT` boundary of the finished file.
fn align_payload(fbb: &mut FlatBufferBuilder, len: usize) {
    // the finished file is then padded to a multiple of 16 as well
    fbb.push(Align16);

    let used = fbb.unfinished_data().len();
    let padding = (BUFFER_ALIGNMENT - (used + len) % BUFFER_ALIGNMENT) % BUFFER_ALIGNMENT;
    for _ in 0..padding {
        fbb.push(0u8);
    }
}

fn buffer(fbb: &mut FlatBufferBuilder, data: Option<&[u8]>) -> Offset {
    let data = data.map(|d| {
        align_payload(fbb, d.len());
        fbb.create_vector(d)
    });

    let start = fbb.start_table();
    if let Some(data) = data {
        fbb.push_slot_always(Buffer::VT_DATA, data);
    }
    fbb.end_table(start)
}

fn operator_code(fbb: &mut FlatBufferBuilder, op: BuiltinOperator, version: i32) -> Offset {
    // codes past 127 only fit the extended field
    let deprecated = op.code().min(127) as i8;

    let start = fbb.start_table();
    fbb.push_slot::<i8>(OperatorCode::VT_DEPRECATED_BUILTIN_CODE, deprecated, 0);
    fbb.push_slot::<i32>(OperatorCode::VT_VERSION, version, 1);
    fbb.push_slot::<i32>(OperatorCode::VT_BUILTIN_CODE, op.code(), 0);
    fbb.end_table(start)
}

fn tensor_table(fbb: &mut FlatBufferBuilder, tensor: &TensorDef, buffer: u32) -> Offset {
    let shape = fbb.create_vector(&tensor.shape);
    let name = fbb.create_string(&tensor.name);
    let quantization = tensor
        .quantization
        .as_ref()
        .map(|q| quantization(fbb, q));
    let signature = tensor
        .shape_signature
        .as_ref()
        .map(|s| fbb.create_vector(s));

    let start = fbb.start_table();
    fbb.push_slot_always(Tensor::VT_SHAPE, shape);
    fbb.push_slot::<i8>(Tensor::VT_TYPE, tensor.dtype.code(), 0);
    fbb.push_slot::<u32>(Tensor::VT_BUFFER, buffer, 0);
    fbb.push_slot_always(Tensor::VT_NAME, name);
    if let Some(quantization) = quantization {
        fbb.push_slot_always(Tensor::VT_QUANTIZATION, quantization);
    }
    if let Some(signature) = signature {
        fbb.push_slot_always(Tensor::VT_SHAPE_SIGNATURE, signature);
    }
    fbb.end_table(start)
}

fn quantization(fbb: &mut FlatBufferBuilder, q: &QuantParams) -> Offset {
    let scale = fbb.create_vector(&q.scale);
    let zero_point = fbb.create_vector(&q.zero_point);

    let start = fbb.start_table();
    fbb.push_slot_always(QuantizationParameters::VT_SCALE, scale);
    fbb.push_slot_always(QuantizationParameters::VT_ZERO_POINT, zero_point);
    fbb.push_slot::<i32>(
        QuantizationParameters::VT_QUANTIZED_DIMENSION,
        q.quantized_dimension,
        0,
    );
    fbb.end_table(start)
}

fn operator(fbb: &mut FlatBufferBuilder, op: &OperatorDef, opcode_index: u32) -> Offset {
    let inputs: Vec<i32> = op.inputs.iter().map(|&i| i as i32).collect();
    let outputs: Vec<i32> = op.outputs.iter().map(|&i| i as i32).collect();
    let inputs = fbb.create_vector(&inputs);
    let outputs = fbb.create_vector(&outputs);
    let options = builtin_options(fbb, &op.options);

    let start = fbb.start_table();
    fbb.push_slot::<u32>(Operator::VT_OPCODE_INDEX, opcode_index, 0);
    fbb.push_slot_always(Operator::VT_INPUTS, inputs);
    fbb.push_slot_always(Operator::VT_OUTPUTS, outputs);
    if let Some((tag, options)) = options {
        fbb.push_slot::<u8>(Operator::VT_BUILTIN_OPTIONS_TYPE, tag as u8, 0);
        fbb.push_slot_always(Operator::VT_BUILTIN_OPTIONS, options);
    }
    fbb.end_table(start)
}

/// The vtable slot of the `i`th field of a table.
const fn field(i: VOffsetT) -> VOffsetT {
    4 + 2 * i
}

fn builtin_options(
    fbb: &mut FlatBufferBuilder,
    options: &OpOptions,
) -> Option<(OptionsType, Offset)> {
    let options = match options {
        OpOptions::None => return None,
        OpOptions::Conv2d {
            padding,
            stride_w,
            stride_h,
            activation,
        } => {
            let start = fbb.start_table();
            fbb.push_slot::<i8>(field(0), *padding as i8, 0);
            fbb.push_slot::<i32>(field(1), *stride_w, 0);
            fbb.push_slot::<i32>(field(2), *stride_h, 0);
            fbb.push_slot::<i8>(field(3), *activation as i8, 0);
            (OptionsType::Conv2d, fbb.end_table(start))
        }
        OpOptions::Pool2d {
            padding,
            stride_w,
            stride_h,
            filter_w,
            filter_h,
            activation,
        } => {
            let start = fbb.start_table();
            fbb.push_slot::<i8>(field(0), *padding as i8, 0);
            fbb.push_slot::<i32>(field(1), *stride_w, 0);
            fbb.push_slot::<i32>(field(2), *stride_h, 0);
            fbb.push_slot::<i32>(field(3), *filter_w, 0);
            fbb.push_slot::<i32>(field(4), *filter_h, 0);
            fbb.push_slot::<i8>(field(5), *activation as i8, 0);
            (OptionsType::Pool2d, fbb.end_table(start))
        }
        OpOptions::FullyConnected {
            activation,
            keep_num_dims,
        } => {
            let start = fbb.start_table();
            fbb.push_slot::<i8>(field(0), *activation as i8, 0);
            fbb.push_slot::<bool>(field(2), *keep_num_dims, false);
            (OptionsType::FullyConnected, fbb.end_table(start))
        }
        OpOptions::L2Norm { activation } => {
            let start = fbb.start_table();
            fbb.push_slot::<i8>(field(0), *activation as i8, 0);
            (OptionsType::L2Norm, fbb.end_table(start))
        }
        OpOptions::Reshape { new_shape } => {
            let new_shape = fbb.create_vector(new_shape);
            let start = fbb.start_table();
            fbb.push_slot_always(field(0), new_shape);
            (OptionsType::Reshape, fbb.end_table(start))
        }
    };

    Some(options)
}

fn subgraph(
    fbb: &mut FlatBufferBuilder,
    graph: &Graph,
    tensors: &[Offset],
    operators: &[Offset],
) -> Offset {
    let inputs: Vec<i32> = graph.inputs.iter().map(|&i| i as i32).collect();
    let outputs: Vec<i32> = graph.outputs.iter().map(|&i| i as i32).collect();

    let tensors = fbb.create_vector(tensors);
    let inputs = fbb.create_vector(&inputs);
    let outputs = fbb.create_vector(&outputs);
    let operators = fbb.create_vector(operators);
    let name = fbb.create_string(&graph.name);

    let start = fbb.start_table();
    fbb.push_slot_always(SubGraph::VT_TENSORS, tensors);
    fbb.push_slot_always(SubGraph::VT_INPUTS, inputs);
    fbb.push_slot_always(SubGraph::VT_OUTPUTS, outputs);
    fbb.push_slot_always(SubGraph::VT_OPERATORS, operators);
    fbb.push_slot_always(SubGraph::VT_NAME, name);
    fbb.end_table(start)
}

/// The `serving_default` signature: inputs are keyed `input`, `input_1`, ... and
/// outputs `output_0`, `output_1`, ...
fn signature_def(fbb: &mut FlatBufferBuilder, graph: &Graph) -> Offset {
    let inputs: Vec<_> = graph
        .inputs
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let name = match i {
                0 => "input".to_string(),
                i => format!("input_{i}"),
            };
            tensor_map(fbb, &name, t)
        })
        .collect();
    let outputs: Vec<_> = graph
        .outputs
        .iter()
        .enumerate()
        .map(|(i, &t)| tensor_map(fbb, &format!("output_{i}"), t))
        .collect();

    let inputs = fbb.create_vector(&inputs);
    let outputs = fbb.create_vector(&outputs);
    let key = fbb.create_string(SIGNATURE_KEY);

    let start = fbb.start_table();
    fbb.push_slot_always(SignatureDef::VT_INPUTS, inputs);
    fbb.push_slot_always(SignatureDef::VT_OUTPUTS, outputs);
    fbb.push_slot_always(SignatureDef::VT_SIGNATURE_KEY, key);
    fbb.end_table(start)
}

fn tensor_map(fbb: &mut FlatBufferBuilder, name: &str, tensor: usize) -> Offset {
    let name = fbb.create_string(name);

    let start = fbb.start_table();
    fbb.push_slot_always(TensorMap::VT_NAME, name);
    fbb.push_slot::<u32>(TensorMap::VT_TENSOR_INDEX, tensor as u32, 0);
    fbb.end_table(start)
}

fn metadata(fbb: &mut FlatBufferBuilder, name: &str, buffer: u32) -> Offset {
    let name = fbb.create_string(name);

    let start = fbb.start_table();
    fbb.push_slot_always(Metadata::VT_NAME, name);
    fbb.push_slot::<u32>(Metadata::VT_BUFFER, buffer, 0);
    fbb.end_table(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::TensorData,
        schema::{FusedActivation, Padding, TensorType},
    };

    fn graph() -> Graph {
        let mut graph = Graph::new("main");
        let x = graph.add_tensor(TensorDef::activation("x", &[4, 4, 1]));
        let w = graph.add_tensor(TensorDef::constant(
            "w",
            vec![1, 1, 1, 1],
            TensorData::F32(vec![2.]),
        ));
        let b = graph.add_tensor(TensorDef::constant(
            "b",
            vec![1],
            TensorData::F32(vec![0.5]),
        ));
        let y = graph.add_tensor(TensorDef::activation("y", &[4, 4, 1]));
        let z = graph.add_tensor(TensorDef::activation("z", &[2, 2, 1]));

        graph.add_operator(OperatorDef::new(
            BuiltinOperator::Conv2d,
            vec![x, w, b],
            vec![y],
            OpOptions::Conv2d {
                padding: Padding::Valid,
                stride_w: 1,
                stride_h: 1,
                activation: FusedActivation::Relu,
            },
        ));
        graph.add_operator(OperatorDef::new(
            BuiltinOperator::MaxPool2d,
            vec![y],
            vec![z],
            OpOptions::Pool2d {
                padding: Padding::Valid,
                stride_w: 2,
                stride_h: 2,
                filter_w: 2,
                filter_h: 2,
                activation: FusedActivation::None,
            },
        ));
        graph.inputs.push(x);
        graph.outputs.push(z);
        graph
    }

    #[test]
    fn carries_the_file_identifier() {
        let bytes = serialize(&graph(), "test");

        assert_eq!(&bytes[4..8], FILE_IDENTIFIER.as_bytes());
        assert!(flatbuffers::root::<Model>(&bytes).is_ok());
    }

    #[test]
    fn constants_get_their_own_buffers() {
        let bytes = serialize(&graph(), "test");
        let model = flatbuffers::root::<Model>(&bytes).unwrap();

        let buffers = model.buffers().unwrap();
        assert!(buffers.get(0).data().is_none());

        let tensors = model.subgraphs().unwrap().get(0).tensors().unwrap();
        let w = tensors.get(1);
        assert_eq!(w.buffer(), 1);
        assert_eq!(w.type_(), TensorType::Float32.code());
        assert_eq!(buffers.get(1).data().unwrap().bytes(), 2f32.to_le_bytes());

        // activations point at the sentinel
        assert_eq!(tensors.get(0).buffer(), 0);
        assert_eq!(
            tensors.get(0).shape_signature().unwrap().iter().collect::<Vec<_>>(),
            [-1, 4, 4, 1]
        );
    }

    #[test]
    fn buffer_payloads_are_16_byte_aligned() {
        let mut graph = graph();
        graph.add_tensor(TensorDef::constant("odd", vec![3], TensorData::I8(vec![1, 2, 3])));
        graph.add_tensor(TensorDef::constant(
            "wide",
            vec![5],
            TensorData::F32(vec![1.; 5]),
        ));

        let bytes = serialize(&graph, "test");
        let model = flatbuffers::root::<Model>(&bytes).unwrap();

        let offsets: Vec<_> = model
            .buffers()
            .unwrap()
            .iter()
            .filter_map(|b| b.data())
            .map(|d| d.bytes().as_ptr() as usize - bytes.as_ptr() as usize)
            .collect();

        assert_eq!(offsets.len(), 5);
        assert!(offsets.iter().all(|o| o % BUFFER_ALIGNMENT == 0), "{offsets:?}");
        assert_eq!(bytes.len() % BUFFER_ALIGNMENT, 0);
    }

    #[test]
    fn writes_model_metadata() {
        let bytes = serialize(&graph(), "unit test model");
        let model = flatbuffers::root::<Model>(&bytes).unwrap();

        assert_eq!(model.version(), SCHEMA_VERSION);
        assert_eq!(model.description(), Some("unit test model"));

        let metadata = model.metadata().unwrap().get(0);
        assert_eq!(metadata.name(), Some(MIN_RUNTIME_VERSION));
        let version = model
            .buffers()
            .unwrap()
            .get(metadata.buffer() as usize)
            .data()
            .unwrap();
        assert_eq!(version.len(), MIN_RUNTIME_VERSION_LEN);
        assert!(version.bytes().starts_with(b"1.5.0\0"));

        let signature = model.signature_defs().unwrap().get(0);
        assert_eq!(signature.signature_key(), Some(SIGNATURE_KEY));
        assert_eq!(signature.inputs().unwrap().get(0).name(), Some("input"));
        assert_eq!(signature.outputs().unwrap().get(0).name(), Some("output_0"));
        assert_eq!(signature.outputs().unwrap().get(0).tensor_index(), 4);
    }

    #[test]
    fn deduplicates_operator_codes() {
        let mut graph = graph();
        let op = graph.operators[1].clone();
        graph.add_operator(op);
        let mut hybrid = graph.operators[0].clone();
        hybrid.version = 5;
        graph.add_operator(hybrid);

        let bytes = serialize(&graph, "test");
        let model = flatbuffers::root::<Model>(&bytes).unwrap();

        let codes: Vec<_> = model
            .operator_codes()
            .unwrap()
            .iter()
            .map(|c| (c.builtin_code(), c.version()))
            .collect();
        assert_eq!(codes, [(3, 1), (17, 1), (3, 5)]);

        let indices: Vec<_> = model
            .subgraphs()
            .unwrap()
            .get(0)
            .operators()
            .unwrap()
            .iter()
            .map(|op| op.opcode_index())
            .collect();
        assert_eq!(indices, [0, 1, 1, 2]);
    }

    #[test]
    fn tags_operator_options() {
        let bytes = serialize(&graph(), "test");
        let model = flatbuffers::root::<Model>(&bytes).unwrap();
        let operators = model.subgraphs().unwrap().get(0).operators().unwrap();

        assert_eq!(operators.get(0).builtin_options_type(), OptionsType::Conv2d as u8);
        assert_eq!(operators.get(1).builtin_options_type(), OptionsType::Pool2d as u8);
    }
}
