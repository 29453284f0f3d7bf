use half::f16;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    graph::{Graph, OpOptions, OperatorDef, QuantParams, TensorData, TensorDef},
    schema::{BuiltinOperator, TensorType},
};

/// Weights with fewer elements than this are left in float32 by dynamic range quantization.
pub const MIN_QUANTIZED_ELEMENTS: usize = 1024;

/// The largest magnitude of a symmetric int8 value.
const QMAX: f32 = 127.;

/// The size/latency optimization applied to a graph's constant tensors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimization {
    /// Keep every weight in float32.
    None,
    /// Dynamic range quantization: large weights are stored as int8 and the consuming
    /// operators run in hybrid mode.
    #[default]
    Default,
    /// Store every float weight as float16 and dequantize it when the model is loaded.
    Float16,
}

impl Optimization {
    /// Rewrites `graph` in place.
    pub fn apply(self, graph: &mut Graph) {
        match self {
            Self::None => {}
            Self::Default => dynamic_range(graph),
            Self::Float16 => float16(graph),
        }
    }
}

fn dynamic_range(graph: &mut Graph) {
    let mut quantized = 0;

    for op in graph.operators.iter_mut() {
        let (per_channel, hybrid_version) = match op.op {
            BuiltinOperator::Conv2d => (true, 5),
            BuiltinOperator::FullyConnected => (false, 3),
            _ => continue,
        };

        let Some(&w) = op.inputs.get(1) else {
            continue;
        };

        let tensor = &mut graph.tensors[w];
        let Some(TensorData::F32(values)) = &tensor.data else {
            continue;
        };

        if values.len() < MIN_QUANTIZED_ELEMENTS {
            debug!("keeping {} in float32 ({} elements)", tensor.name, values.len());
            continue;
        }

        let channels = match tensor.shape.first() {
            Some(&c) if per_channel && c > 0 => c as usize,
            _ => 1,
        };

        let (q, scale) = quantize_symmetric(values, channels);
        tensor.data = Some(TensorData::I8(q));
        tensor.dtype = TensorType::Int8;
        tensor.quantization = Some(QuantParams {
            zero_point: vec![0; scale.len()],
            scale,
            quantized_dimension: 0,
        });

        op.version = hybrid_version;
        quantized += 1;
    }

    info!("quantized {quantized} weight tensors to int8");
}

fn float16(graph: &mut Graph) {
    let constants: Vec<usize> = graph
        .tensors
        .iter()
        .enumerate()
        .filter(|(_, t)| matches!(t.data, Some(TensorData::F32(_))))
        .map(|(i, _)| i)
        .collect();

    let mut dequantize = Vec::with_capacity(constants.len());
    for i in constants {
        let Some(TensorData::F32(values)) = graph.tensors[i].data.take() else {
            continue;
        };

        let halves = values.iter().map(|&v| f16::from_f32(v)).collect();
        let tensor = &graph.tensors[i];
        let src = graph.add_tensor(TensorDef::constant(
            format!("{}_fp16", tensor.name),
            tensor.shape.clone(),
            TensorData::F16(halves),
        ));

        let mut op = OperatorDef::new(
            BuiltinOperator::Dequantize,
            vec![src],
            vec![i],
            OpOptions::None,
        );
        op.version = 3;
        dequantize.push(op);
    }

    info!("stored {} weight tensors as float16", dequantize.len());
    graph.operators.splice(0..0, dequantize);
}

/// Symmetric int8 quantization with one scale per channel.
///
/// # Arguments
/// * `values` - The values to quantize, laid out with the channel as the outermost axis.
/// * `channels` - The amount of channels `values` holds.
///
/// # Returns
/// The quantized values and the scale of each channel, `max|v| / 127` or `1` for a
/// channel of zeros.
pub fn quantize_symmetric(values: &[f32], channels: usize) -> (Vec<i8>, Vec<f32>) {
    let chunk = (values.len() / channels.max(1)).max(1);

    let (q, scales): (Vec<Vec<i8>>, Vec<f32>) = values
        .par_chunks(chunk)
        .map(|channel| {
            let max = channel.iter().fold(0f32, |m, v| m.max(v.abs()));
            let scale = if max > 0. { max / QMAX } else { 1. };

            let q = channel
                .iter()
                .map(|v| (v / scale).round().clamp(-QMAX, QMAX) as i8)
                .collect();

            (q, scale)
        })
        .unzip();

    (q.concat(), scales)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn weighted_graph(op: BuiltinOperator, shape: Vec<i32>) -> Graph {
        let len = shape.iter().product::<i32>() as usize;
        let mut rng = StdRng::seed_from_u64(42);
        let values = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();

        let mut graph = Graph::new("main");
        let x = graph.add_tensor(TensorDef::activation("x", &[4]));
        let w = graph.add_tensor(TensorDef::constant("w", shape, TensorData::F32(values)));
        let b = graph.add_tensor(TensorDef::constant(
            "b",
            vec![2],
            TensorData::F32(vec![0.; 2]),
        ));
        let y = graph.add_tensor(TensorDef::activation("y", &[2]));
        graph.add_operator(OperatorDef::new(op, vec![x, w, b], vec![y], OpOptions::None));
        graph
    }

    #[test]
    fn dequantized_values_are_within_half_a_step() {
        let mut rng = StdRng::seed_from_u64(7);
        let values: Vec<f32> = (0..2048).map(|_| rng.random_range(-3.0..3.0)).collect();

        let (q, scales) = quantize_symmetric(&values, 4);

        assert_eq!(q.len(), values.len());
        assert_eq!(scales.len(), 4);
        for (i, (&v, &q)) in values.iter().zip(&q).enumerate() {
            let scale = scales[i / 512];
            assert!((v - q as f32 * scale).abs() <= scale / 2. + 1e-6);
        }
    }

    #[test]
    fn largest_magnitude_maps_to_qmax() {
        let (q, scales) = quantize_symmetric(&[0.5, -2., 1., 4., -1., 2.], 2);

        assert_eq!(scales, [2. / 127., 4. / 127.]);
        assert_eq!(q[1], -127);
        assert_eq!(q[3], 127);
    }

    #[test]
    fn zeros_get_unit_scale() {
        let (q, scales) = quantize_symmetric(&[0.; 8], 1);

        assert_eq!(scales, [1.]);
        assert!(q.iter().all(|&q| q == 0));
    }

    #[test]
    fn conv_weights_are_quantized_per_channel() {
        let mut graph = weighted_graph(BuiltinOperator::Conv2d, vec![2, 3, 3, 64]);

        Optimization::Default.apply(&mut graph);

        let w = &graph.tensors[1];
        assert_eq!(w.dtype, TensorType::Int8);
        assert!(matches!(w.data, Some(TensorData::I8(ref q)) if q.len() == 1152));

        let quant = w.quantization.as_ref().unwrap();
        assert_eq!(quant.scale.len(), 2);
        assert_eq!(quant.zero_point, [0, 0]);
        assert_eq!(quant.quantized_dimension, 0);
        assert_eq!(graph.operators[0].version, 5);

        // biases stay float
        assert_eq!(graph.tensors[2].dtype, TensorType::Float32);
    }

    #[test]
    fn dense_weights_are_quantized_per_tensor() {
        let mut graph = weighted_graph(BuiltinOperator::FullyConnected, vec![2, 1024]);

        Optimization::Default.apply(&mut graph);

        let quant = graph.tensors[1].quantization.as_ref().unwrap();
        assert_eq!(quant.scale.len(), 1);
        assert_eq!(graph.operators[0].version, 3);
    }

    #[test]
    fn small_weights_stay_float() {
        let mut graph = weighted_graph(BuiltinOperator::Conv2d, vec![32, 3, 3, 3]);

        Optimization::Default.apply(&mut graph);

        assert_eq!(graph.tensors[1].dtype, TensorType::Float32);
        assert!(graph.tensors[1].quantization.is_none());
        assert_eq!(graph.operators[0].version, 1);
    }

    #[test]
    fn no_optimization_keeps_the_graph() {
        let mut graph = weighted_graph(BuiltinOperator::Conv2d, vec![2, 3, 3, 64]);

        Optimization::None.apply(&mut graph);

        assert_eq!(graph.tensors[1].dtype, TensorType::Float32);
        assert_eq!(graph.operators.len(), 1);
    }

    #[test]
    fn float16_dequantizes_every_float_constant() {
        let mut graph = weighted_graph(BuiltinOperator::FullyConnected, vec![2, 4]);

        Optimization::Float16.apply(&mut graph);

        let ops: Vec<_> = graph.operators.iter().map(|op| op.op).collect();
        assert_eq!(
            ops,
            [
                BuiltinOperator::Dequantize,
                BuiltinOperator::Dequantize,
                BuiltinOperator::FullyConnected,
            ]
        );

        let dequantize = &graph.operators[0];
        assert_eq!(dequantize.version, 3);
        assert_eq!(dequantize.outputs, [1]);

        let src = &graph.tensors[dequantize.inputs[0]];
        assert_eq!(src.name, "w_fp16");
        assert_eq!(src.dtype, TensorType::Float16);
        assert_eq!(src.shape, [2, 4]);

        assert!(!graph.tensors[1].is_constant());
        assert_eq!(graph.tensors[1].dtype, TensorType::Float32);
    }

    #[test]
    fn optimization_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&Optimization::Float16).unwrap(),
            "\"float16\""
        );
        assert_eq!(Optimization::default(), Optimization::Default);
    }
}
