use log::debug;
use machine_learning::arch::{
    Sequential,
    activations::ActFn,
    layers::{Conv2d, Dense, L2Normalize, Layer, MaxPool2d},
};

use crate::{
    ConvertErr, Result,
    graph::{Graph, OpOptions, OperatorDef, TensorData, TensorDef},
    schema::{BuiltinOperator, FusedActivation, Padding},
};

/// Name of the graph's input tensor.
pub const INPUT_TENSOR: &str = "serving_default_input:0";

/// Lowers a `Sequential` and its flat parameter buffer into a float32 TFLite graph.
///
/// # Arguments
/// * `model` - The network definition.
/// * `params` - The model's parameters, laid out as `Sequential::split_params` expects.
///
/// # Returns
/// The lowered graph or an error if a layer has no builtin counterpart.
pub fn lower(model: &Sequential, params: &[f32]) -> Result<Graph> {
    let slices = model.split_params(params)?;
    let mut graph = Graph::new("main");
    let mut names = LayerNames::default();

    let input = graph.add_tensor(TensorDef::activation(INPUT_TENSOR, model.input_shape()));
    graph.inputs.push(input);

    let mut x = input;
    for (i, (layer, params)) in model.layers().iter().zip(slices).enumerate() {
        let (in_shape, out_shape) = model
            .layer_shapes(i)
            .ok_or_else(|| ConvertErr::InvalidModel(format!("layer {i} has no inferred shape")))?;

        let name = names.next(layer.kind());
        let mut lowering = Lowering {
            graph: &mut graph,
            name: &name,
            out_shape,
        };

        x = match layer {
            Layer::Conv2d(l) => lowering.conv2d(l, params, x)?,
            Layer::MaxPool2d(l) => lowering.max_pool2d(l, x),
            Layer::Flatten(_) => lowering.flatten(x),
            Layer::Dense(l) => lowering.dense(l, params, x)?,
            Layer::L2Normalize(l) => lowering.l2_normalize(l, in_shape, x)?,
        };

        debug!("lowered {name} -> {out_shape:?}");
    }

    graph.outputs.push(x);
    Ok(graph)
}

/// Hands out Keras style unique layer names: `conv2d`, `conv2d_1`, ...
#[derive(Default)]
struct LayerNames {
    seen: Vec<(&'static str, usize)>,
}

impl LayerNames {
    fn next(&mut self, kind: &'static str) -> String {
        match self.seen.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => {
                *n += 1;
                format!("{kind}_{n}")
            }
            None => {
                self.seen.push((kind, 0));
                kind.to_string()
            }
        }
    }
}

struct Lowering<'g> {
    graph: &'g mut Graph,
    name: &'g str,
    out_shape: &'g [usize],
}

impl Lowering<'_> {
    fn conv2d(&mut self, conv: &Conv2d, params: &[f32], x: usize) -> Result<usize> {
        let (activation, trailing) = self.activation(conv.act_fn())?;
        let (kernel, bias) = conv.view_params(params)?;
        let (kh, kw) = conv.kernel();

        // HWIO -> OHWI
        let filter: Vec<f32> = kernel.permuted_axes([3, 0, 1, 2]).iter().copied().collect();
        let filter_shape = vec![
            conv.filters() as i32,
            kh as i32,
            kw as i32,
            conv.in_channels() as i32,
        ];

        let name = self.name;
        let w = self.graph.add_tensor(TensorDef::constant(
            format!("{name}/Conv2D"),
            filter_shape,
            TensorData::F32(filter),
        ));
        let b = self.graph.add_tensor(TensorDef::constant(
            format!("{name}/BiasAdd/ReadVariableOp"),
            vec![conv.filters() as i32],
            TensorData::F32(bias.to_vec()),
        ));
        let y = self.output(match activation {
            FusedActivation::Relu => "Relu",
            FusedActivation::Relu6 => "Relu6",
            FusedActivation::None => "BiasAdd",
        });

        self.graph.add_operator(OperatorDef::new(
            BuiltinOperator::Conv2d,
            vec![x, w, b],
            vec![y],
            OpOptions::Conv2d {
                padding: Padding::Valid,
                stride_w: 1,
                stride_h: 1,
                activation,
            },
        ));

        Ok(self.trailing(trailing, y))
    }

    fn max_pool2d(&mut self, pool: &MaxPool2d, x: usize) -> usize {
        let (ph, pw) = pool.pool();
        let y = self.output("MaxPool");

        self.graph.add_operator(OperatorDef::new(
            BuiltinOperator::MaxPool2d,
            vec![x],
            vec![y],
            OpOptions::Pool2d {
                padding: Padding::Valid,
                stride_w: pw as i32,
                stride_h: ph as i32,
                filter_w: pw as i32,
                filter_h: ph as i32,
                activation: FusedActivation::None,
            },
        ));

        y
    }

    fn flatten(&mut self, x: usize) -> usize {
        let new_shape = vec![-1, self.out_shape[0] as i32];
        let name = self.name;

        let shape = self.graph.add_tensor(TensorDef::constant(
            format!("{name}/Const"),
            vec![2],
            TensorData::I32(new_shape.clone()),
        ));
        let y = self.output("Reshape");

        self.graph.add_operator(OperatorDef::new(
            BuiltinOperator::Reshape,
            vec![x, shape],
            vec![y],
            OpOptions::Reshape { new_shape },
        ));

        y
    }

    fn dense(&mut self, dense: &Dense, params: &[f32], x: usize) -> Result<usize> {
        let (activation, trailing) = self.activation(dense.act_fn())?;
        let (w, b) = dense.view_params(params)?;
        let (n, m) = dense.dim();

        // [n, m] -> [m, n]
        let weights: Vec<f32> = w.t().iter().copied().collect();

        let name = self.name;
        let w = self.graph.add_tensor(TensorDef::constant(
            format!("{name}/MatMul"),
            vec![m as i32, n as i32],
            TensorData::F32(weights),
        ));
        let b = self.graph.add_tensor(TensorDef::constant(
            format!("{name}/BiasAdd/ReadVariableOp"),
            vec![m as i32],
            TensorData::F32(b.to_vec()),
        ));
        let y = self.output("BiasAdd");

        self.graph.add_operator(OperatorDef::new(
            BuiltinOperator::FullyConnected,
            vec![x, w, b],
            vec![y],
            OpOptions::FullyConnected {
                activation,
                keep_num_dims: false,
            },
        ));

        Ok(self.trailing(trailing, y))
    }

    fn l2_normalize(&mut self, l2: &L2Normalize, in_shape: &[usize], x: usize) -> Result<usize> {
        // the runtime kernel only normalizes along the innermost axis
        if l2.axis() != in_shape.len() {
            return Err(ConvertErr::UnsupportedOperation {
                layer: self.name.to_string(),
                op: format!(
                    "L2_NORMALIZATION along axis {} of a rank {} tensor",
                    l2.axis(),
                    in_shape.len() + 1
                ),
            });
        }

        let y = self.output("l2_normalize");
        self.graph.add_operator(OperatorDef::new(
            BuiltinOperator::L2Normalization,
            vec![x],
            vec![y],
            OpOptions::L2Norm {
                activation: FusedActivation::None,
            },
        ));

        Ok(y)
    }

    /// Splits an activation into the part fused into the producing op and an optional
    /// standalone operator that has to follow it.
    fn activation(
        &self,
        act_fn: Option<ActFn>,
    ) -> Result<(FusedActivation, Option<BuiltinOperator>)> {
        let unsupported = |op: String| ConvertErr::UnsupportedOperation {
            layer: self.name.to_string(),
            op,
        };

        match act_fn {
            None => Ok((FusedActivation::None, None)),
            Some(ActFn::Relu(relu)) => match relu.max_value() {
                None => Ok((FusedActivation::Relu, None)),
                Some(cap) if cap == 6. => Ok((FusedActivation::Relu6, None)),
                Some(cap) => Err(unsupported(format!("RELU capped at {cap}"))),
            },
            Some(ActFn::Sigmoid(sigmoid)) if sigmoid.amp() == 1. => {
                Ok((FusedActivation::None, Some(BuiltinOperator::Logistic)))
            }
            Some(ActFn::Sigmoid(sigmoid)) => Err(unsupported(format!(
                "LOGISTIC scaled by {}",
                sigmoid.amp()
            ))),
        }
    }

    fn trailing(&mut self, op: Option<BuiltinOperator>, x: usize) -> usize {
        let Some(op) = op else {
            return x;
        };

        let y = self.output(match op {
            BuiltinOperator::Logistic => "Sigmoid",
            other => other.name(),
        });
        self.graph
            .add_operator(OperatorDef::new(op, vec![x], vec![y], OpOptions::None));
        y
    }

    fn output(&mut self, suffix: &str) -> usize {
        let name = format!("{}/{suffix}", self.name);
        self.graph
            .add_tensor(TensorDef::activation(name, self.out_shape))
    }
}
