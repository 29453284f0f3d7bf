use rand::{SeedableRng, rngs::StdRng};

use converter::{ConvertErr, Converter, INPUT_TENSOR, Optimization, SIGNATURE_KEY, load};
use machine_learning::arch::{Sequential, activations::ActFn, layers::Layer};

/// A small embedder whose second conv kernel (3 * 3 * 16 * 8 = 1152) is large enough
/// to be quantized while the first (3 * 3 * 3 * 16 = 432) is not.
fn embedder() -> Sequential {
    Sequential::new(
        &[12, 12, 3],
        [
            Layer::conv2d(3, 16, (3, 3), Some(ActFn::relu())),
            Layer::max_pool2d((2, 2)),
            Layer::conv2d(16, 8, (3, 3), Some(ActFn::relu6())),
            Layer::flatten(),
            Layer::dense((72, 16), None),
            Layer::l2_normalize(1),
        ],
    )
    .unwrap()
}

fn params(model: &Sequential, seed: u64) -> Vec<f32> {
    model.init_params(StdRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn converted_model_loads_back() -> converter::Result<()> {
    let model = embedder();
    let params = params(&model, 1);

    let bytes = Converter::from_model(&model, &params)
        .description("integration test")
        .convert()?;
    let summary = load(&bytes)?;

    assert_eq!(summary.version, 3);
    assert_eq!(summary.description.as_deref(), Some("integration test"));
    assert_eq!(summary.size_bytes, bytes.len());
    assert_eq!(
        summary.op_names(),
        [
            "CONV_2D",
            "MAX_POOL_2D",
            "CONV_2D",
            "RESHAPE",
            "FULLY_CONNECTED",
            "L2_NORMALIZATION",
        ]
    );

    assert_eq!(summary.inputs.len(), 1);
    assert_eq!(summary.inputs[0].name, INPUT_TENSOR);
    assert_eq!(summary.inputs[0].shape, [1, 12, 12, 3]);
    assert_eq!(summary.inputs[0].dtype, "FLOAT32");
    assert_eq!(summary.outputs[0].shape, [1, 16]);
    assert_eq!(summary.signatures, [SIGNATURE_KEY]);

    Ok(())
}

#[test]
fn default_optimization_quantizes_large_weights() -> converter::Result<()> {
    let model = embedder();
    let params = params(&model, 2);

    let summary = load(&Converter::from_model(&model, &params).convert()?)?;

    // second conv kernel and dense weights (72 * 16 = 1152)
    assert_eq!(summary.int8_tensors, 2);
    assert_eq!(summary.float16_tensors, 0);

    let versions: Vec<_> = summary.operators.iter().map(|op| op.version).collect();
    assert_eq!(versions, [1, 1, 5, 1, 3, 1]);
    assert_eq!(summary.min_runtime_version.as_deref(), Some("2.4.0"));

    Ok(())
}

#[test]
fn quantized_model_is_smaller() -> converter::Result<()> {
    let model = embedder();
    let params = params(&model, 3);
    let converter = Converter::from_model(&model, &params);

    let float = converter.clone().optimization(Optimization::None).convert()?;
    let dynamic = converter.clone().optimization(Optimization::Default).convert()?;
    let half = converter.clone().optimization(Optimization::Float16).convert()?;

    assert!(dynamic.len() < half.len());
    assert!(half.len() < float.len());

    let summary = load(&float)?;
    assert_eq!(summary.int8_tensors, 0);
    assert_eq!(summary.min_runtime_version.as_deref(), Some("1.5.0"));

    Ok(())
}

#[test]
fn float16_prepends_dequantize_ops() -> converter::Result<()> {
    let model = embedder();
    let params = params(&model, 4);

    let bytes = Converter::from_model(&model, &params)
        .optimization(Optimization::Float16)
        .convert()?;
    let summary = load(&bytes)?;

    // three kernels and three biases
    let names = summary.op_names();
    assert_eq!(summary.float16_tensors, 6);
    assert!(names[..6].iter().all(|&op| op == "DEQUANTIZE"));
    assert_eq!(
        names[6..],
        [
            "CONV_2D",
            "MAX_POOL_2D",
            "CONV_2D",
            "RESHAPE",
            "FULLY_CONNECTED",
            "L2_NORMALIZATION",
        ]
    );
    assert_eq!(summary.min_runtime_version.as_deref(), Some("1.15.0"));

    Ok(())
}

#[test]
fn same_params_produce_same_bytes() -> converter::Result<()> {
    let model = embedder();
    let a = params(&model, 5);
    let b = params(&model, 6);

    let first = Converter::from_model(&model, &a).convert()?;
    let again = Converter::from_model(&model, &a).convert()?;
    let other = Converter::from_model(&model, &b).convert()?;

    assert_eq!(first, again);
    assert_ne!(first, other);

    Ok(())
}

#[test]
fn unsupported_normalization_aborts() {
    let model = Sequential::new(&[4, 4, 2], [Layer::l2_normalize(2)]).unwrap();

    let err = Converter::from_model(&model, &[]).convert().unwrap_err();

    assert!(matches!(err, ConvertErr::UnsupportedOperation { .. }));
    assert!(err.to_string().contains("l2_normalize"));
}

#[test]
fn mismatched_params_abort() {
    let model = embedder();
    let params = vec![0.; 10];

    let err = Converter::from_model(&model, &params).convert().unwrap_err();

    assert!(matches!(err, ConvertErr::Model(_)));
}
