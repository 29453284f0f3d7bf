use machine_learning::arch::{Sequential, activations::ActFn, layers::Layer};

/// Per-sample input shape: a 160x160 RGB image, channels last.
pub const INPUT_SHAPE: [usize; 3] = [160, 160, 3];

/// Dimension of the produced embedding.
pub const EMBEDDING_DIM: usize = 128;

/// Builds the face embedding network.
///
/// Three valid-padded 3x3 convolutions with two 2x2 max pools in between, a linear
/// projection to `EMBEDDING_DIM` features and an L2 normalization over them.
///
/// # Returns
/// The network definition, its parameters are initialized separately.
pub fn facenet() -> machine_learning::Result<Sequential> {
    let [side, _, c] = INPUT_SHAPE;

    // 160 -> 158 -> 79 -> 77 -> 38 -> 36
    let side = ((side - 2) / 2 - 2) / 2 - 2;
    let features = side * side * 64;

    Sequential::new(
        &INPUT_SHAPE,
        [
            Layer::conv2d(c, 32, (3, 3), Some(ActFn::relu())),
            Layer::max_pool2d((2, 2)),
            Layer::conv2d(32, 64, (3, 3), Some(ActFn::relu())),
            Layer::max_pool2d((2, 2)),
            Layer::conv2d(64, 64, (3, 3), Some(ActFn::relu())),
            Layer::flatten(),
            Layer::dense((features, EMBEDDING_DIM), None),
            Layer::l2_normalize(1),
        ],
    )
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, IxDyn};
    use ndarray_rand::{RandomExt, rand_distr::Uniform};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn produces_a_128_dim_embedding() {
        let model = facenet().unwrap();

        assert_eq!(model.input_shape(), INPUT_SHAPE);
        assert_eq!(model.output_shape(), [EMBEDDING_DIM]);
    }

    #[test]
    fn intermediate_shapes() {
        let model = facenet().unwrap();
        let outputs: Vec<_> = (0..model.layers().len())
            .filter_map(|i| model.layer_shapes(i))
            .map(|(_, out)| out.to_vec())
            .collect();

        assert_eq!(
            outputs,
            [
                vec![158, 158, 32],
                vec![79, 79, 32],
                vec![77, 77, 64],
                vec![38, 38, 64],
                vec![36, 36, 64],
                vec![82944],
                vec![128],
                vec![128],
            ]
        );
    }

    #[test]
    fn parameter_count() {
        let model = facenet().unwrap();

        let conv = (3 * 3 * 3 * 32 + 32) + (3 * 3 * 32 * 64 + 64) + (3 * 3 * 64 * 64 + 64);
        let dense = 82944 * 128 + 128;
        assert_eq!(model.size(), conv + dense);
    }

    #[test]
    fn embeddings_are_unit_norm() {
        let model = facenet().unwrap();
        let params = model.init_params(StdRng::seed_from_u64(0)).unwrap();

        let x = Array::random((2, 160, 160, 3), Uniform::new(0f32, 1.).unwrap()).into_dyn();
        let y = model.forward(&params, x).unwrap();

        assert_eq!(y.shape(), [2, EMBEDDING_DIM]);
        for row in y.outer_iter() {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.).abs() < 1e-4, "norm {norm}");
        }
    }

    #[test]
    fn black_image_does_not_produce_nan() {
        let model = facenet().unwrap();
        let params = model.init_params(StdRng::seed_from_u64(1)).unwrap();

        let x = Array::<f32, _>::zeros(IxDyn(&[1, 160, 160, 3]));
        let y = model.forward(&params, x).unwrap();

        // zero biases keep every activation at zero
        assert!(y.iter().all(|&v| v == 0.));
    }
}
