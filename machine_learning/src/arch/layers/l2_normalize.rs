use ndarray::{ArrayD, Axis};

use crate::{MlErr, Result};

/// Lower bound on the squared norm, keeps all-zero inputs at zero instead of NaN.
pub const EPSILON: f32 = 1e-12;

/// Rescales the input to unit Euclidean length along `axis`.
///
/// `axis` counts the batch axis, so `1` is the feature axis of a `[n, features]` batch.
#[derive(Clone, Debug)]
pub struct L2Normalize {
    axis: usize,
}

impl L2Normalize {
    pub fn new(axis: usize) -> Self {
        Self { axis }
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    pub fn output_shape(&self, input: &[usize]) -> Option<Vec<usize>> {
        if self.axis == 0 || self.axis > input.len() {
            return None;
        }

        Some(input.to_vec())
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if self.axis == 0 || self.axis >= x.ndim() {
            return Err(MlErr::IncompatibleLayer {
                layer: 0,
                kind: "l2_normalize",
                input: x.shape().to_vec(),
            });
        }

        let axis = Axis(self.axis);
        let inv_norm = x
            .mapv(|v| v * v)
            .sum_axis(axis)
            .mapv(|s| s.max(EPSILON).sqrt().recip())
            .insert_axis(axis);

        Ok(x * &inv_norm)
    }
}
