use ndarray::{Array4, ArrayD, Ix4, s};

use crate::{MlErr, Result};

/// Max pooling over NHWC inputs with `stride == pool` and valid padding.
#[derive(Clone, Debug)]
pub struct MaxPool2d {
    pool: (usize, usize),
}

impl MaxPool2d {
    pub fn new(pool: (usize, usize)) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> (usize, usize) {
        self.pool
    }

    /// Infers the per-sample output shape for a `[h, w, c]` input.
    pub fn output_shape(&self, input: &[usize]) -> Option<Vec<usize>> {
        let &[h, w, c] = input else {
            return None;
        };

        let (ph, pw) = self.pool;
        if ph == 0 || pw == 0 || h < ph || w < pw {
            return None;
        }

        Some(vec![h / ph, w / pw, c])
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, h, w, c) = x.dim();

        let Some(out) = self.output_shape(&[h, w, c]) else {
            return Err(MlErr::IncompatibleLayer {
                layer: 0,
                kind: "max_pool2d",
                input: vec![h, w, c],
            });
        };

        let (ph, pw) = self.pool;
        let y = Array4::from_shape_fn((n, out[0], out[1], c), |(b, i, j, k)| {
            x.slice(s![b, i * ph..(i + 1) * ph, j * pw..(j + 1) * pw, k])
                .fold(f32::NEG_INFINITY, |m, &v| m.max(v))
        });

        Ok(y.into_dyn())
    }
}
