use ndarray::ArrayD;

use crate::{MlErr, Result};

/// Collapses every non batch axis into one, in row-major order.
#[derive(Clone, Debug, Default)]
pub struct Flatten;

impl Flatten {
    pub fn new() -> Self {
        Self
    }

    pub fn output_shape(&self, input: &[usize]) -> Option<Vec<usize>> {
        if input.is_empty() {
            return None;
        }

        Some(vec![input.iter().product()])
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some((&n, rest)) = x.shape().split_first() else {
            return Err(MlErr::InvalidLayer("can't flatten a scalar".into()));
        };

        let features = rest.iter().product::<usize>();
        let y = x
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((n, features))?;

        Ok(y.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;

    use super::*;

    #[test]
    fn keeps_channel_last_order() {
        let x = Array4::from_shape_vec((2, 1, 2, 2), (0..8).map(|v| v as f32).collect())
            .unwrap()
            .into_dyn();

        let y = Flatten::new().forward(x).unwrap();

        assert_eq!(y.shape(), &[2, 4]);
        assert_eq!(
            y.iter().copied().collect::<Vec<_>>(),
            [0., 1., 2., 3., 4., 5., 6., 7.]
        );
    }
}
