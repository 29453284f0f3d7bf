use std::{cell::RefCell, rc::Rc};

use ndarray::{ArrayD, ArrayView1, ArrayView2, Ix2};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::activations::ActFn,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
};

/// A fully connected projection from `dim.0` to `dim.1` units.
///
/// Its parameters are laid out as the `[n, m]` weight matrix followed by `m` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,
}

impl Dense {
    /// Creates a new `Dense`.
    ///
    /// # Arguments
    /// * `dim` - The amount of input and output units.
    /// * `act_fn` - An optional activation, `None` keeps the projection linear.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn output_shape(&self, input: &[usize]) -> Option<Vec<usize>> {
        match input {
            &[n] if n == self.dim.0 => Some(vec![self.dim.1]),
            _ => None,
        }
    }

    /// Builds the generators for this layer's parameter blocks: Glorot uniform weights, zero bias.
    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        let (n, m) = self.dim;
        let weights = RandParamGen::glorot_uniform(rng.clone(), n * m, n, m)?;

        Ok(vec![Box::new(weights), Box::new(ConstParamGen::zeros(m))])
    }

    pub fn forward(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix2>()?;
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = x.dot(&w);
        z += &b;

        if let Some(act_fn) = self.act_fn {
            z.par_mapv_inplace(|z| act_fn.f(z));
        }

        Ok(z.into_dyn())
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    pub fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "dense params",
                got: params.len(),
                expected: self.size,
            });
        }

        let (w, b) = params.split_at(self.size - self.dim.1);
        let weights = ArrayView2::from_shape(self.dim, w)?;
        let biases = ArrayView1::from_shape(self.dim.1, b)?;
        Ok((weights, biases))
    }
}
