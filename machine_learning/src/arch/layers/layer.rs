use std::{cell::RefCell, rc::Rc};

use ndarray::ArrayD;
use rand::Rng;

use super::{Conv2d, Dense, Flatten, L2Normalize, MaxPool2d};
use crate::{Result, arch::activations::ActFn, initialization::ParamGen};

#[derive(Clone, Debug)]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Flatten(Flatten),
    Dense(Dense),
    L2Normalize(L2Normalize),
}

impl Layer {
    pub fn conv2d(
        in_channels: usize,
        filters: usize,
        kernel: (usize, usize),
        act_fn: Option<ActFn>,
    ) -> Self {
        Self::Conv2d(Conv2d::new(in_channels, filters, kernel, act_fn))
    }

    pub fn max_pool2d(pool: (usize, usize)) -> Self {
        Self::MaxPool2d(MaxPool2d::new(pool))
    }

    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn l2_normalize(axis: usize) -> Self {
        Self::L2Normalize(L2Normalize::new(axis))
    }

    /// A short, stable name for the kind of layer, used for naming graph tensors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conv2d(_) => "conv2d",
            Self::MaxPool2d(_) => "max_pooling2d",
            Self::Flatten(_) => "flatten",
            Self::Dense(_) => "dense",
            Self::L2Normalize(_) => "l2_normalize",
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Self::Conv2d(l) => l.size(),
            Self::Dense(l) => l.size(),
            Self::MaxPool2d(_) | Self::Flatten(_) | Self::L2Normalize(_) => 0,
        }
    }

    /// Infers the per-sample output shape of this layer.
    ///
    /// # Arguments
    /// * `input` - The per-sample input shape, without the batch axis.
    ///
    /// # Returns
    /// The output shape or `None` if the layer can't be applied to such an input.
    pub fn output_shape(&self, input: &[usize]) -> Option<Vec<usize>> {
        match self {
            Self::Conv2d(l) => l.output_shape(input),
            Self::MaxPool2d(l) => l.output_shape(input),
            Self::Flatten(l) => l.output_shape(input),
            Self::Dense(l) => l.output_shape(input),
            Self::L2Normalize(l) => l.output_shape(input),
        }
    }

    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        match self {
            Self::Conv2d(l) => l.param_gens(rng),
            Self::Dense(l) => l.param_gens(rng),
            Self::MaxPool2d(_) | Self::Flatten(_) | Self::L2Normalize(_) => Ok(Vec::new()),
        }
    }

    pub fn forward(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Self::Conv2d(l) => l.forward(params, x),
            Self::MaxPool2d(l) => l.forward(x),
            Self::Flatten(l) => l.forward(x),
            Self::Dense(l) => l.forward(params, x),
            Self::L2Normalize(l) => l.forward(x),
        }
    }
}
