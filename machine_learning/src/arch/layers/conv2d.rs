use std::{cell::RefCell, rc::Rc};

use ndarray::{Array2, ArrayD, ArrayView1, ArrayView4, Ix4, s};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::activations::ActFn,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
};

/// A 2D convolution over NHWC inputs with stride 1 and valid padding.
///
/// Its parameters are laid out as the kernel in HWIO order, `[kh, kw, in_channels, filters]`,
/// followed by one bias per filter.
#[derive(Clone, Debug)]
pub struct Conv2d {
    in_channels: usize,
    filters: usize,
    kernel: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of channels of the input feature map.
    /// * `filters` - The amount of output channels.
    /// * `kernel` - The height and width of the kernel.
    /// * `act_fn` - An optional activation applied after the bias.
    ///
    /// # Returns
    /// A new `Conv2d` instance.
    pub fn new(
        in_channels: usize,
        filters: usize,
        kernel: (usize, usize),
        act_fn: Option<ActFn>,
    ) -> Self {
        let (kh, kw) = kernel;

        Self {
            in_channels,
            filters,
            kernel,
            act_fn,
            size: kh * kw * in_channels * filters + filters,
        }
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn filters(&self) -> usize {
        self.filters
    }

    pub fn kernel(&self) -> (usize, usize) {
        self.kernel
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Infers the per-sample output shape for a `[h, w, c]` input.
    pub fn output_shape(&self, input: &[usize]) -> Option<Vec<usize>> {
        let &[h, w, c] = input else {
            return None;
        };

        let (kh, kw) = self.kernel;
        if c != self.in_channels || h < kh || w < kw {
            return None;
        }

        Some(vec![h - kh + 1, w - kw + 1, self.filters])
    }

    /// Builds the generators for this layer's parameter blocks: Glorot uniform kernel, zero bias.
    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        let (kh, kw) = self.kernel;
        let receptive_field = kh * kw;
        let kernel_size = self.size - self.filters;

        let kernel = RandParamGen::glorot_uniform(
            rng.clone(),
            kernel_size,
            receptive_field * self.in_channels,
            receptive_field * self.filters,
        )?;

        Ok(vec![
            Box::new(kernel),
            Box::new(ConstParamGen::zeros(self.filters)),
        ])
    }

    /// Cross-correlates the kernel over the input via im2col and a single matrix product.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the flat parameter buffer.
    /// * `x` - A batch of shape `[n, h, w, in_channels]`.
    ///
    /// # Returns
    /// A batch of shape `[n, h - kh + 1, w - kw + 1, filters]` or an error if the input is invalid.
    pub fn forward(&self, params: &[f32], x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, h, w, c) = x.dim();

        let Some(out) = self.output_shape(&[h, w, c]) else {
            return Err(MlErr::IncompatibleLayer {
                layer: 0,
                kind: "conv2d",
                input: vec![h, w, c],
            });
        };

        let (oh, ow) = (out[0], out[1]);
        let (kh, kw) = self.kernel;
        let (kernel, bias) = self.view_params(params)?;
        let kernel = kernel.into_shape_with_order((kh * kw * c, self.filters))?;

        let mut cols = Array2::zeros((n * oh * ow, kh * kw * c));
        for (idx, mut row) in cols.outer_iter_mut().enumerate() {
            let (b, pos) = (idx / (oh * ow), idx % (oh * ow));
            let (i, j) = (pos / ow, pos % ow);

            let patch = x.slice(s![b, i..i + kh, j..j + kw, ..]);
            row.iter_mut()
                .zip(patch.iter())
                .for_each(|(dst, &src)| *dst = src);
        }

        let mut z = cols.dot(&kernel);
        z += &bias;

        if let Some(act_fn) = self.act_fn {
            z.par_mapv_inplace(|z| act_fn.f(z));
        }

        Ok(z.into_shape_with_order((n, oh, ow, self.filters))?.into_dyn())
    }

    /// Gives a view of the raw parameter slice as the kernel (HWIO) and biases of this layer.
    pub fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView4<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "conv2d params",
                got: params.len(),
                expected: self.size,
            });
        }

        let (kh, kw) = self.kernel;
        let (k, b) = params.split_at(self.size - self.filters);
        let kernel = ArrayView4::from_shape((kh, kw, self.in_channels, self.filters), k)?;
        let bias = ArrayView1::from_shape(self.filters, b)?;
        Ok((kernel, bias))
    }
}
