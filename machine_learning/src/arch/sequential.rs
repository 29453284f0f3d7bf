use std::{cell::RefCell, rc::Rc};

use log::{debug, info};
use ndarray::ArrayD;
use rand::Rng;

use super::layers::Layer;
use crate::{
    MlErr, Result,
    initialization::{ChainedParamGen, ParamGen},
};

/// A sequential model: information flows forward through its layers in order.
///
/// The model doesn't own its parameters, they live in a single flat buffer whose layout is the
/// concatenation of every layer's parameter block, see `Sequential::split_params`.
#[derive(Clone, Debug)]
pub struct Sequential {
    input_shape: Vec<usize>,
    layers: Vec<Layer>,
    shapes: Vec<Vec<usize>>,
}

impl Sequential {
    /// Creates a new `Sequential`, inferring the output shape of every layer.
    ///
    /// # Arguments
    /// * `input_shape` - The per-sample input shape, without the batch axis.
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if a layer can't consume its predecessor's output.
    pub fn new<I>(input_shape: &[usize], layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();
        if layers.is_empty() {
            return Err(MlErr::InvalidLayer(
                "a sequential needs at least one layer".into(),
            ));
        }

        let mut shapes = Vec::with_capacity(layers.len());
        let mut curr = input_shape.to_vec();

        for (i, layer) in layers.iter().enumerate() {
            curr = layer
                .output_shape(&curr)
                .ok_or_else(|| MlErr::IncompatibleLayer {
                    layer: i,
                    kind: layer.kind(),
                    input: curr.clone(),
                })?;

            debug!("layer {i} ({}) -> {curr:?}", layer.kind());
            shapes.push(curr.clone());
        }

        Ok(Self {
            input_shape: input_shape.to_vec(),
            layers,
            shapes,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// The per-sample output shape of the whole model.
    pub fn output_shape(&self) -> &[usize] {
        self.shapes.last().map_or(&self.input_shape, |s| s)
    }

    /// Returns the per-sample input and output shapes of the `i`-th layer.
    pub fn layer_shapes(&self, i: usize) -> Option<(&[usize], &[usize])> {
        let output = self.shapes.get(i)?;
        let input = match i {
            0 => &self.input_shape,
            _ => &self.shapes[i - 1],
        };

        Some((input.as_slice(), output.as_slice()))
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    /// Samples a fresh flat parameter buffer following each layer's initializers.
    ///
    /// # Arguments
    /// * `rng` - The random number generator every initializer draws from.
    ///
    /// # Returns
    /// A buffer of exactly `self.size()` parameters.
    pub fn init_params<R: Rng + 'static>(&self, rng: R) -> Result<Vec<f32>> {
        let rng = Rc::new(RefCell::new(rng));
        let mut param_gens = Vec::new();

        for layer in &self.layers {
            param_gens.extend(layer.param_gens(&rng)?);
        }

        let size = self.size();
        let mut chain = ChainedParamGen::new(param_gens);
        let mut params = vec![0f32; size];
        let written = chain.fill(&mut params);

        if written != size || chain.remaining() != 0 {
            return Err(MlErr::SizeMismatch {
                what: "initialized params",
                got: written + chain.remaining(),
                expected: size,
            });
        }

        info!("initialized {size} parameters");
        Ok(params)
    }

    /// Splits the flat parameter buffer into one slice per layer.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    ///
    /// # Returns
    /// A slice per layer, empty for layers without parameters, or an error if the buffer
    /// doesn't hold exactly `self.size()` parameters.
    pub fn split_params<'p>(&self, params: &'p [f32]) -> Result<Vec<&'p [f32]>> {
        let size = self.size();
        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "params",
                got: params.len(),
                expected: size,
            });
        }

        let mut rest = params;
        let slices = self
            .layers
            .iter()
            .map(|layer| {
                let slice;
                (slice, rest) = rest.split_at(layer.size());
                slice
            })
            .collect();

        Ok(slices)
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - A batch whose per-sample shape is `self.input_shape()`.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&self, params: &[f32], mut x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if x.ndim() == 0 || x.shape()[1..] != self.input_shape[..] {
            return Err(MlErr::IncompatibleLayer {
                layer: 0,
                kind: self.layers[0].kind(),
                input: x.shape().to_vec(),
            });
        }

        for (layer, params) in self.layers.iter().zip(self.split_params(params)?) {
            x = layer.forward(params, x)?;
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::activations::ActFn;

    fn tiny() -> Sequential {
        Sequential::new(
            &[6, 6, 1],
            [
                Layer::conv2d(1, 2, (3, 3), Some(ActFn::relu())),
                Layer::max_pool2d((2, 2)),
                Layer::flatten(),
                Layer::dense((8, 3), None),
                Layer::l2_normalize(1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn infers_every_shape() {
        let model = tiny();

        assert_eq!(model.layer_shapes(0), Some((&[6, 6, 1][..], &[4, 4, 2][..])));
        assert_eq!(model.layer_shapes(2), Some((&[2, 2, 2][..], &[8][..])));
        assert_eq!(model.layer_shapes(5), None);
        assert_eq!(model.output_shape(), &[3]);
        assert_eq!(model.size(), (9 * 2 + 2) + (8 * 3 + 3));
    }

    #[test]
    fn rejects_incompatible_chain() {
        let res = Sequential::new(
            &[6, 6, 1],
            [Layer::conv2d(1, 2, (3, 3), None), Layer::dense((8, 3), None)],
        );

        assert!(matches!(
            res,
            Err(MlErr::IncompatibleLayer {
                layer: 1,
                kind: "dense",
                ..
            })
        ));
    }

    #[test]
    fn rejects_empty_model() {
        assert!(Sequential::new(&[1], []).is_err());
    }

    #[test]
    fn init_zeroes_biases_only() {
        let model = tiny();

        let params = model.init_params(StdRng::seed_from_u64(7)).unwrap();
        let slices = model.split_params(&params).unwrap();

        let (kernel, bias) = slices[0].split_at(18);
        assert!(kernel.iter().any(|&w| w != 0.));
        assert!(bias.iter().all(|&b| b == 0.));
        assert!(slices[1].is_empty());
        assert_eq!(slices[3].len(), 27);
    }

    #[test]
    fn forward_rejects_wrong_input() {
        let model = tiny();
        let params = vec![0.; model.size()];

        let x = Array4::<f32>::zeros((1, 5, 6, 1)).into_dyn();
        assert!(model.forward(&params, x).is_err());

        let x = Array4::<f32>::zeros((1, 6, 6, 1)).into_dyn();
        assert!(model.forward(&params[1..], x).is_err());
    }
}
