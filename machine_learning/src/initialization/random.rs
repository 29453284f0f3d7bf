use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::{InitErr, ParamGen, Result};

/// Writes samples of a distribution, drawing from an rng shared with the other layers so a
/// single seed determines the whole buffer.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, len: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: len,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Samples uniformly from `low..high`.
    ///
    /// # Arguments
    /// * `rng` - The shared random number generator.
    /// * `len` - The length of the block.
    /// * `low` - The inclusive lower bound.
    /// * `high` - The exclusive upper bound.
    ///
    /// # Returns
    /// A new `RandParamGen` or an error if the range is empty or not finite.
    pub fn uniform(rng: Rc<RefCell<R>>, len: usize, low: f32, high: f32) -> Result<Self> {
        let distribution =
            Uniform::new(low, high).map_err(|_| InitErr::InvalidRange { low, high })?;

        Ok(Self::new(rng, distribution, len))
    }

    /// Glorot (Xavier) uniform: samples from `±sqrt(6 / (fan_in + fan_out))`, the default
    /// kernel initializer of convolutional and dense layers.
    ///
    /// # Arguments
    /// * `rng` - The shared random number generator.
    /// * `len` - The length of the block.
    /// * `fan_in` - Input units per output, `kh * kw * in_channels` for a convolution.
    /// * `fan_out` - Output units per input, `kh * kw * filters` for a convolution.
    ///
    /// # Returns
    /// A new `RandParamGen` or an error if both fans are zero.
    pub fn glorot_uniform(
        rng: Rc<RefCell<R>>,
        len: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Self> {
        if fan_in + fan_out == 0 {
            return Err(InitErr::ZeroFan);
        }

        let limit = (6. / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(rng, len, -limit, limit)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn fill(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.remaining);
        let mut rng = self.rng.borrow_mut();

        for p in &mut out[..n] {
            *p = self.distribution.sample(&mut *rng);
        }

        self.remaining -= n;
        n
    }
}
