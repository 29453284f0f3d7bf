use super::ParamGen;

/// Writes the same value over its whole block, biases start at zero.
pub struct ConstParamGen {
    value: f32,
    remaining: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen`.
    ///
    /// # Arguments
    /// * `value` - The value to write.
    /// * `len` - The length of the block.
    pub fn new(value: f32, len: usize) -> Self {
        Self {
            value,
            remaining: len,
        }
    }

    pub fn zeros(len: usize) -> Self {
        Self::new(0., len)
    }
}

impl ParamGen for ConstParamGen {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn fill(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.remaining);
        out[..n].fill(self.value);
        self.remaining -= n;
        n
    }
}
