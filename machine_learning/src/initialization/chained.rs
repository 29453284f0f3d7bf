use super::ParamGen;

/// Walks a sequence of generators, one per parameter block, in the order the blocks are
/// laid out in the flat buffer.
pub struct ChainedParamGen {
    param_gens: Vec<Box<dyn ParamGen>>,
    curr: usize,
}

impl ChainedParamGen {
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            param_gens,
            curr: 0,
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn remaining(&self) -> usize {
        self.param_gens[self.curr..]
            .iter()
            .map(|param_gen| param_gen.remaining())
            .sum()
    }

    fn fill(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;

        while written < out.len() && self.curr < self.param_gens.len() {
            let n = self.param_gens[self.curr].fill(&mut out[written..]);
            written += n;

            if self.param_gens[self.curr].remaining() == 0 {
                self.curr += 1;
            }
        }

        written
    }
}
