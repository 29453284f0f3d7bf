//! Initializers for the blocks of a flat parameter buffer.

mod chained;
mod constant;
mod error;
mod random;

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use error::{InitErr, Result};
pub use random::RandParamGen;

/// A `ParamGen` writes the initial values of one or more blocks of the parameter buffer.
pub trait ParamGen {
    /// The amount of parameters this generator has yet to write.
    fn remaining(&self) -> usize;

    /// Writes the next parameters at the start of `out`.
    ///
    /// # Arguments
    /// * `out` - The destination, may be longer than what is left to generate.
    ///
    /// # Returns
    /// How many leading slots of `out` were written, zero once the generator is exhausted.
    fn fill(&mut self, out: &mut [f32]) -> usize;
}
