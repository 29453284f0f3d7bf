use log::info;
use machine_learning::arch::Sequential;

use crate::{Result, graph::Graph, lower::lower, quantize::Optimization, serialize::serialize};

/// The description stored in models written without an explicit one.
pub const DEFAULT_DESCRIPTION: &str = "Converted by facenet-export.";

/// Converts a `Sequential` and its parameters into a TFLite flatbuffer.
#[derive(Clone)]
pub struct Converter<'m> {
    model: &'m Sequential,
    params: &'m [f32],
    optimization: Optimization,
    description: String,
}

impl<'m> Converter<'m> {
    /// Creates a new `Converter` applying the default optimization.
    ///
    /// # Arguments
    /// * `model` - The network to convert.
    /// * `params` - The network's parameters.
    pub fn from_model(model: &'m Sequential, params: &'m [f32]) -> Self {
        Self {
            model,
            params,
            optimization: Optimization::default(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }

    pub fn optimization(mut self, optimization: Optimization) -> Self {
        self.optimization = optimization;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Lowers the network and applies the configured optimization without serializing.
    ///
    /// # Returns
    /// The optimized graph or an error if the network can't be lowered.
    pub fn lower(&self) -> Result<Graph> {
        let mut graph = lower(self.model, self.params)?;
        self.optimization.apply(&mut graph);
        Ok(graph)
    }

    /// Runs the whole conversion.
    ///
    /// # Returns
    /// The bytes of the `.tflite` model or an error if the network can't be lowered.
    pub fn convert(&self) -> Result<Vec<u8>> {
        let graph = self.lower()?;
        let bytes = serialize(&graph, &self.description);

        info!(
            "converted {} layers into {} operators ({:?} optimization, {} bytes)",
            self.model.layers().len(),
            graph.operators.len(),
            self.optimization,
            bytes.len()
        );

        Ok(bytes)
    }
}
