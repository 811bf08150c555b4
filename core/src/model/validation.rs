//! The shape and type inference protocol.
use super::{InputRelevance, TensorDesc};
use crate::internal::*;
use std::fmt;

/// Where a node stands with respect to shape and type inference.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ValidationState {
    /// never validated, or an input changed since
    #[default]
    Unvalidated,
    Valid,
    Failed(String),
}

/// Structural precondition violated by a node during inference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    pub node: String,
    pub op: String,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Check failed for node {} ({}): {}", self.node, self.op, self.message)
    }
}

impl std::error::Error for ValidationFailure {}

/// What an operation sees while inferring its output types: its input
/// descriptors, and the outputs it must fill.
#[derive(Debug)]
pub struct InferenceContext {
    node: String,
    op: &'static str,
    inputs: TVec<TensorDesc>,
    outputs: TVec<TensorDesc>,
    relevance: TVec<InputRelevance>,
}

impl InferenceContext {
    pub fn new(
        node: impl Into<String>,
        op: &'static str,
        inputs: TVec<TensorDesc>,
        nb_outputs: usize,
    ) -> InferenceContext {
        let relevance = tvec!(InputRelevance::default(); inputs.len());
        InferenceContext {
            node: node.into(),
            op,
            inputs,
            outputs: tvec!(TensorDesc::dynamic(); nb_outputs),
            relevance,
        }
    }

    /// Build the error reported for this node.
    pub fn failure(&self, message: impl Into<String>) -> GraftError {
        ValidationFailure { node: self.node.clone(), op: self.op.to_string(), message: message.into() }
            .into()
    }

    pub fn inputs(&self) -> &[TensorDesc] {
        &self.inputs
    }

    pub fn input(&self, ix: usize) -> GraftResult<&TensorDesc> {
        self.inputs.get(ix).ok_or_else(|| self.failure(format!("Missing input #{ix}")))
    }

    pub fn input_type(&self, ix: usize) -> GraftResult<ElementType> {
        Ok(self.input(ix)?.element_type)
    }

    pub fn input_shape(&self, ix: usize) -> GraftResult<&PartialShape> {
        Ok(&self.input(ix)?.shape)
    }

    /// Value of an input, if known at inference time.
    pub fn input_value(&self, ix: usize) -> Option<&Arc<Tensor>> {
        self.inputs.get(ix).and_then(|i| i.konst.as_ref())
    }

    /// Fail unless the input count is in `min..=max`.
    pub fn check_arity(&self, min: usize, max: usize) -> GraftResult<()> {
        node_check!(
            self,
            (min..=max).contains(&self.inputs.len()),
            "{} expects {} inputs, got {}",
            self.op,
            if min == max { min.to_string() } else { format!("{min} to {max}") },
            self.inputs.len()
        );
        Ok(())
    }

    pub fn set_output_type(&mut self, ix: usize, et: ElementType, shape: PartialShape) {
        let output = &mut self.outputs[ix];
        output.element_type = et;
        output.shape = shape;
    }

    pub fn set_output_value(&mut self, ix: usize, value: Arc<Tensor>) {
        self.outputs[ix].konst = Some(value);
    }

    pub fn output(&self, ix: usize) -> &TensorDesc {
        &self.outputs[ix]
    }

    pub fn nb_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn set_input_is_relevant_to_shape(&mut self, ix: usize, relevant: bool) {
        self.relevance[ix].shape = relevant;
    }

    pub fn set_input_is_relevant_to_value(&mut self, ix: usize, relevant: bool) {
        self.relevance[ix].value = relevant;
    }

    pub fn into_parts(self) -> (TVec<TensorDesc>, TVec<InputRelevance>) {
        (self.outputs, self.relevance)
    }
}
