//! Compile-time context for creating kernels.
//!
//! `KernelCtx` provides what a `KernelFactory` needs to commit to one kernel:
//! the node and its attributes, the finalized descriptor of every operand
//! slot, and the engine the kernel will run on.

use crate::engine::Engine;
use crate::ir::{AttributeValue, Node};
use crate::types::LogicalTensor;
use crate::{Error, Result};

/// Compile-time context passed to `KernelFactory::create_kernel()`.
pub struct KernelCtx<'a> {
    /// The node being compiled.
    pub node: &'a Node,

    /// Engine the kernel will run on.
    pub engine: &'a Engine,

    /// Finalized descriptor per input slot (aliased slots repeat).
    inputs: Vec<&'a LogicalTensor>,

    /// Finalized descriptor per output slot.
    outputs: Vec<&'a LogicalTensor>,
}

impl<'a> KernelCtx<'a> {
    /// Create a new kernel context.
    pub fn new(
        node: &'a Node,
        engine: &'a Engine,
        inputs: Vec<&'a LogicalTensor>,
        outputs: Vec<&'a LogicalTensor>,
    ) -> Self {
        Self {
            node,
            engine,
            inputs,
            outputs,
        }
    }

    /// Number of input slots.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output slots.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Finalized descriptor of an input slot.
    pub fn input(&self, index: usize) -> Result<&'a LogicalTensor> {
        self.inputs.get(index).copied().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Input index {index} out of range ({} has {} inputs)",
                self.node.label(),
                self.inputs.len()
            ))
        })
    }

    /// Finalized descriptor of an output slot.
    pub fn output(&self, index: usize) -> Result<&'a LogicalTensor> {
        self.outputs.get(index).copied().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "Output index {index} out of range ({} has {} outputs)",
                self.node.label(),
                self.outputs.len()
            ))
        })
    }

    /// Fail unless the node has exactly the given slot counts.
    pub fn expect_arity(&self, inputs: usize, outputs: usize) -> Result<()> {
        if self.inputs.len() != inputs || self.outputs.len() != outputs {
            return Err(Error::InvalidArgument(format!(
                "{} expects {inputs} inputs and {outputs} outputs, got {} and {}",
                self.node.label(),
                self.inputs.len(),
                self.outputs.len()
            )));
        }
        Ok(())
    }

    /// Get a node attribute by name.
    pub fn attr(&self, name: &str) -> Option<&'a AttributeValue> {
        self.node.attributes.get(name)
    }

    /// Get a bool attribute, or `default` when absent.
    pub fn attr_bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.attr(name) {
            None => Ok(default),
            Some(AttributeValue::Bool(v)) => Ok(*v),
            Some(other) => Err(Error::InvalidArgument(format!(
                "Attribute '{name}' of {} must be a bool, got {other:?}",
                self.node.label()
            ))),
        }
    }

}
