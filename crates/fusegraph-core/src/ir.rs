//! Node IR: operation kinds, attributes and operand slots.
//!
//! A node keeps its operand slots as ordered sequences. Duplicate ids in the
//! input list are preserved so that a backend can decide whether one tensor
//! may fill several slots of the same operation.

use crate::types::{LogicalTensor, TensorId};
use std::collections::HashMap;
use std::fmt;

/// Attribute naming the backend a node must be compiled by.
pub const BACKEND_ATTR: &str = "backend";

/// Operation kinds understood by the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    Abs,
    Add,
    MatMul,
    Maximum,
    Minimum,
    Multiply,
    ReLU,
    Sigmoid,
    Subtract,
    Tanh,
}

impl OpKind {
    /// Canonical operation name.
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Abs => "Abs",
            OpKind::Add => "Add",
            OpKind::MatMul => "MatMul",
            OpKind::Maximum => "Maximum",
            OpKind::Minimum => "Minimum",
            OpKind::Multiply => "Multiply",
            OpKind::ReLU => "ReLU",
            OpKind::Sigmoid => "Sigmoid",
            OpKind::Subtract => "Subtract",
            OpKind::Tanh => "Tanh",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute value types.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Int(i64),
    Bool(bool),
    String(String),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(value: Vec<i64>) -> Self {
        AttributeValue::Ints(value)
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(value: Vec<f32>) -> Self {
        AttributeValue::Floats(value)
    }
}

/// A single operation with its attributes and operand slots.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name (may be empty).
    pub name: String,

    /// Operation kind.
    pub op_kind: OpKind,

    /// Operation attributes, including the backend selector.
    pub attributes: HashMap<String, AttributeValue>,

    /// Input slots in declaration order (duplicates permitted).
    pub inputs: Vec<LogicalTensor>,

    /// Output slots in declaration order.
    pub outputs: Vec<LogicalTensor>,
}

impl Node {
    /// Create a node with no attributes and no operands.
    pub fn new(op_kind: OpKind) -> Self {
        Self {
            name: String::new(),
            op_kind,
            attributes: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Set the backend selector attribute.
    pub fn with_backend(mut self, backend: &str) -> Self {
        self.set_attr(BACKEND_ATTR, backend);
        self
    }

    /// Set an attribute.
    pub fn set_attr(&mut self, name: &str, value: impl Into<AttributeValue>) -> &mut Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Get an attribute.
    pub fn attr(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Name of the backend this node selects, if any.
    pub fn backend(&self) -> Option<&str> {
        match self.attr(BACKEND_ATTR) {
            Some(AttributeValue::String(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Append input slots.
    pub fn add_inputs(&mut self, inputs: &[LogicalTensor]) -> &mut Self {
        self.inputs.extend_from_slice(inputs);
        self
    }

    /// Append output slots.
    pub fn add_outputs(&mut self, outputs: &[LogicalTensor]) -> &mut Self {
        self.outputs.extend_from_slice(outputs);
        self
    }

    /// Input ids in slot order, duplicates included.
    pub fn input_ids(&self) -> impl Iterator<Item = TensorId> + '_ {
        self.inputs.iter().map(|lt| lt.id)
    }

    /// Output ids in slot order.
    pub fn output_ids(&self) -> impl Iterator<Item = TensorId> + '_ {
        self.outputs.iter().map(|lt| lt.id)
    }

    /// Check if any id fills more than one input slot.
    pub fn has_aliased_inputs(&self) -> bool {
        self.inputs
            .iter()
            .enumerate()
            .any(|(i, lt)| self.inputs[..i].iter().any(|prev| prev.id == lt.id))
    }

    /// Label used in logs and error messages.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.op_kind.to_string()
        } else {
            format!("{} ({})", self.name, self.op_kind)
        }
    }
}
