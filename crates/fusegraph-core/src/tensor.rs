//! Runtime tensor views over caller-owned buffers.
//!
//! The runtime never allocates or frees tensor storage. A `Tensor` borrows an
//! input buffer, a `TensorMut` borrows an output buffer. Either may be created
//! without storage so that non-required operands can be listed alongside the
//! required ones.

use crate::types::{LogicalTensor, TensorId};
use bytemuck::Pod;

/// Read-only runtime tensor.
#[derive(Debug, Clone, Copy)]
pub struct Tensor<'a> {
    logical: &'a LogicalTensor,
    data: Option<&'a [u8]>,
}

impl<'a> Tensor<'a> {
    /// Bind a descriptor to a byte buffer.
    pub fn new(logical: &'a LogicalTensor, data: &'a [u8]) -> Self {
        Self {
            logical,
            data: Some(data),
        }
    }

    /// Bind a descriptor to a typed buffer.
    ///
    /// # Example
    /// ```
    /// # use fusegraph_core::{DataType, LogicalTensor, Tensor};
    /// let lt = LogicalTensor::new(1, &[2, 2], DataType::F32);
    /// let data = vec![1.0f32, 2.0, 3.0, 4.0];
    /// let tensor = Tensor::from_slice(&lt, &data);
    /// assert_eq!(tensor.data().map(<[u8]>::len), Some(16));
    /// ```
    pub fn from_slice<T: Pod>(logical: &'a LogicalTensor, data: &'a [T]) -> Self {
        Self::new(logical, bytemuck::cast_slice(data))
    }

    /// A descriptor without storage.
    pub fn empty(logical: &'a LogicalTensor) -> Self {
        Self {
            logical,
            data: None,
        }
    }

    /// The tensor's identity.
    pub fn id(&self) -> TensorId {
        self.logical.id
    }

    /// The bound buffer, if any.
    pub fn data(&self) -> Option<&'a [u8]> {
        self.data
    }
}

/// Writable runtime tensor.
#[derive(Debug)]
pub struct TensorMut<'a> {
    logical: &'a LogicalTensor,
    data: Option<&'a mut [u8]>,
}

impl<'a> TensorMut<'a> {
    /// Bind a descriptor to a mutable byte buffer.
    pub fn new(logical: &'a LogicalTensor, data: &'a mut [u8]) -> Self {
        Self {
            logical,
            data: Some(data),
        }
    }

    /// Bind a descriptor to a mutable typed buffer.
    pub fn from_slice<T: Pod>(logical: &'a LogicalTensor, data: &'a mut [T]) -> Self {
        Self::new(logical, bytemuck::cast_slice_mut(data))
    }

    /// A descriptor without storage.
    pub fn empty(logical: &'a LogicalTensor) -> Self {
        Self {
            logical,
            data: None,
        }
    }

    /// The tensor's identity.
    pub fn id(&self) -> TensorId {
        self.logical.id
    }

    /// The bound buffer, if any.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        self.data.as_deref_mut()
    }
}
