//! Logical tensor model: identity, shape, element type and layout state.

use std::fmt;

/// Identity of a logical tensor.
///
/// The id is the only key used when matching a partition's operands against
/// candidate descriptors or runtime tensors. Two descriptors with the same id
/// denote the same operand even when they were declared separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub u64);

impl TensorId {
    /// Create a new tensor ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Not yet specified; never valid for compilation.
    Undef,
    F16,
    BF16,
    F32,
    S32,
    S8,
    U8,
}

impl DataType {
    /// Size of one element in bytes (0 for `Undef`).
    pub fn size(&self) -> usize {
        match self {
            DataType::Undef => 0,
            DataType::F16 | DataType::BF16 => 2,
            DataType::F32 | DataType::S32 => 4,
            DataType::S8 | DataType::U8 => 1,
        }
    }

    /// Check if the type is specified.
    pub fn is_defined(&self) -> bool {
        !matches!(self, DataType::Undef)
    }
}

/// Layout state of a logical tensor, without its descriptor payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutType {
    /// No layout information at all.
    Undefined,
    /// The caller defers the choice to the backend.
    Any,
    /// Caller-fixed memory layout described by strides.
    Strided,
    /// Backend-chosen, backend-internal layout.
    Opaque,
}

/// Backend-defined layout descriptor.
///
/// Only the owning backend can interpret `layout_id`; the core relies solely
/// on `size_bytes` when validating buffers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpaqueLayout {
    /// Name of the backend that assigned this layout.
    pub backend: String,

    /// Backend-private layout identifier.
    pub layout_id: u64,

    /// Size of the backing buffer in bytes (never below the plain size).
    pub size_bytes: usize,
}

/// Layout of a logical tensor together with its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layout {
    Undefined,
    Any,
    /// Per-dimension strides, in elements.
    Strided(Vec<usize>),
    Opaque(OpaqueLayout),
}

impl Layout {
    /// The layout type without its payload.
    pub fn layout_type(&self) -> LayoutType {
        match self {
            Layout::Undefined => LayoutType::Undefined,
            Layout::Any => LayoutType::Any,
            Layout::Strided(_) => LayoutType::Strided,
            Layout::Opaque(_) => LayoutType::Opaque,
        }
    }
}

/// Typed, shaped, identity-bearing description of a tensor value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalTensor {
    /// Identity used for all operand matching.
    pub id: TensorId,

    /// Dimensions (rank may be 0).
    pub dims: Vec<usize>,

    /// Element type.
    pub dtype: DataType,

    /// Layout state and descriptor.
    pub layout: Layout,
}

impl LogicalTensor {
    /// Create a descriptor with a dense row-major strided layout.
    pub fn new(id: u64, dims: &[usize], dtype: DataType) -> Self {
        Self {
            id: TensorId::new(id),
            dims: dims.to_vec(),
            dtype,
            layout: Layout::Strided(dense_strides(dims)),
        }
    }

    /// Create a descriptor whose layout is left to the backend.
    pub fn any(id: u64, dims: &[usize], dtype: DataType) -> Self {
        Self {
            layout: Layout::Any,
            ..Self::new(id, dims, dtype)
        }
    }

    /// Replace the layout with explicit strides (in elements).
    pub fn with_strides(mut self, strides: &[usize]) -> Self {
        self.layout = Layout::Strided(strides.to_vec());
        self
    }

    /// Replace the layout.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// The layout type without its payload.
    pub fn layout_type(&self) -> LayoutType {
        self.layout.layout_type()
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements (1 for rank-0 tensors), or `None` on overflow.
    pub fn num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |count, &dim| count.checked_mul(dim))
    }

    /// Size of a dense buffer holding this tensor, or `None` on overflow.
    pub fn plain_size(&self) -> Option<usize> {
        self.num_elements()?.checked_mul(self.dtype.size())
    }

    /// Strides if the layout is strided.
    pub fn strides(&self) -> Option<&[usize]> {
        match &self.layout {
            Layout::Strided(strides) => Some(strides),
            _ => None,
        }
    }

    /// Opaque descriptor if the layout is opaque.
    pub fn opaque(&self) -> Option<&OpaqueLayout> {
        match &self.layout {
            Layout::Opaque(opaque) => Some(opaque),
            _ => None,
        }
    }

    /// Check if the layout is strided with dense row-major strides.
    pub fn is_dense(&self) -> bool {
        self.strides()
            .is_some_and(|strides| strides == dense_strides(&self.dims).as_slice())
    }

    /// Check if dtype and dims are identical to `other`.
    pub fn same_shape_as(&self, other: &LogicalTensor) -> bool {
        self.dtype == other.dtype && self.dims == other.dims
    }

    /// Number of bytes a buffer must provide for this descriptor.
    ///
    /// Returns `None` while the layout is `Any` or `Undefined`, when a
    /// strided descriptor has the wrong number of strides, or when the
    /// addressed span does not fit in `usize`.
    pub fn size_bytes(&self) -> Option<usize> {
        match &self.layout {
            Layout::Strided(strides) => {
                if strides.len() != self.dims.len() {
                    return None;
                }
                if self.dims.contains(&0) {
                    return Some(0);
                }
                let last = self
                    .dims
                    .iter()
                    .zip(strides)
                    .try_fold(0usize, |offset, (dim, stride)| {
                        offset.checked_add((dim - 1).checked_mul(*stride)?)
                    })?;
                last.checked_add(1)?.checked_mul(self.dtype.size())
            }
            Layout::Opaque(opaque) => Some(opaque.size_bytes),
            Layout::Any | Layout::Undefined => None,
        }
    }
}

/// Dense row-major strides for `dims`, in elements.
///
/// Strides saturate at `usize::MAX`; such a descriptor has no `size_bytes`.
pub fn dense_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1].saturating_mul(dims[i + 1].max(1));
    }
    strides
}
