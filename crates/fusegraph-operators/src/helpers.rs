//! Helper functions shared by the reference kernels.

use fusegraph_core::{DataType, Error, KernelCtx, LogicalTensor, Result};

/// Broadcast two shapes to a common output shape.
///
/// Implements NumPy-style broadcasting rules:
/// - Shapes are aligned from the rightmost dimension
/// - Dimensions match if they are equal or one of them is 1
/// - Missing dimensions in the shorter shape are treated as 1
///
/// # Example
///
/// ```text
/// [2, 3, 4] + [3, 4]    -> [2, 3, 4]
/// [2, 3, 4] + [2, 1, 4] -> [2, 3, 4]
/// [8, 1, 6, 1] + [7, 1, 5] -> [8, 7, 6, 5]
/// ```
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut result = vec![1; rank];

    for i in 0..rank {
        let a_dim = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let b_dim = if i < b.len() { b[b.len() - 1 - i] } else { 1 };

        result[rank - 1 - i] = match (a_dim, b_dim) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            (x, y) => {
                return Err(Error::Unimplemented(format!(
                    "Cannot broadcast shapes {a:?} and {b:?}: {x} vs {y} at position {}",
                    rank - 1 - i
                )));
            }
        };
    }

    Ok(result)
}

/// Element strides of `dims` when broadcast to `out_dims`.
///
/// Broadcast dimensions get stride 0 so that every output index maps back to
/// the single source element.
pub fn broadcast_strides(dims: &[usize], out_dims: &[usize]) -> Vec<usize> {
    let offset = out_dims.len() - dims.len();
    let mut strides = vec![0; out_dims.len()];
    let mut stride: usize = 1;
    for i in (0..dims.len()).rev() {
        if dims[i] != 1 {
            strides[offset + i] = stride;
        }
        stride = stride.saturating_mul(dims[i]);
    }
    strides
}

/// Fail with `Unimplemented` unless every operand slot of the node is f32.
pub fn require_f32(ctx: &KernelCtx) -> Result<()> {
    let slots = (0..ctx.input_count())
        .map(|i| ctx.input(i))
        .chain((0..ctx.output_count()).map(|i| ctx.output(i)));
    for slot in slots {
        let lt = slot?;
        if lt.dtype != DataType::F32 {
            return Err(Error::Unimplemented(format!(
                "{} supports f32 only, tensor {} is {:?}",
                ctx.node.label(),
                lt.id,
                lt.dtype
            )));
        }
    }
    Ok(())
}

/// Fail with `InvalidArgument` unless `lt` has exactly `expected` dims.
pub fn require_dims(ctx: &KernelCtx, lt: &LogicalTensor, expected: &[usize]) -> Result<()> {
    if lt.dims != expected {
        return Err(Error::InvalidArgument(format!(
            "{} expects tensor {} with dims {expected:?}, got {:?}",
            ctx.node.label(),
            lt.id,
            lt.dims
        )));
    }
    Ok(())
}

/// Element count of `lt`, failing with `InvalidArgument` if it overflows.
pub fn element_count(lt: &LogicalTensor) -> Result<usize> {
    lt.num_elements().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "Tensor {} with dims {:?} has too many elements",
            lt.id, lt.dims
        ))
    })
}

/// View the first `len` f32 elements of a byte buffer.
pub fn f32_slice(buffer: &[u8], len: usize) -> Result<&[f32]> {
    let end = len.checked_mul(4).unwrap_or(usize::MAX);
    let bytes = buffer.get(..end).ok_or_else(|| {
        Error::Kernel(format!(
            "Buffer of {} bytes cannot hold {len} f32 values",
            buffer.len()
        ))
    })?;
    bytemuck::try_cast_slice(bytes)
        .map_err(|e| Error::Kernel(format!("Cannot view buffer as f32: {e:?}")))
}

/// Mutable view of the first `len` f32 elements of a byte buffer.
pub fn f32_slice_mut(buffer: &mut [u8], len: usize) -> Result<&mut [f32]> {
    let available = buffer.len();
    let end = len.checked_mul(4).unwrap_or(usize::MAX);
    let bytes = buffer.get_mut(..end).ok_or_else(|| {
        Error::Kernel(format!(
            "Buffer of {available} bytes cannot hold {len} f32 values"
        ))
    })?;
    bytemuck::try_cast_slice_mut(bytes)
        .map_err(|e| Error::Kernel(format!("Cannot view buffer as f32: {e:?}")))
}

/// Fetch a positional buffer, failing with `Kernel` if the caller passed too few.
pub fn buffer<'a>(buffers: &[&'a [u8]], index: usize, kernel: &str) -> Result<&'a [u8]> {
    buffers.get(index).copied().ok_or_else(|| {
        Error::Kernel(format!("{kernel} expected an input buffer at position {index}"))
    })
}
