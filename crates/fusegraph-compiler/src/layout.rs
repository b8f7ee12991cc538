//! Layout inference for matched operands.
//!
//! Outputs left as `Any` receive a backend-chosen opaque layout. Inputs must
//! arrive with a concrete layout: caller strides, or an opaque layout the same
//! backend assigned when compiling an upstream partition.

use crate::matching::Side;
use crate::CompileOptions;
use fusegraph_core::{Backend, Error, Layout, LogicalTensor, Result};

/// Finalize the layout of every operand on one side of a partition.
pub(crate) fn finalize(
    backend: &dyn Backend,
    side: Side,
    operands: Vec<LogicalTensor>,
    options: &CompileOptions,
) -> Result<Vec<LogicalTensor>> {
    operands
        .into_iter()
        .map(|lt| finalize_one(backend, side, lt, options))
        .collect()
}

fn finalize_one(
    backend: &dyn Backend,
    side: Side,
    lt: LogicalTensor,
    options: &CompileOptions,
) -> Result<LogicalTensor> {
    match &lt.layout {
        Layout::Undefined => Err(Error::InvalidArgument(format!(
            "Tensor {} has an undefined layout",
            lt.id
        ))),
        Layout::Any if side == Side::Input => Err(Error::InvalidArgument(format!(
            "Input tensor {} must have a strided or opaque layout, not any",
            lt.id
        ))),
        Layout::Any => {
            let assigned = backend.assign_layout(&lt)?;
            check_assigned(backend, &lt, &assigned)?;
            tracing::debug!(
                tensor = %lt.id,
                size_bytes = ?assigned.size_bytes(),
                "assigned opaque layout"
            );
            Ok(assigned)
        }
        Layout::Strided(strides) => {
            if strides.len() != lt.dims.len() {
                return Err(Error::InvalidArgument(format!(
                    "Tensor {} has {} strides for {} dims",
                    lt.id,
                    strides.len(),
                    lt.dims.len()
                )));
            }
            if options.verify_strided_layouts {
                backend.verify_layout(&lt)?;
            }
            Ok(lt)
        }
        Layout::Opaque(opaque) => {
            if opaque.backend != backend.name() {
                return Err(Error::InvalidArgument(format!(
                    "Tensor {} carries an opaque layout of backend '{}', not '{}'",
                    lt.id,
                    opaque.backend,
                    backend.name()
                )));
            }
            backend.verify_layout(&lt)?;
            Ok(lt)
        }
    }
}

/// The backend must keep identity, shape and type, and must not shrink the
/// buffer below the plain size.
fn check_assigned(
    backend: &dyn Backend,
    requested: &LogicalTensor,
    assigned: &LogicalTensor,
) -> Result<()> {
    let size = assigned.size_bytes().ok_or_else(|| {
        Error::Kernel(format!(
            "Backend '{}' left tensor {} without a concrete layout",
            backend.name(),
            requested.id
        ))
    })?;
    let fits = requested.plain_size().is_some_and(|plain| size >= plain);
    if assigned.id != requested.id || !assigned.same_shape_as(requested) || !fits {
        return Err(Error::Kernel(format!(
            "Backend '{}' assigned an inconsistent layout to tensor {}",
            backend.name(),
            requested.id
        )));
    }
    Ok(())
}
