//! Matching required operands against caller-supplied candidates.
//!
//! Candidates are matched by id only. The pool may be in any order, may hold
//! tensors the partition does not need, and may name the same id more than
//! once; in that case the first occurrence is used.

use crate::partition::Partition;
use fusegraph_core::{Error, Layout, LogicalTensor, Result, TensorId};

/// Which side of the partition an operand sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Input,
    Output,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Input => "input",
            Side::Output => "output",
        }
    }
}

/// First candidate carrying `id`.
pub(crate) fn first_match<'a>(
    id: TensorId,
    candidates: &[&'a LogicalTensor],
) -> Option<&'a LogicalTensor> {
    candidates.iter().copied().find(|lt| lt.id == id)
}

/// Pick one candidate per required id, in required order.
///
/// Fails with `MissingOperand` if any id has no candidate, and with
/// `InvalidArgument` if a candidate has no element type, has a byte size that
/// does not fit in `usize`, or disagrees with the node-declared slot on dtype
/// or dims.
pub(crate) fn match_operands(
    partition: &Partition,
    side: Side,
    candidates: &[&LogicalTensor],
) -> Result<Vec<LogicalTensor>> {
    let required = match side {
        Side::Input => partition.required_inputs(),
        Side::Output => partition.required_outputs(),
    };

    let mut matched = Vec::with_capacity(required.len());
    for &id in required {
        let candidate = first_match(id, candidates).ok_or_else(|| {
            Error::MissingOperand(format!(
                "No candidate {} for tensor {id} of {}",
                side.as_str(),
                partition.id()
            ))
        })?;
        check_against_declared(partition, candidate)?;

        tracing::debug!(
            tensor = %id,
            side = side.as_str(),
            layout = ?candidate.layout_type(),
            "matched candidate"
        );
        matched.push(candidate.clone());
    }
    Ok(matched)
}

fn check_against_declared(partition: &Partition, candidate: &LogicalTensor) -> Result<()> {
    if !candidate.dtype.is_defined() {
        return Err(Error::InvalidArgument(format!(
            "Tensor {} has an undefined data type",
            candidate.id
        )));
    }
    check_addressable_size(candidate)?;

    let Some(declared) = partition.declared(candidate.id) else {
        return Ok(());
    };
    if declared.dtype.is_defined() && declared.dtype != candidate.dtype {
        return Err(Error::InvalidArgument(format!(
            "Tensor {} is declared as {:?} but the candidate is {:?}",
            candidate.id, declared.dtype, candidate.dtype
        )));
    }
    if declared.dims != candidate.dims {
        return Err(Error::InvalidArgument(format!(
            "Tensor {} is declared with dims {:?} but the candidate has {:?}",
            candidate.id, declared.dims, candidate.dims
        )));
    }
    Ok(())
}

fn check_addressable_size(candidate: &LogicalTensor) -> Result<()> {
    let span_overflows = matches!(
        &candidate.layout,
        Layout::Strided(strides) if strides.len() == candidate.dims.len()
    ) && candidate.size_bytes().is_none();
    if candidate.plain_size().is_none() || span_overflows {
        return Err(Error::InvalidArgument(format!(
            "Tensor {} with dims {:?} is too large to address",
            candidate.id, candidate.dims
        )));
    }
    Ok(())
}
