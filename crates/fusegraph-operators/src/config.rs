//! Reference backend configuration.

use fusegraph_core::{Error, Result};

/// Tunables of the reference backend.
///
/// Neither value is visible through the core API: `opaque_alignment` only
/// affects the size of opaque layouts the backend assigns, and
/// `matmul_block` only the loop blocking inside matmul kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceBackendConfig {
    /// Opaque buffers are rounded up to a multiple of this many bytes.
    pub opaque_alignment: usize,

    /// Tile edge of the blocked matmul loop nest.
    pub matmul_block: usize,
}

impl ReferenceBackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opaque_alignment(mut self, alignment: usize) -> Self {
        self.opaque_alignment = alignment;
        self
    }

    pub fn with_matmul_block(mut self, block: usize) -> Self {
        self.matmul_block = block;
        self
    }

    /// Check that the alignment is a power of two and the block is non-zero.
    pub fn validate(&self) -> Result<()> {
        if !self.opaque_alignment.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "opaque_alignment must be a power of two, got {}",
                self.opaque_alignment
            )));
        }
        if self.matmul_block == 0 {
            return Err(Error::InvalidArgument(
                "matmul_block must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Size of an opaque buffer holding `plain_size` bytes, or `None` if
    /// rounding up overflows.
    pub fn padded_size(&self, plain_size: usize) -> Option<usize> {
        plain_size.checked_next_multiple_of(self.opaque_alignment)
    }
}

impl Default for ReferenceBackendConfig {
    fn default() -> Self {
        Self {
            opaque_alignment: 1,
            matmul_block: 64,
        }
    }
}
