//! Partition-level kernel that runs one node kernel per step.
//!
//! Node kernels take buffers in slot order. The fused kernel receives buffers
//! in the partition's required order and routes them to each step; tensors
//! produced and consumed inside the partition live in scratch buffers that
//! exist only for the duration of one `execute` call.

use fusegraph_core::{Error, Kernel, Result, Stream};

/// Where a node slot's buffer comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferRef {
    /// Required input at this position.
    Input(usize),
    /// Required output at this position.
    Output(usize),
    /// Intermediate tensor with this scratch index.
    Scratch(usize),
}

/// One node kernel with its slot routing.
pub(crate) struct Step {
    pub kernel: Box<dyn Kernel>,
    pub inputs: Vec<BufferRef>,
    pub outputs: Vec<BufferRef>,
}

pub(crate) struct FusedKernel {
    name: String,
    steps: Vec<Step>,
    /// Byte size of every scratch buffer.
    scratch_sizes: Vec<usize>,
}

impl FusedKernel {
    pub(crate) fn new(steps: Vec<Step>, scratch_sizes: Vec<usize>) -> Self {
        let name = match steps.as_slice() {
            [single] => single.kernel.name().to_string(),
            _ => {
                let names: Vec<_> = steps.iter().map(|s| s.kernel.name()).collect();
                format!("fused({})", names.join("+"))
            }
        };
        Self {
            name,
            steps,
            scratch_sizes,
        }
    }
}

/// Zeroed scratch storage of at least `size` bytes, 8-byte aligned.
fn allocate(size: usize) -> Vec<u64> {
    vec![0; size.div_ceil(8)]
}

impl Kernel for FusedKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        stream: &dyn Stream,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        let mut scratch: Vec<Vec<u64>> = vec![Vec::new(); self.scratch_sizes.len()];

        for step in &self.steps {
            // Fresh storage for intermediates this step produces
            let mut produced: Vec<Vec<u64>> = step
                .outputs
                .iter()
                .map(|slot| match *slot {
                    BufferRef::Scratch(i) => allocate(self.scratch_sizes[i]),
                    _ => Vec::new(),
                })
                .collect();

            let step_inputs = step
                .inputs
                .iter()
                .map(|slot| match *slot {
                    BufferRef::Input(i) => inputs.get(i).copied().ok_or_else(|| {
                        Error::Kernel(format!("{} is missing input buffer {i}", self.name))
                    }),
                    BufferRef::Scratch(i) => {
                        let bytes: &[u8] = bytemuck::cast_slice(scratch[i].as_slice());
                        Ok(&bytes[..self.scratch_sizes[i]])
                    }
                    BufferRef::Output(i) => Err(Error::Kernel(format!(
                        "{} routes required output {i} into a node input",
                        self.name
                    ))),
                })
                .collect::<Result<Vec<&[u8]>>>()?;

            let mut required: Vec<Option<&mut [u8]>> =
                outputs.iter_mut().map(|b| Some(&mut **b)).collect();
            let mut step_outputs: Vec<&mut [u8]> = Vec::with_capacity(step.outputs.len());
            for (slot, storage) in step.outputs.iter().zip(produced.iter_mut()) {
                let buffer = match *slot {
                    BufferRef::Output(i) => required.get_mut(i).and_then(Option::take).ok_or_else(
                        || Error::Kernel(format!("{} is missing output buffer {i}", self.name)),
                    )?,
                    BufferRef::Scratch(i) => {
                        let bytes: &mut [u8] = bytemuck::cast_slice_mut(storage.as_mut_slice());
                        &mut bytes[..self.scratch_sizes[i]]
                    }
                    BufferRef::Input(i) => {
                        return Err(Error::Kernel(format!(
                            "{} routes required input {i} into a node output",
                            self.name
                        )));
                    }
                };
                step_outputs.push(buffer);
            }

            step.kernel
                .execute(stream, &step_inputs, &mut step_outputs)?;

            for (slot, storage) in step.outputs.iter().zip(produced) {
                if let BufferRef::Scratch(i) = *slot {
                    scratch[i] = storage;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::HostStream;

    /// Writes `input + delta` elementwise.
    struct Offset(f32);

    impl Kernel for Offset {
        fn name(&self) -> &str {
            "Offset"
        }

        fn execute(
            &self,
            _stream: &dyn Stream,
            inputs: &[&[u8]],
            outputs: &mut [&mut [u8]],
        ) -> Result<()> {
            let src: &[f32] = bytemuck::cast_slice(inputs[0]);
            let dst: &mut [f32] = bytemuck::cast_slice_mut(&mut *outputs[0]);
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s + self.0;
            }
            Ok(())
        }
    }

    #[test]
    fn test_chain_through_scratch() {
        let kernel = FusedKernel::new(
            vec![
                Step {
                    kernel: Box::new(Offset(1.0)),
                    inputs: vec![BufferRef::Input(0)],
                    outputs: vec![BufferRef::Scratch(0)],
                },
                Step {
                    kernel: Box::new(Offset(10.0)),
                    inputs: vec![BufferRef::Scratch(0)],
                    outputs: vec![BufferRef::Output(0)],
                },
            ],
            vec![12],
        );
        assert_eq!(kernel.name(), "fused(Offset+Offset)");

        let input = [1.0f32, 2.0, 3.0];
        let mut out = [0.0f32; 3];
        kernel
            .execute(
                &HostStream::new(),
                &[bytemuck::cast_slice::<f32, u8>(&input)],
                &mut [bytemuck::cast_slice_mut::<f32, u8>(&mut out)],
            )
            .unwrap();
        assert_eq!(out, [12.0, 13.0, 14.0]);
    }

    #[test]
    fn test_single_step_keeps_name() {
        let kernel = FusedKernel::new(
            vec![Step {
                kernel: Box::new(Offset(0.0)),
                inputs: vec![BufferRef::Input(0)],
                outputs: vec![BufferRef::Output(0)],
            }],
            vec![],
        );
        assert_eq!(kernel.name(), "Offset");
    }

    #[test]
    fn test_missing_output_buffer() {
        let kernel = FusedKernel::new(
            vec![Step {
                kernel: Box::new(Offset(0.0)),
                inputs: vec![BufferRef::Input(0)],
                outputs: vec![BufferRef::Output(1)],
            }],
            vec![],
        );
        let input = [1.0f32];
        let mut out = [0.0f32];
        let result = kernel.execute(
            &HostStream::new(),
            &[bytemuck::cast_slice::<f32, u8>(&input)],
            &mut [bytemuck::cast_slice_mut::<f32, u8>(&mut out)],
        );
        assert!(matches!(result, Err(Error::Kernel(_))));
    }
}
