//! Mock backend and stream for unit tests.

use fusegraph_core::{
    Backend, BackendRegistry, DataType, Engine, EngineKind, Error, Kernel, KernelCtx,
    KernelFactory, KernelRegistry, Layout, LogicalTensor, Node, OpKind, OpaqueLayout,
    ResolvedOperands, Result, Stream,
};

pub(crate) struct MockBackend {
    kernels: KernelRegistry,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        let mut kernels = KernelRegistry::new();
        kernels.register(OpKind::ReLU, ReluFactory);
        Self { kernels }
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn kernel_registry(&self) -> &KernelRegistry {
        &self.kernels
    }

    fn supports_engine(&self, kind: EngineKind) -> bool {
        matches!(kind, EngineKind::Cpu | EngineKind::Any)
    }

    fn assign_layout(&self, tensor: &LogicalTensor) -> Result<LogicalTensor> {
        let size_bytes = tensor.plain_size().ok_or_else(|| {
            Error::InvalidArgument(format!("tensor {} is too large", tensor.id))
        })?;
        Ok(tensor.clone().with_layout(Layout::Opaque(OpaqueLayout {
            backend: "mock".to_string(),
            layout_id: 0,
            size_bytes,
        })))
    }

    fn verify_layout(&self, tensor: &LogicalTensor) -> Result<()> {
        match &tensor.layout {
            Layout::Strided(_) if !tensor.is_dense() => {
                Err(Error::Unimplemented("mock backend needs dense strides".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn produce_kernel(
        &self,
        nodes: &[Node],
        operands: &ResolvedOperands,
        engine: &Engine,
    ) -> Result<Box<dyn Kernel>> {
        let [node] = nodes else {
            return Err(Error::Unimplemented("mock backend does not fuse".to_string()));
        };
        let factory = self
            .kernels
            .get(node.op_kind)
            .ok_or_else(|| Error::Unimplemented(format!("mock backend has no {}", node.op_kind)))?;
        if node.has_aliased_inputs() && !factory.allows_input_aliasing() {
            return Err(Error::MissingOperand(format!(
                "{} does not accept aliased inputs",
                node.label()
            )));
        }

        let resolve = |lt: &LogicalTensor| {
            operands.get(lt.id).ok_or_else(|| {
                Error::MissingOperand(format!("{} is not a partition operand", lt.id))
            })
        };
        let inputs = node.inputs.iter().map(resolve).collect::<Result<Vec<_>>>()?;
        let outputs = node.outputs.iter().map(resolve).collect::<Result<Vec<_>>>()?;
        factory.create_kernel(&KernelCtx::new(node, engine, inputs, outputs))
    }
}

struct ReluFactory;

impl KernelFactory for ReluFactory {
    fn name(&self) -> &str {
        "ReLU"
    }

    fn create_kernel(&self, ctx: &KernelCtx) -> Result<Box<dyn Kernel>> {
        ctx.expect_arity(1, 1)?;
        if ctx.input(0)?.dtype != DataType::F32 {
            return Err(Error::Unimplemented("mock ReLU is f32 only".to_string()));
        }
        Ok(Box::new(ReluKernel))
    }
}

struct ReluKernel;

impl Kernel for ReluKernel {
    fn name(&self) -> &str {
        "mock_relu"
    }

    fn execute(
        &self,
        _stream: &dyn Stream,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        let src: &[f32] = bytemuck::try_cast_slice(inputs[0])
            .map_err(|e| Error::Kernel(format!("{e:?}")))?;
        let dst: &mut [f32] = bytemuck::try_cast_slice_mut(outputs[0])
            .map_err(|e| Error::Kernel(format!("{e:?}")))?;
        for (d, s) in dst.iter_mut().zip(src) {
            *d = s.max(0.0);
        }
        Ok(())
    }
}

pub(crate) struct MockStream {
    engine: Engine,
}

impl MockStream {
    pub(crate) fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub(crate) fn cpu() -> Self {
        Self::new(Engine::cpu())
    }
}

impl Stream for MockStream {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn wait(&self) -> Result<()> {
        Ok(())
    }
}

/// A registry with the mock backend registered as "mock".
pub(crate) fn mock_registry() -> BackendRegistry {
    let registry = BackendRegistry::new();
    registry.register_backend("mock", MockBackend::new);
    registry
}

/// A ReLU node over 1x1x3x3 f32 tensors.
pub(crate) fn relu_node(input: u64, output: u64) -> Node {
    let mut node = Node::new(OpKind::ReLU).with_backend("mock");
    node.add_inputs(&[LogicalTensor::new(input, &[1, 1, 3, 3], DataType::F32)])
        .add_outputs(&[LogicalTensor::new(output, &[1, 1, 3, 3], DataType::F32)]);
    node
}
