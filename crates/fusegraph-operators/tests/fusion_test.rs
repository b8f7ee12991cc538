//! Multi-node partitions and chaining of compiled partitions.

mod common;

use common::{
    EngineKind, Error, HostStream, Partition, Tensor, TensorId, TensorMut, f32_any, f32_tensor,
    init_tracing, make_node, reference_registry, zeroed_f32,
};
use fusegraph_core::{Engine, LayoutType, OpKind};

#[test]
fn test_fused_add_relu() -> anyhow::Result<()> {
    init_tracing();
    let registry = reference_registry();

    let a = f32_tensor(1, &[2, 3]);
    let b = f32_tensor(2, &[2, 3]);
    let sum = f32_any(3, &[2, 3]);
    let out = f32_any(4, &[2, 3]);

    // Declared consumer first; the partition orders them
    let relu = make_node(OpKind::ReLU, &[&sum], &[&out]);
    let add = make_node(OpKind::Add, &[&a, &b], &[&sum]);
    let partition = Partition::init(vec![relu, add], EngineKind::Cpu, &registry)?;

    assert_eq!(partition.required_inputs(), &[TensorId(1), TensorId(2)]);
    assert_eq!(partition.required_outputs(), &[TensorId(4)]);

    let compiled = partition.compile(&[&a, &b], &[&out], &Engine::cpu())?;
    assert_eq!(compiled.kernel_name(), "fused(Add+ReLU)");
    assert!(matches!(
        compiled.query_logical_tensor(sum.id),
        Err(Error::NotFound(_))
    ));

    let a_data = [1.0f32, -2.0, 3.0, -4.0, 5.0, -6.0];
    let b_data = [-0.5f32, 1.0, -4.0, 5.0, 0.5, 1.0];
    let out_lt = compiled.query_logical_tensor(out.id)?;
    let mut output = zeroed_f32(out_lt.size_bytes().unwrap_or(0));

    compiled.execute(
        &HostStream::new(),
        &[Tensor::from_slice(&a, &a_data), Tensor::from_slice(&b, &b_data)],
        &mut [TensorMut::from_slice(out_lt, &mut output)],
    )?;

    assert_eq!(output, vec![0.5, 0.0, 0.0, 1.0, 5.5, 0.0]);
    Ok(())
}

#[test]
fn test_three_node_chain_with_broadcast() -> anyhow::Result<()> {
    let registry = reference_registry();

    // y = tanh(abs(x) * scale), scale broadcast along rows
    let x = f32_tensor(1, &[2, 2]);
    let scale = f32_tensor(2, &[2]);
    let abs = f32_tensor(3, &[2, 2]);
    let scaled = f32_tensor(4, &[2, 2]);
    let y = f32_tensor(5, &[2, 2]);

    let nodes = vec![
        make_node(OpKind::Abs, &[&x], &[&abs]),
        make_node(OpKind::Multiply, &[&abs, &scale], &[&scaled]),
        make_node(OpKind::Tanh, &[&scaled], &[&y]),
    ];
    let partition = Partition::init(nodes, EngineKind::Any, &registry)?;
    assert_eq!(partition.required_inputs(), &[TensorId(1), TensorId(2)]);

    let compiled = partition.compile(&[&scale, &x], &[&y], &Engine::cpu())?;

    let x_data = [-1.0f32, 0.0, 2.0, -0.5];
    let scale_data = [0.5f32, 2.0];
    let mut output = vec![0.0f32; 4];
    compiled.execute(
        &HostStream::new(),
        &[Tensor::from_slice(&x, &x_data), Tensor::from_slice(&scale, &scale_data)],
        &mut [TensorMut::from_slice(&y, &mut output)],
    )?;

    let expected = [0.5f32.tanh(), 0.0, 1.0f32.tanh(), 1.0f32.tanh()];
    for (got, want) in output.iter().zip(expected) {
        assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
    }
    Ok(())
}

#[test]
fn test_opaque_output_feeds_next_partition() -> anyhow::Result<()> {
    init_tracing();
    let registry = reference_registry();
    let engine = Engine::cpu();

    // First partition: h = relu(x), h left to the backend
    let x = f32_tensor(1, &[4]);
    let h = f32_any(2, &[4]);
    let first = Partition::init(
        vec![make_node(OpKind::ReLU, &[&x], &[&h])],
        EngineKind::Cpu,
        &registry,
    )?;
    let first = first.compile(&[&x], &[&h], &engine)?;
    let h_opaque = first.query_logical_tensor(h.id)?.clone();
    assert_eq!(h_opaque.layout_type(), LayoutType::Opaque);

    // Second partition consumes the opaque descriptor: y = h * h
    let y = f32_any(3, &[4]);
    let second = Partition::init(
        vec![make_node(OpKind::Multiply, &[&h, &h], &[&y])],
        EngineKind::Cpu,
        &registry,
    )?;
    let second = second.compile(&[&h_opaque], &[&y], &engine)?;
    assert_eq!(second.query_logical_tensor(h.id)?, &h_opaque);

    let stream = HostStream::new();
    let x_data = [-1.0f32, 2.0, -3.0, 4.0];
    let mut h_data = zeroed_f32(h_opaque.size_bytes().unwrap_or(0));
    first.execute(
        &stream,
        &[Tensor::from_slice(&x, &x_data)],
        &mut [TensorMut::from_slice(&h_opaque, &mut h_data)],
    )?;

    let y_lt = second.query_logical_tensor(y.id)?;
    let mut y_data = zeroed_f32(y_lt.size_bytes().unwrap_or(0));
    second.execute(
        &stream,
        &[Tensor::from_slice(&h_opaque, &h_data)],
        &mut [TensorMut::from_slice(y_lt, &mut y_data)],
    )?;

    assert_eq!(y_data, vec![0.0, 4.0, 0.0, 16.0]);
    Ok(())
}

#[test]
fn test_cyclic_partition_is_rejected() {
    let registry = reference_registry();
    let a = f32_tensor(1, &[4]);
    let b = f32_tensor(2, &[4]);

    let nodes = vec![
        make_node(OpKind::Abs, &[&a], &[&b]),
        make_node(OpKind::Tanh, &[&b], &[&a]),
    ];
    let result = Partition::init(nodes, EngineKind::Cpu, &registry);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}
