use ferry_ir::prelude::*;

use ferry_onnx::env::Environment;
use ferry_onnx::graph::{ElemType, GraphDef, NodeDef, TensorDef, ValueDef};
use ferry_onnx::ops::{register_all_ops, OnnxOpRegister};

fn translate(graph: &GraphDef) -> FerryResult<Module> {
    let _ = env_logger::Builder::from_env("FERRY_LOG").try_init();
    ferry_onnx::onnx().translate(graph)
}

fn output_dims(module: &Module) -> Vec<i64> {
    module.outputs()[0].fact().unwrap().dims().to_vec()
}

#[test]
fn reregistering_an_operator_does_not_grow_the_registry() {
    let mut reg = OnnxOpRegister::default();
    register_all_ops(&mut reg);
    let before = reg.len();
    register_all_ops(&mut reg);
    assert_eq!(reg.len(), before);
}

#[test]
fn unsupported_operator_is_named_in_the_error() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2]));
    graph.nodes.push(NodeDef::new("FancyOp", "n0", &["x"], &["y"]));
    graph.outputs.push("y".into());
    let err = translate(&graph).unwrap_err();
    assert!(matches!(err, FerryError::UnsupportedOperator(_)));
    assert!(err.to_string().contains("FancyOp"));
}

#[test]
fn arity_is_enforced() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2]));
    graph.nodes.push(NodeDef::new("Add", "n0", &["x", "x", "x"], &["y"]));
    graph.outputs.push("y".into());
    assert!(matches!(translate(&graph).unwrap_err(), FerryError::InvalidGraph(_)));

    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2]));
    graph.nodes.push(NodeDef::new("Relu", "n0", &["x", "x"], &["y"]));
    graph.outputs.push("y".into());
    assert!(matches!(translate(&graph).unwrap_err(), FerryError::InvalidGraph(_)));
}

#[test]
fn out_of_order_graph_is_invalid() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2]));
    graph.nodes.push(NodeDef::new("Relu", "n0", &["t"], &["y"]));
    graph.nodes.push(NodeDef::new("Relu", "n1", &["x"], &["t"]));
    graph.outputs.push("y".into());
    let err = translate(&graph).unwrap_err();
    assert!(matches!(err, FerryError::InvalidGraph(_)));
    assert!(err.to_string().contains("n0") && err.to_string().contains("t"));
}

#[test]
fn initializer_shadows_declared_input() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("w", ElemType::F32, &[2]));
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2]));
    graph.initializers.push(TensorDef::f32s("w", &[2], &[10.0, 20.0]));
    graph.nodes.push(NodeDef::new("Add", "n0", &["x", "w"], &["y"]));
    graph.outputs.push("y".into());
    let module = translate(&graph).unwrap();
    // w became a constant, x is the only parameter left
    assert_eq!(module.inputs().len(), 1);
    assert!(matches!(module.inputs()[0].op(), OpKind::Source { name } if name == "x"));
}

#[test]
fn all_constant_graph_folds_to_a_constant() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[2]));
    graph.initializers.push(TensorDef::f32s("a", &[2], &[1.0, 2.0]));
    graph.initializers.push(TensorDef::f32s("b", &[2], &[10.0, 20.0]));
    graph.nodes.push(NodeDef::new("Mul", "n0", &["a", "b"], &["y"]));
    graph.outputs.push("y".into());
    let module = translate(&graph).unwrap();
    assert!(module.inputs().is_empty());
    let out = &module.outputs()[0];
    assert_eq!(
        out.as_const().unwrap().as_f32s().unwrap().as_slice().unwrap(),
        &[10.0, 40.0]
    );
}

#[test]
fn two_outputs_become_a_tuple_in_order() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2, 3]));
    graph.nodes.push(NodeDef::new("Relu", "n0", &["x"], &["y1"]));
    graph.nodes.push(NodeDef::new("Transpose", "n1", &["x"], &["y2"]));
    graph.outputs.push("y1".into());
    graph.outputs.push("y2".into());
    let module = translate(&graph).unwrap();
    assert!(matches!(module.body().op(), OpKind::Tuple));
    let outputs = module.outputs();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].fact().unwrap().dims(), &[2, 3]);
    assert_eq!(outputs[1].fact().unwrap().dims(), &[3, 2]);
}

#[test]
fn empty_input_name_is_invalid() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("", ElemType::F32, &[2]));
    graph.outputs.push("y".into());
    assert!(matches!(translate(&graph).unwrap_err(), FerryError::InvalidGraph(_)));

    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2]));
    graph.nodes.push(NodeDef::new("Add", "n0", &["x", ""], &["y"]));
    graph.outputs.push("y".into());
    let err = translate(&graph).unwrap_err();
    assert!(matches!(err, FerryError::InvalidGraph(_)));
    assert!(err.to_string().contains("n0"));
}

#[test]
fn external_initializer_is_rejected() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2]));
    let mut w = TensorDef::f32s("w", &[2], &[1.0, 2.0]);
    w.external = true;
    graph.initializers.push(w);
    graph.nodes.push(NodeDef::new("Add", "n0", &["x", "w"], &["y"]));
    graph.outputs.push("y".into());
    let err = translate(&graph).unwrap_err();
    assert!(matches!(err, FerryError::UnsupportedFeature(_)));
    assert!(err.to_string().contains("w"));
}

#[test]
fn extra_output_is_rejected_and_leaves_the_environment_clean() {
    let mut reg = OnnxOpRegister::default();
    register_all_ops(&mut reg);
    let relu = reg.lookup("Relu").unwrap();

    let mut env = Environment::default();
    env.bind("x", Value::source("x", TypedFact::new(DatumType::F32, tvec!(2))));
    let node = NodeDef::new("Relu", "n0", &["x"], &["y", "z"]);
    let err = relu.translate(&node, &mut env).unwrap_err();
    assert!(matches!(err, FerryError::InvalidGraph(_)));
    assert_eq!(env.len(), 1);
    assert!(!env.contains("y"));
}

#[test]
fn non_float_input_is_rejected() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::I32, &[2]));
    graph.outputs.push("x".into());
    assert!(matches!(translate(&graph).unwrap_err(), FerryError::UnsupportedFeature(_)));
}

#[test]
fn conv_with_bias() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 3, 32, 32]));
    graph.initializers.push(TensorDef::f32s("w", &[16, 3, 3, 3], &vec![0.1; 432]));
    graph.initializers.push(TensorDef::f32s("b", &[16], &vec![0.0; 16]));
    graph.nodes.push(
        NodeDef::new("Conv", "c0", &["x", "w", "b"], &["y"])
            .attr("kernel_shape", &[3i64, 3][..])
            .attr("pads", &[1i64, 1, 1, 1][..]),
    );
    graph.outputs.push("y".into());
    let module = translate(&graph).unwrap();
    assert_eq!(output_dims(&module), vec![1, 16, 32, 32]);
}

#[test]
fn conv_group_is_rejected_and_leaves_the_environment_clean() {
    let mut reg = OnnxOpRegister::default();
    register_all_ops(&mut reg);
    let conv = reg.lookup("Conv").unwrap();

    let mut env = Environment::default();
    env.bind("x", Value::source("x", TypedFact::new(DatumType::F32, tvec!(1, 4, 8, 8))));
    env.bind("w", Value::source("w", TypedFact::new(DatumType::F32, tvec!(8, 2, 3, 3))));
    let node = NodeDef::new("Conv", "c0", &["x", "w"], &["y"]).attr("group", 2i64);
    let err = conv.translate(&node, &mut env).unwrap_err();
    assert!(matches!(err, FerryError::UnsupportedFeature(_)));
    assert_eq!(env.len(), 2);
    assert!(!env.contains("y"));
}

#[test]
fn max_pool_ceil_mode() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 1, 7, 7]));
    graph.nodes.push(
        NodeDef::new("MaxPool", "p0", &["x"], &["y"])
            .attr("kernel_shape", &[2i64, 2][..])
            .attr("strides", &[2i64, 2][..])
            .attr("ceil_mode", 1i64),
    );
    graph.outputs.push("y".into());
    let module = translate(&graph).unwrap();
    assert_eq!(output_dims(&module), vec![1, 1, 4, 4]);
}

#[test]
fn global_average_pool() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 3, 7, 5]));
    graph.nodes.push(NodeDef::new("GlobalAveragePool", "p0", &["x"], &["y"]));
    graph.outputs.push("y".into());
    let module = translate(&graph).unwrap();
    assert_eq!(output_dims(&module), vec![1, 3, 1, 1]);
}

#[test]
fn softmax_accepts_negative_axis_and_rejects_out_of_range() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2, 3, 4]));
    graph.nodes.push(NodeDef::new("Softmax", "s0", &["x"], &["y"]).attr("axis", -1i64));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![2, 3, 4]);

    let mut bad = GraphDef::new("g");
    bad.inputs.push(ValueDef::new("x", ElemType::F32, &[2, 3, 4]));
    bad.nodes.push(NodeDef::new("Softmax", "s0", &["x"], &["y"]).attr("axis", 3i64));
    bad.outputs.push("y".into());
    assert!(matches!(translate(&bad).unwrap_err(), FerryError::InvalidGraph(_)));
}

#[test]
fn flatten_default_axis_matches_explicit_one() {
    let build = |node: NodeDef| {
        let mut graph = GraphDef::new("g");
        graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2, 3, 4, 5]));
        graph.nodes.push(node);
        graph.outputs.push("y".into());
        translate(&graph).unwrap()
    };
    let defaulted = build(NodeDef::new("Flatten", "f0", &["x"], &["y"]));
    let explicit = build(NodeDef::new("Flatten", "f0", &["x"], &["y"]).attr("axis", 1i64));
    assert_eq!(output_dims(&defaulted), vec![2, 60]);
    assert_eq!(output_dims(&defaulted), output_dims(&explicit));
    assert_eq!(defaulted.outputs()[0].op(), explicit.outputs()[0].op());

    let other = build(NodeDef::new("Flatten", "f0", &["x"], &["y"]).attr("axis", 2i64));
    assert_eq!(output_dims(&other), vec![6, 20]);
}

#[test]
fn reshape_with_constant_shape_input() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2, 3, 4]));
    graph.initializers.push(TensorDef::i64s("shape", &[2], &[6, 4]));
    graph.nodes.push(NodeDef::new("Reshape", "r0", &["x", "shape"], &["y"]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![6, 4]);
}

#[test]
fn reshape_with_symbolic_shape_is_rejected() {
    let mut reg = OnnxOpRegister::default();
    register_all_ops(&mut reg);
    let reshape = reg.lookup("Reshape").unwrap();

    let mut env = Environment::default();
    env.bind("x", Value::source("x", TypedFact::new(DatumType::F32, tvec!(2, 3))));
    env.bind("s", Value::source("s", TypedFact::new(DatumType::I64, tvec!(2))));
    let node = NodeDef::new("Reshape", "r0", &["x", "s"], &["y"]);
    let err = reshape.translate(&node, &mut env).unwrap_err();
    assert!(matches!(err, FerryError::UnsupportedFeature(_)));
}

#[test]
fn squeeze_axes_as_second_input() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 3, 1, 5]));
    graph.initializers.push(TensorDef::i64s("axes", &[2], &[0, 2]));
    graph.nodes.push(NodeDef::new("Squeeze", "s0", &["x", "axes"], &["y"]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![3, 5]);
}

#[test]
fn transpose_with_permutation() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[2, 3, 4]));
    graph
        .nodes
        .push(NodeDef::new("Transpose", "t0", &["x"], &["y"]).attr("perm", &[0i64, 2, 1][..]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![2, 4, 3]);
}

#[test]
fn concat_sums_the_axis_dim() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[1, 20, 32, 32]));
    graph.inputs.push(ValueDef::new("b", ElemType::F32, &[1, 3, 32, 32]));
    graph.inputs.push(ValueDef::new("c", ElemType::F32, &[1, 64, 32, 32]));
    graph
        .nodes
        .push(NodeDef::new("Concat", "c0", &["a", "b", "c"], &["y"]).attr("axis", 1i64));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![1, 87, 32, 32]);
}

#[test]
fn gemm_on_constants_folds_to_the_expected_values() {
    let mut graph = GraphDef::new("g");
    graph.initializers.push(TensorDef::f32s("a", &[2, 3], &[1., 2., 3., 4., 5., 6.]));
    graph.initializers.push(TensorDef::f32s("b", &[3, 2], &[1., 0., 0., 1., 1., 1.]));
    graph.initializers.push(TensorDef::f32s("c", &[2], &[1., 1.]));
    graph.nodes.push(
        NodeDef::new("Gemm", "g0", &["a", "b", "c"], &["y"])
            .attr("alpha", 2.0f32)
            .attr("beta", 3.0f32),
    );
    graph.outputs.push("y".into());
    let module = translate(&graph).unwrap();
    let out = module.outputs()[0].clone();
    assert_eq!(out.fact().unwrap().dims(), &[2, 2]);
    assert_eq!(
        out.as_const().unwrap().as_f32s().unwrap().as_slice().unwrap(),
        &[11., 13., 23., 25.]
    );
}

#[test]
fn gemm_with_transposed_operands() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[30, 20]));
    graph.initializers.push(TensorDef::f32s("b", &[50, 30], &vec![0.0; 1500]));
    graph.nodes.push(
        NodeDef::new("Gemm", "g0", &["a", "b"], &["y"])
            .attr("transA", 1i64)
            .attr("transB", 1i64),
    );
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![20, 50]);
}

#[test]
fn matmul_rank_2() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[20, 30]));
    graph.inputs.push(ValueDef::new("b", ElemType::F32, &[30, 50]));
    graph.nodes.push(NodeDef::new("MatMul", "m0", &["a", "b"], &["y"]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![20, 50]);
}

#[test]
fn matmul_collapses_leading_dims_against_rank_2() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[3, 2, 20, 30]));
    graph.initializers.push(TensorDef::f32s("b", &[30, 50], &vec![0.0; 1500]));
    graph.nodes.push(NodeDef::new("MatMul", "m0", &["a", "b"], &["y"]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![3, 2, 20, 50]);
}

#[test]
fn matmul_broadcasts_batch_dims() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[2, 3, 4, 5]));
    graph.inputs.push(ValueDef::new("b", ElemType::F32, &[1, 3, 5, 6]));
    graph.nodes.push(NodeDef::new("MatMul", "m0", &["a", "b"], &["y"]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![2, 3, 4, 6]);
}

#[test]
fn matmul_vector_operands_squeeze_back() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[30]));
    graph.inputs.push(ValueDef::new("b", ElemType::F32, &[30, 50]));
    graph.nodes.push(NodeDef::new("MatMul", "m0", &["a", "b"], &["y"]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![50]);
}

#[test]
fn matmul_contraction_mismatch_is_invalid() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("a", ElemType::F32, &[20, 30]));
    graph.inputs.push(ValueDef::new("b", ElemType::F32, &[31, 50]));
    graph.nodes.push(NodeDef::new("MatMul", "m0", &["a", "b"], &["y"]));
    graph.outputs.push("y".into());
    assert!(matches!(translate(&graph).unwrap_err(), FerryError::InvalidGraph(_)));
}

#[test]
fn resize_with_sizes_input() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 3, 32, 32]));
    graph.initializers.push(TensorDef::i64s("sizes", &[4], &[1, 3, 16, 16]));
    graph
        .nodes
        .push(NodeDef::new("Resize", "r0", &["x", "", "", "sizes"], &["y"]).attr("mode", "linear"));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![1, 3, 16, 16]);
}

#[test]
fn resize_with_scales_input() {
    let mut graph = GraphDef::new("g");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 3, 32, 32]));
    graph.initializers.push(TensorDef::f32s("scales", &[4], &[1.0, 1.0, 2.0, 2.0]));
    graph.nodes.push(NodeDef::new("Resize", "r0", &["x", "", "scales"], &["y"]));
    graph.outputs.push("y".into());
    assert_eq!(output_dims(&translate(&graph).unwrap()), vec![1, 3, 64, 64]);
}

#[test]
fn small_cnn_end_to_end() {
    let mut graph = GraphDef::new("mini_cnn");
    graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 3, 8, 8]));
    graph.initializers.push(TensorDef::f32s("w", &[4, 3, 3, 3], &vec![0.01; 108]));
    graph.initializers.push(TensorDef::f32s("fc", &[10, 64], &vec![0.01; 640]));
    graph.nodes.push(
        NodeDef::new("Conv", "conv", &["x", "w"], &["c"]).attr("pads", &[1i64, 1, 1, 1][..]),
    );
    graph.nodes.push(NodeDef::new("Relu", "relu", &["c"], &["a"]));
    graph.nodes.push(
        NodeDef::new("MaxPool", "pool", &["a"], &["p"])
            .attr("kernel_shape", &[2i64, 2][..])
            .attr("strides", &[2i64, 2][..]),
    );
    graph.nodes.push(NodeDef::new("Flatten", "flat", &["p"], &["f"]));
    graph.nodes.push(
        NodeDef::new("Gemm", "fc", &["f", "fc"], &["l"]).attr("transB", 1i64),
    );
    graph.nodes.push(NodeDef::new("Softmax", "sm", &["l"], &["y"]));
    graph.outputs.push("y".into());
    let module = translate(&graph).unwrap();
    assert_eq!(module.inputs().len(), 1);
    assert_eq!(output_dims(&module), vec![1, 10]);
}
