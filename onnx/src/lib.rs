//! # Ferry ONNX front end
//!
//! Translates an in-memory ONNX-style graph into a [`ferry_ir::module::Module`],
//! one node at a time, through a registry of per-operator translators.
//!
//! ```rust
//! use ferry_onnx::graph::{ElemType, GraphDef, NodeDef, ValueDef};
//!
//! let mut graph = GraphDef::new("squarer");
//! graph.inputs.push(ValueDef::new("x", ElemType::F32, &[1, 4]));
//! graph.nodes.push(NodeDef::new("Mul", "sq", &["x", "x"], &["y"]));
//! graph.outputs.push("y".to_string());
//!
//! let module = ferry_onnx::onnx().translate(&graph).unwrap();
//! assert_eq!(module.inputs().len(), 1);
//! ```

#[macro_use]
extern crate log;

pub mod attrs;
pub mod env;
pub mod graph;
pub mod infer;
pub mod model;
pub mod ops;

pub mod prelude {
    pub use crate::model::Onnx;
    pub use crate::onnx;
}

/// An ONNX translation context with every supported operator registered.
pub fn onnx() -> model::Onnx {
    let mut ops = ops::OnnxOpRegister::default();
    ops::register_all_ops(&mut ops);
    model::Onnx::new(ops)
}
