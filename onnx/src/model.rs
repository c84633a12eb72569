//! Whole-graph translation.

use ferry_ir::internal::*;

use crate::env::Environment;
use crate::graph::{GraphDef, TensorDef, ValueDef};
use crate::ops::OnnxOpRegister;

/// An ONNX translation context: the operator registry plus the staged
/// graph-to-module translation driver.
#[derive(Debug)]
pub struct Onnx {
    pub op_register: OnnxOpRegister,
}

impl Onnx {
    pub fn new(op_register: OnnxOpRegister) -> Onnx {
        Onnx { op_register }
    }

    /// Translates a whole graph into an IR module.
    ///
    /// Stages: bind declared inputs, override them with initializers,
    /// translate nodes in graph order, resolve declared outputs, assemble.
    pub fn translate(&self, graph: &GraphDef) -> FerryResult<Module> {
        info!(
            "translating graph {} ({} nodes, {} initializers)",
            graph.name,
            graph.nodes.len(),
            graph.initializers.len()
        );
        let mut env = Environment::default();
        self.bind_inputs(graph, &mut env)?;
        self.bind_initializers(graph, &mut env)?;

        // an initializer shadowing an input turns it into a constant, so
        // only still-symbolic inputs become module parameters
        let params: TVec<Value> = graph
            .inputs
            .iter()
            .filter_map(|i| env.lookup(&i.name))
            .filter(|v| v.is_source())
            .cloned()
            .collect();

        self.translate_nodes(graph, &mut env)?;
        let body = self.resolve_outputs(graph, &env)?;
        Ok(Module::new(params, body))
    }

    fn bind_inputs(&self, graph: &GraphDef, env: &mut Environment) -> FerryResult<()> {
        for input in &graph.inputs {
            let ValueDef { name, elem_type, shape } = input;
            if name.is_empty() {
                bail_graph!("graph {}: input with an empty name", graph.name);
            }
            if *elem_type != crate::graph::ElemType::F32 {
                bail_feature!(
                    "graph {}: input {} has element type {}, only float32 inputs supported",
                    graph.name,
                    name,
                    elem_type
                );
            }
            let fact = TypedFact::new(DatumType::F32, shape.iter().cloned().collect());
            trace!("input {}: {}", name, fact);
            env.bind(&**name, Value::source(&**name, fact));
        }
        Ok(())
    }

    fn bind_initializers(&self, graph: &GraphDef, env: &mut Environment) -> FerryResult<()> {
        for init in &graph.initializers {
            let TensorDef { name, elem_type, shape, data, external } = init;
            if *external {
                bail_feature!(
                    "graph {}: initializer {} uses external data",
                    graph.name,
                    name
                );
            }
            let dt = match elem_type.to_datum_type() {
                Some(dt) => dt,
                None => bail_feature!(
                    "graph {}: initializer {} has element type {}",
                    graph.name,
                    name,
                    elem_type
                ),
            };
            if shape.iter().any(|d| *d < 0) {
                bail_graph!(
                    "graph {}: initializer {} has unknown dims in {:?}",
                    graph.name,
                    name,
                    shape
                );
            }
            let dims: TVec<usize> = shape.iter().map(|d| *d as usize).collect();
            let tensor = Tensor::from_raw(dt, &dims, data)?;
            trace!("initializer {}: {} {:?}", name, dt, shape);
            env.bind(&**name, Value::konst(tensor));
        }
        Ok(())
    }

    fn translate_nodes(&self, graph: &GraphDef, env: &mut Environment) -> FerryResult<()> {
        for node in &graph.nodes {
            let op = match self.op_register.lookup(&node.op_type) {
                Some(op) => op,
                None => {
                    return Err(FerryError::UnsupportedOperator(format!(
                        "node {}: operator {} is not supported",
                        node.name, node.op_type
                    )))
                }
            };
            debug!("translating node {} ({})", node.name, node.op_type);
            op.translate(node, env)?;
        }
        Ok(())
    }

    fn resolve_outputs(&self, graph: &GraphDef, env: &Environment) -> FerryResult<Value> {
        if graph.outputs.is_empty() {
            bail_graph!("graph {}: no outputs declared", graph.name);
        }
        let mut outputs: TVec<Value> = graph
            .outputs
            .iter()
            .map(|name| match env.lookup(name) {
                Some(value) => Ok(value.clone()),
                None => bail_graph!("graph {}: output {} not found", graph.name, name),
            })
            .collect::<FerryResult<_>>()?;
        if outputs.len() == 1 {
            Ok(outputs.remove(0))
        } else {
            Value::tuple(outputs)
        }
    }
}
