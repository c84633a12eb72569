//! Per-operator translators and their registry.

use std::collections::HashMap;
use std::fmt;

use ferry_ir::internal::*;

use crate::env::Environment;
use crate::graph::NodeDef;

pub mod array;
pub mod math;
pub mod nn;
pub mod resize;

/// Translates one node of a graph into IR.
///
/// A translator reads the node's attributes, resolves its inputs in the
/// environment, emits IR and binds the node's output name. On error the
/// environment must be left untouched, so a failed node never poisons
/// later diagnostics.
pub trait OpTranslator: Send + Sync {
    fn name(&self) -> &'static str;
    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value>;
}

/// String-keyed registry of operator translators.
#[derive(Default)]
pub struct OnnxOpRegister(HashMap<String, Box<dyn OpTranslator>>);

impl fmt::Debug for OnnxOpRegister {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&str> = self.0.keys().map(|s| &**s).collect();
        names.sort_unstable();
        write!(f, "OnnxOpRegister {{ {} }}", names.join(", "))
    }
}

impl OnnxOpRegister {
    /// Registers a translator under `name`. Re-registering replaces the
    /// previous translator without growing the registry.
    pub fn insert(&mut self, name: &str, translator: Box<dyn OpTranslator>) {
        self.0.insert(name.to_string(), translator);
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn OpTranslator> {
        self.0.get(name).map(|t| &**t)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn register_all_ops(reg: &mut OnnxOpRegister) {
    array::register(reg);
    math::register(reg);
    nn::register(reg);
    resize::register(reg);
}

pub(crate) fn check_op_type(node: &NodeDef, expected: &str) -> FerryResult<()> {
    if node.op_type != expected {
        bail_graph!(
            "node {} is a {}, dispatched to the {} translator",
            node.name,
            node.op_type,
            expected
        );
    }
    Ok(())
}

pub(crate) fn check_input_arity(node: &NodeDef, expected: usize) -> FerryResult<()> {
    if node.inputs.len() != expected {
        bail_graph!(
            "node {} ({}): expected {} inputs, got {}",
            node.name,
            node.op_type,
            expected,
            node.inputs.len()
        );
    }
    Ok(())
}

pub(crate) fn check_input_arity_range(
    node: &NodeDef,
    min: usize,
    max: usize,
) -> FerryResult<()> {
    if node.inputs.len() < min || node.inputs.len() > max {
        bail_graph!(
            "node {} ({}): expected {} to {} inputs, got {}",
            node.name,
            node.op_type,
            min,
            max,
            node.inputs.len()
        );
    }
    Ok(())
}

pub(crate) fn check_output_arity(node: &NodeDef, expected: usize) -> FerryResult<()> {
    if node.outputs.len() != expected {
        bail_graph!(
            "node {} ({}): expected {} outputs, got {}",
            node.name,
            node.op_type,
            expected,
            node.outputs.len()
        );
    }
    Ok(())
}

/// Folds `value` and binds it to the node's single output. Translators call
/// this last, after all fallible work, so the environment stays clean when
/// they bail out earlier. Output arity has already been validated in the
/// translator prologue.
pub(crate) fn wire(node: &NodeDef, env: &mut Environment, value: Value) -> FerryResult<Value> {
    let value = fold(&value)?;
    env.bind(&*node.outputs[0], value.clone());
    Ok(value)
}
