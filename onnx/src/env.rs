//! The translation environment: the name-to-value map threaded through a
//! graph translation.

use std::collections::HashMap;

use ferry_ir::prelude::*;

use crate::graph::NodeDef;

/// Maps graph value names to the IR values already built for them.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
}

impl Environment {
    /// Binds `name` to `value`, shadowing any previous binding. Initializer
    /// handling relies on the shadowing to override declared inputs.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        trace!("binding {} to {:?}", name, value.op());
        self.values.insert(name, value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Resolves one input of `node`. An empty or unbound name is a graph
    /// error naming both the node and the input.
    pub fn resolve(&self, node: &NodeDef, name: &str) -> FerryResult<Value> {
        if name.is_empty() {
            bail_graph!("node {} ({}): empty input name", node.name, node.op_type);
        }
        match self.values.get(name) {
            Some(value) => Ok(value.clone()),
            None => bail_graph!(
                "node {} ({}): input {} not found",
                node.name,
                node.op_type,
                name
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
