//! Tensor shuffling operators: Concat, Flatten, Reshape, Squeeze, Transpose.

use ferry_ir::internal::*;

use crate::env::Environment;
use crate::graph::NodeDef;
use crate::infer;
use crate::ops::{
    check_input_arity, check_input_arity_range, check_op_type, check_output_arity, wire,
    OnnxOpRegister, OpTranslator,
};

pub fn register(reg: &mut OnnxOpRegister) {
    reg.insert("Concat", Box::new(Concat));
    reg.insert("Flatten", Box::new(Flatten));
    reg.insert("Reshape", Box::new(Reshape));
    reg.insert("Squeeze", Box::new(Squeeze));
    reg.insert("Transpose", Box::new(Transpose));
}

/// Resolves an operand that must be a constant int64 vector, typically a
/// shape or axes input.
fn resolve_const_i64s(
    node: &NodeDef,
    env: &Environment,
    name: &str,
    role: &str,
) -> FerryResult<Vec<i64>> {
    let value = fold(&env.resolve(node, name)?)?;
    match value.as_const() {
        Some(t) => t.to_i64_vec(),
        None => bail_feature!(
            "node {} ({}): {} input {} is not a constant",
            node.name,
            node.op_type,
            role,
            name
        ),
    }
}

struct Concat;

impl OpTranslator for Concat {
    fn name(&self) -> &'static str {
        "Concat"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        if node.inputs.is_empty() {
            bail_graph!("node {} (Concat): no inputs", node.name);
        }
        let axis = node.get_attr::<i64>("axis")?;
        let inputs: TVec<Value> =
            node.inputs.iter().map(|i| env.resolve(node, i)).collect::<FerryResult<_>>()?;
        wire(node, env, ops::array::concat(axis, &inputs)?)
    }
}

struct Flatten;

impl OpTranslator for Flatten {
    fn name(&self) -> &'static str {
        "Flatten"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 1)?;
        let data = env.resolve(node, &node.inputs[0])?;
        let (shape, _) = infer::shape_and_dtype(&data)?;
        let rank = shape.len() as i64;
        let axis = node.get_attr_or("axis", 1i64);
        if axis < -rank || axis > rank {
            bail_graph!(
                "node {} (Flatten): axis {} out of range for rank {}",
                node.name,
                axis,
                rank
            );
        }
        let axis = if axis < 0 { axis + rank } else { axis } as usize;
        let out = if axis == 1 {
            ops::nn::batch_flatten(&data)?
        } else {
            let product = |dims: &[i64]| if dims.iter().all(|d| *d >= 0) {
                dims.iter().product()
            } else {
                -1i64
            };
            let (head, tail) = (product(&shape[..axis]), product(&shape[axis..]));
            if head < 0 && tail < 0 {
                bail_feature!(
                    "node {} (Flatten): both collapsed dims unknown in {:?}",
                    node.name,
                    shape
                );
            }
            ops::array::reshape(&data, &[head, tail], false)?
        };
        wire(node, env, out)
    }
}

struct Reshape;

impl OpTranslator for Reshape {
    fn name(&self) -> &'static str {
        "Reshape"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 2)?;
        let data = env.resolve(node, &node.inputs[0])?;
        let shape = resolve_const_i64s(node, env, &node.inputs[1], "shape")?;
        let allow_zero = node.get_attr_or("allowzero", 0i64) != 0;
        wire(node, env, ops::array::reshape(&data, &shape, allow_zero)?)
    }
}

struct Squeeze;

impl OpTranslator for Squeeze {
    fn name(&self) -> &'static str {
        "Squeeze"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity_range(node, 1, 2)?;
        let data = env.resolve(node, &node.inputs[0])?;
        // axes moved from an attribute to an input in opset 13
        let axes: Option<Vec<i64>> = if node.inputs.len() == 2 {
            Some(resolve_const_i64s(node, env, &node.inputs[1], "axes")?)
        } else {
            node.get_attr_opt_tvec::<i64>("axes")?.map(|a| a.to_vec())
        };
        wire(node, env, ops::array::squeeze(&data, axes.as_deref())?)
    }
}

struct Transpose;

impl OpTranslator for Transpose {
    fn name(&self) -> &'static str {
        "Transpose"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 1)?;
        let data = env.resolve(node, &node.inputs[0])?;
        let perm = node.get_attr_opt_tvec::<i64>("perm")?;
        wire(node, env, ops::array::transpose(&data, perm.as_deref())?)
    }
}
