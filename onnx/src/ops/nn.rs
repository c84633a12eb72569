//! Neural-network operators: Conv, MaxPool, GlobalAveragePool, Relu, Softmax.

use ferry_ir::internal::*;

use crate::env::Environment;
use crate::graph::NodeDef;
use crate::infer;
use crate::ops::math::Unary;
use crate::ops::{
    check_input_arity, check_input_arity_range, check_op_type, check_output_arity, wire,
    OnnxOpRegister, OpTranslator,
};

pub fn register(reg: &mut OnnxOpRegister) {
    reg.insert("Relu", Box::new(Unary::new("Relu", ops::nn::relu)));
    reg.insert("Conv", Box::new(Conv));
    reg.insert("MaxPool", Box::new(MaxPool));
    reg.insert("GlobalAveragePool", Box::new(GlobalAveragePool));
    reg.insert("Softmax", Box::new(Softmax));
}

fn reject_auto_pad(node: &NodeDef) -> FerryResult<()> {
    let auto_pad = node.get_attr_or("auto_pad", "NOTSET");
    if auto_pad != "NOTSET" {
        bail_feature!(
            "node {} ({}): auto_pad '{}' not supported, pads must be explicit",
            node.name,
            node.op_type,
            auto_pad
        );
    }
    Ok(())
}

struct Conv;

impl OpTranslator for Conv {
    fn name(&self) -> &'static str {
        "Conv"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity_range(node, 2, 3)?;
        reject_auto_pad(node)?;
        let group = node.get_attr_or("group", 1i64);
        if group != 1 {
            bail_feature!("node {} (Conv): group {} not supported", node.name, group);
        }
        let data = env.resolve(node, &node.inputs[0])?;
        let weight = env.resolve(node, &node.inputs[1])?;
        let (w_shape, _) = infer::shape_and_dtype(&weight)?;
        if w_shape.len() != 4 {
            bail_feature!(
                "node {} (Conv): only 2-D convolution supported, weight is {:?}",
                node.name,
                w_shape
            );
        }
        // the weight tensor is authoritative for kernel geometry
        let kernel: TVec<i64> = w_shape[2..].iter().cloned().collect();
        if let Some(ks) = node.get_attr_opt_tvec::<i64>("kernel_shape")? {
            if ks != kernel {
                bail_graph!(
                    "node {} (Conv): kernel_shape {:?} contradicts weight {:?}",
                    node.name,
                    ks,
                    w_shape
                );
            }
        }
        let channels = w_shape[0];
        let strides = node.get_attr_opt_tvec::<i64>("strides")?.unwrap_or(tvec!(1, 1));
        let dilations = node.get_attr_opt_tvec::<i64>("dilations")?.unwrap_or(tvec!(1, 1));
        let pads = node.get_attr_opt_tvec::<i64>("pads")?.unwrap_or(tvec!(0, 0, 0, 0));
        let mut out =
            ops::nn::conv2d(&data, &weight, channels, &kernel, &strides, &pads, &dilations, group)?;
        if node.inputs.len() == 3 {
            let bias = env.resolve(node, &node.inputs[2])?;
            out = ops::nn::bias_add(&out, &bias, 1)?;
        }
        wire(node, env, out)
    }
}

struct MaxPool;

impl OpTranslator for MaxPool {
    fn name(&self) -> &'static str {
        "MaxPool"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        // a second output asks for indices, reject that before the generic
        // single-output check turns it into a graph error
        if node.outputs.len() > 1 {
            bail_feature!("node {} (MaxPool): indices output not supported", node.name);
        }
        check_output_arity(node, 1)?;
        check_input_arity(node, 1)?;
        reject_auto_pad(node)?;
        if node.get_attr_or("storage_order", 0i64) != 0 {
            bail_feature!("node {} (MaxPool): column-major storage_order not supported", node.name);
        }
        let kernel = node.get_attr_tvec::<i64>("kernel_shape")?;
        if kernel.len() != 2 {
            bail_feature!(
                "node {} (MaxPool): only 2-D pooling supported, kernel_shape is {:?}",
                node.name,
                kernel
            );
        }
        let strides = node.get_attr_opt_tvec::<i64>("strides")?.unwrap_or(tvec!(1, 1));
        let dilations = node.get_attr_opt_tvec::<i64>("dilations")?.unwrap_or(tvec!(1, 1));
        let pads = node.get_attr_opt_tvec::<i64>("pads")?.unwrap_or(tvec!(0, 0, 0, 0));
        let ceil_mode = node.get_attr_or("ceil_mode", 0i64) != 0;
        let data = env.resolve(node, &node.inputs[0])?;
        wire(node, env, ops::nn::max_pool2d(&data, &kernel, &strides, &pads, &dilations, ceil_mode)?)
    }
}

struct GlobalAveragePool;

impl OpTranslator for GlobalAveragePool {
    fn name(&self) -> &'static str {
        "GlobalAveragePool"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 1)?;
        let data = env.resolve(node, &node.inputs[0])?;
        let rank = infer::rank(&data)?;
        if !(3..=5).contains(&rank) {
            bail_feature!(
                "node {} (GlobalAveragePool): rank {} input not supported",
                node.name,
                rank
            );
        }
        wire(node, env, ops::nn::global_avg_pool(&data, rank - 2)?)
    }
}

struct Softmax;

impl OpTranslator for Softmax {
    fn name(&self) -> &'static str {
        "Softmax"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 1)?;
        let data = env.resolve(node, &node.inputs[0])?;
        let rank = infer::rank(&data)? as i64;
        let axis = node.get_attr_or("axis", -1i64);
        if axis < -rank || axis >= rank {
            bail_graph!(
                "node {} (Softmax): axis {} out of range for rank {}",
                node.name,
                axis,
                rank
            );
        }
        let axis = if axis < 0 { axis + rank } else { axis } as usize;
        wire(node, env, ops::nn::softmax(&data, axis)?)
    }
}
