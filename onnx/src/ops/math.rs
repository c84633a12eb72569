//! Arithmetic operators: elementwise, Gemm and MatMul.

use ferry_ir::internal::*;

use crate::env::Environment;
use crate::graph::NodeDef;
use crate::infer;
use crate::ops::{
    check_input_arity, check_input_arity_range, check_op_type, check_output_arity, wire,
    OnnxOpRegister, OpTranslator,
};

pub fn register(reg: &mut OnnxOpRegister) {
    reg.insert("Add", Box::new(Binary::new("Add", ops::math::add)));
    reg.insert("Sub", Box::new(Binary::new("Sub", ops::math::sub)));
    reg.insert("Mul", Box::new(Binary::new("Mul", ops::math::mul)));
    reg.insert("Pow", Box::new(Binary::new("Pow", ops::math::pow)));
    reg.insert("Sqrt", Box::new(Unary::new("Sqrt", ops::math::sqrt)));
    reg.insert("Erf", Box::new(Unary::new("Erf", ops::math::erf)));
    reg.insert("Gemm", Box::new(Gemm));
    reg.insert("MatMul", Box::new(MatMul));
}

/// A two-operand operator mapping straight onto one IR primitive.
pub(crate) struct Binary {
    name: &'static str,
    build: fn(&Value, &Value) -> FerryResult<Value>,
}

impl Binary {
    pub(crate) fn new(name: &'static str, build: fn(&Value, &Value) -> FerryResult<Value>) -> Binary {
        Binary { name, build }
    }
}

impl OpTranslator for Binary {
    fn name(&self) -> &'static str {
        self.name
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 2)?;
        let a = env.resolve(node, &node.inputs[0])?;
        let b = env.resolve(node, &node.inputs[1])?;
        wire(node, env, (self.build)(&a, &b)?)
    }
}

/// A one-operand operator mapping straight onto one IR primitive.
pub(crate) struct Unary {
    name: &'static str,
    build: fn(&Value) -> FerryResult<Value>,
}

impl Unary {
    pub(crate) fn new(name: &'static str, build: fn(&Value) -> FerryResult<Value>) -> Unary {
        Unary { name, build }
    }
}

impl OpTranslator for Unary {
    fn name(&self) -> &'static str {
        self.name
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 1)?;
        let a = env.resolve(node, &node.inputs[0])?;
        wire(node, env, (self.build)(&a)?)
    }
}

struct Gemm;

impl OpTranslator for Gemm {
    fn name(&self) -> &'static str {
        "Gemm"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity_range(node, 2, 3)?;
        let mut a = env.resolve(node, &node.inputs[0])?;
        let b = env.resolve(node, &node.inputs[1])?;
        let alpha = node.get_attr_or("alpha", 1f32);
        let beta = node.get_attr_or("beta", 1f32);
        let trans_a = node.get_attr_or("transA", 0i64) != 0;
        let trans_b = node.get_attr_or("transB", 0i64) != 0;
        if infer::rank(&a)? != 2 || infer::rank(&b)? != 2 {
            bail_graph!("node {} (Gemm): operands must be rank 2", node.name);
        }
        if trans_a {
            a = ops::array::transpose(&a, Some(&[1, 0]))?;
        }
        if (alpha - 1.0).abs() > 1e-6 {
            a = ops::math::mul(&a, &Value::konst(Tensor::scalar_f32(alpha)))?;
        }
        // dense contracts against the second dim of its weight, so a
        // non-transposed B gets transposed and a transposed one passes through
        let weight = if trans_b { b } else { ops::array::transpose(&b, Some(&[1, 0]))? };
        let mut out = ops::nn::dense(&a, &weight)?;
        if node.inputs.len() == 3 {
            let mut c = env.resolve(node, &node.inputs[2])?;
            if (beta - 1.0).abs() > 1e-6 {
                c = ops::math::mul(&c, &Value::konst(Tensor::scalar_f32(beta)))?;
            }
            out = ops::math::add(&out, &c)?;
        }
        wire(node, env, out)
    }
}

struct MatMul;

impl MatMul {
    /// `a` at rank > 2 against a rank-2 `b`: collapse the leading dims of
    /// `a`, run one dense, expand back.
    fn collapsed(a: &Value, b: &Value, a_shape: &[i64], n: i64) -> FerryResult<Value> {
        let k = a_shape[a_shape.len() - 1];
        let flat = ops::array::reshape(a, &[-1, k], false)?;
        let weight = ops::array::transpose(b, Some(&[1, 0]))?;
        let out = ops::nn::dense(&flat, &weight)?;
        let mut final_shape: TVec<i64> = a_shape[..a_shape.len() - 1].iter().cloned().collect();
        final_shape.push(n);
        ops::array::reshape(&out, &final_shape, false)
    }

    /// The general broadcasting case: align both operands on a common batch
    /// shape, collapse it to one dim, run a batched matmul, expand back.
    fn batched(
        node: &NodeDef,
        a: &Value,
        b: &Value,
        a_shape: &[i64],
        b_shape: &[i64],
    ) -> FerryResult<Value> {
        if a_shape.iter().any(|d| *d < 0) || b_shape.iter().any(|d| *d < 0) {
            bail_feature!(
                "node {} (MatMul): broadcasting batched operands of partially unknown shape",
                node.name
            );
        }
        let (m, k) = (a_shape[a_shape.len() - 2], a_shape[a_shape.len() - 1]);
        let n = b_shape[b_shape.len() - 1];
        let batch =
            multi_broadcast(&[&a_shape[..a_shape.len() - 2], &b_shape[..b_shape.len() - 2]])?;
        let flat_batch: i64 = batch.iter().product();

        let mut a_full: TVec<i64> = batch.clone();
        a_full.extend([m, k]);
        let mut a = a.clone();
        if a_shape != &a_full[..] {
            a = ops::array::broadcast_to(&a, &a_full)?;
        }
        let a = ops::array::reshape(&a, &[flat_batch, m, k], false)?;

        let mut b_full: TVec<i64> = batch.clone();
        b_full.extend([k, n]);
        let mut b = b.clone();
        if b_shape != &b_full[..] {
            b = ops::array::broadcast_to(&b, &b_full)?;
        }
        let b = ops::array::reshape(&b, &[flat_batch, k, n], false)?;

        let out = ops::nn::batch_matmul(&a, &b)?;
        let mut final_shape = batch;
        final_shape.extend([m, n]);
        ops::array::reshape(&out, &final_shape, false)
    }
}

impl OpTranslator for MatMul {
    fn name(&self) -> &'static str {
        "MatMul"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity(node, 2)?;
        let mut a = env.resolve(node, &node.inputs[0])?;
        let mut b = env.resolve(node, &node.inputs[1])?;

        // rank-1 operands borrow a unit dim for the product and give it back
        let a_was_vector = infer::rank(&a)? == 1;
        if a_was_vector {
            let k = a.fact()?.dims()[0];
            a = ops::array::reshape(&a, &[1, k], false)?;
        }
        let b_was_vector = infer::rank(&b)? == 1;
        if b_was_vector {
            let k = b.fact()?.dims()[0];
            b = ops::array::reshape(&b, &[k, 1], false)?;
        }

        let (a_shape, _) = infer::shape_and_dtype(&a)?;
        let (b_shape, _) = infer::shape_and_dtype(&b)?;
        let (ka, kb) = (a_shape[a_shape.len() - 1], b_shape[b_shape.len() - 2]);
        if ka >= 0 && kb >= 0 && ka != kb {
            bail_graph!(
                "node {} (MatMul): contraction dims differ, {:?} against {:?}",
                node.name,
                a_shape,
                b_shape
            );
        }

        let mut out = if a_shape.len() == 2 && b_shape.len() == 2 {
            let weight = ops::array::transpose(&b, Some(&[1, 0]))?;
            ops::nn::dense(&a, &weight)?
        } else if b_shape.len() == 2
            && a_shape[..a_shape.len() - 1].iter().filter(|d| **d < 0).count() <= 1
        {
            Self::collapsed(&a, &b, &a_shape, b_shape[1])?
        } else {
            Self::batched(node, &a, &b, &a_shape, &b_shape)?
        };

        let out_rank = infer::rank(&out)? as i64;
        let mut squeezed: TVec<i64> = tvec!();
        if a_was_vector {
            squeezed.push(out_rank - 2);
        }
        if b_was_vector {
            squeezed.push(out_rank - 1);
        }
        if !squeezed.is_empty() {
            out = ops::array::squeeze(&out, Some(&squeezed))?;
        }
        wire(node, env, out)
    }
}
