//! Constant folding.
//!
//! [`fold`] is invoked by front ends after each translation step, so folding
//! must be cheap on already-folded graphs: constants and sources are returned
//! untouched, and a node whose operands did not change keeps its identity.

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};

use crate::error::FerryResult;
use crate::expr::{OpKind, Value};
use crate::tensor::{Tensor, TensorData};
use crate::TVec;

/// Recursively replaces every computable subexpression of `value` with an
/// embedded constant. Idempotent.
pub fn fold(value: &Value) -> FerryResult<Value> {
    if value.is_const() || value.is_source() {
        return Ok(value.clone());
    }
    let mut changed = false;
    let inputs: TVec<Value> = value
        .inputs()
        .iter()
        .map(|i| {
            let folded = fold(i)?;
            changed |= !folded.same_as(i);
            Ok(folded)
        })
        .collect::<FerryResult<_>>()?;
    let node = if changed { value.with_inputs(inputs) } else { value.clone() };
    if matches!(node.op(), OpKind::Tuple) {
        return Ok(node);
    }
    match evaluate(&node)? {
        Some(t) => {
            log::trace!("folded {:?} to a constant of shape {:?}", node.op(), t.shape());
            Ok(Value::konst(t))
        }
        None => Ok(node),
    }
}

fn evaluate(node: &Value) -> FerryResult<Option<Tensor>> {
    // shape reflection only needs the operand's fact, not its data
    if matches!(node.op(), OpKind::ShapeOf) {
        let input = node.inputs()[0].fact()?;
        if input.is_concrete() {
            return Ok(Some(Tensor::i64s(&[input.rank()], input.dims())?));
        }
        return Ok(None);
    }
    if !node.inputs().iter().all(Value::is_const) {
        return Ok(None);
    }
    let dims = node.fact()?.dims();
    if dims.iter().any(|d| *d < 0) {
        return Ok(None);
    }
    let shape: Vec<usize> = dims.iter().map(|d| *d as usize).collect();
    let operands: TVec<&Tensor> = node
        .inputs()
        .iter()
        .map(|i| match i.as_const() {
            Some(t) => Ok(t),
            None => bail_construction!("folding a non-constant operand"),
        })
        .collect::<FerryResult<_>>()?;
    let folded = match node.op() {
        OpKind::Add => eval_binary(operands[0], operands[1], &shape, |a, b| a + b, |a, b| a + b)?,
        OpKind::Sub => eval_binary(operands[0], operands[1], &shape, |a, b| a - b, |a, b| a - b)?,
        OpKind::Mul => eval_binary(operands[0], operands[1], &shape, |a, b| a * b, |a, b| a * b)?,
        OpKind::Pow => match (operands[0].data(), operands[1].data()) {
            (TensorData::F32(a), TensorData::F32(b)) => {
                let a = broadcast_view(a, &shape)?;
                let b = broadcast_view(b, &shape)?;
                Some(Zip::from(&a).and(&b).map_collect(|x, y| x.powf(*y)).into())
            }
            _ => None,
        },
        OpKind::Sqrt => eval_unary_f32(operands[0], |x| x.sqrt()),
        OpKind::Erf => eval_unary_f32(operands[0], erf_scalar),
        OpKind::Relu => match operands[0].data() {
            TensorData::F32(a) => Some(a.mapv(|x| x.max(0.0)).into()),
            TensorData::I64(a) => Some(a.mapv(|x| x.max(0)).into()),
        },
        OpKind::Cast { to } => Some(operands[0].cast_to(*to)),
        OpKind::Dense => eval_dense(operands[0], operands[1])?,
        OpKind::Concat { axis } => eval_concat(&operands, *axis)?,
        OpKind::Slice { begin, end } => eval_slice(operands[0], *begin, *end)?,
        OpKind::Reshape { .. } | OpKind::Squeeze { .. } | OpKind::BatchFlatten => {
            eval_reshape(operands[0], &shape)?
        }
        OpKind::BroadcastTo { .. } => eval_broadcast(operands[0], &shape)?,
        OpKind::Transpose { perm } => eval_transpose(operands[0], perm.as_deref()),
        _ => None,
    };
    Ok(folded)
}

fn broadcast_view<'a, T>(
    a: &'a ArrayD<T>,
    shape: &[usize],
) -> FerryResult<ArrayViewD<'a, T>> {
    match a.broadcast(IxDyn(shape)) {
        Some(view) => Ok(view),
        None => bail_construction!("can not broadcast {:?} to {:?} while folding", a.shape(), shape),
    }
}

fn eval_binary(
    a: &Tensor,
    b: &Tensor,
    shape: &[usize],
    ff: impl Fn(f32, f32) -> f32,
    fi: impl Fn(i64, i64) -> i64,
) -> FerryResult<Option<Tensor>> {
    let folded = match (a.data(), b.data()) {
        (TensorData::F32(a), TensorData::F32(b)) => {
            let a = broadcast_view(a, shape)?;
            let b = broadcast_view(b, shape)?;
            Some(Zip::from(&a).and(&b).map_collect(|x, y| ff(*x, *y)).into())
        }
        (TensorData::I64(a), TensorData::I64(b)) => {
            let a = broadcast_view(a, shape)?;
            let b = broadcast_view(b, shape)?;
            Some(Zip::from(&a).and(&b).map_collect(|x, y| fi(*x, *y)).into())
        }
        _ => None,
    };
    Ok(folded)
}

fn eval_unary_f32(a: &Tensor, f: impl Fn(f32) -> f32) -> Option<Tensor> {
    a.as_f32s().map(|a| a.mapv(&f).into())
}

// dense contracts data (m, k) against weight (n, k)
fn eval_dense(data: &Tensor, weight: &Tensor) -> FerryResult<Option<Tensor>> {
    let folded = match (data.data(), weight.data()) {
        (TensorData::F32(d), TensorData::F32(w)) => {
            let d = match d.view().into_dimensionality::<ndarray::Ix2>() {
                Ok(d) => d,
                Err(e) => bail_construction!("folding dense: {}", e),
            };
            let w = match w.view().into_dimensionality::<ndarray::Ix2>() {
                Ok(w) => w,
                Err(e) => bail_construction!("folding dense: {}", e),
            };
            Some(d.dot(&w.t()).into_dyn().into())
        }
        _ => None,
    };
    Ok(folded)
}

fn eval_concat(operands: &[&Tensor], axis: usize) -> FerryResult<Option<Tensor>> {
    let folded = match operands[0].data() {
        TensorData::F32(_) => {
            let views: Option<Vec<ArrayViewD<f32>>> =
                operands.iter().map(|t| t.as_f32s().map(|a| a.view())).collect();
            match views {
                Some(views) => match ndarray::concatenate(Axis(axis), &views) {
                    Ok(array) => Some(array.into()),
                    Err(e) => bail_construction!("folding concat: {}", e),
                },
                None => None,
            }
        }
        TensorData::I64(_) => {
            let views: Option<Vec<ArrayViewD<i64>>> =
                operands.iter().map(|t| t.as_i64s().map(|a| a.view())).collect();
            match views {
                Some(views) => match ndarray::concatenate(Axis(axis), &views) {
                    Ok(array) => Some(array.into()),
                    Err(e) => bail_construction!("folding concat: {}", e),
                },
                None => None,
            }
        }
    };
    Ok(folded)
}

fn eval_slice(a: &Tensor, begin: i64, end: i64) -> FerryResult<Option<Tensor>> {
    let (begin, end) = (begin as usize, end as usize);
    let folded = match a.data() {
        TensorData::F32(a) => {
            let values: Vec<f32> = a.iter().skip(begin).take(end - begin).cloned().collect();
            Some(Tensor::f32s(&[end - begin], &values)?)
        }
        TensorData::I64(a) => {
            let values: Vec<i64> = a.iter().skip(begin).take(end - begin).cloned().collect();
            Some(Tensor::i64s(&[end - begin], &values)?)
        }
    };
    Ok(folded)
}

fn eval_reshape(a: &Tensor, shape: &[usize]) -> FerryResult<Option<Tensor>> {
    let folded = match a.data() {
        TensorData::F32(a) => {
            let values: Vec<f32> = a.iter().cloned().collect();
            Some(Tensor::f32s(shape, &values)?)
        }
        TensorData::I64(a) => {
            let values: Vec<i64> = a.iter().cloned().collect();
            Some(Tensor::i64s(shape, &values)?)
        }
    };
    Ok(folded)
}

fn eval_broadcast(a: &Tensor, shape: &[usize]) -> FerryResult<Option<Tensor>> {
    let folded = match a.data() {
        TensorData::F32(a) => Some(broadcast_view(a, shape)?.to_owned().into()),
        TensorData::I64(a) => Some(broadcast_view(a, shape)?.to_owned().into()),
    };
    Ok(folded)
}

fn eval_transpose(a: &Tensor, perm: Option<&[i64]>) -> Option<Tensor> {
    let rank = a.rank();
    let perm: Vec<usize> = match perm {
        Some(perm) => {
            perm.iter().map(|&p| if p < 0 { (p + rank as i64) as usize } else { p as usize }).collect()
        }
        None => (0..rank).rev().collect(),
    };
    match a.data() {
        TensorData::F32(a) => {
            let permuted = a.clone().permuted_axes(&perm[..]);
            Some(ArrayD::from_shape_vec(permuted.raw_dim(), permuted.iter().cloned().collect())
                .ok()?
                .into())
        }
        TensorData::I64(a) => {
            let permuted = a.clone().permuted_axes(&perm[..]);
            Some(ArrayD::from_shape_vec(permuted.raw_dim(), permuted.iter().cloned().collect())
                .ok()?
                .into())
        }
    }
}

// Abramowitz & Stegun 7.1.26, max absolute error 1.5e-7
fn erf_scalar(x: f32) -> f32 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly =
        ((((1.061405429 * t - 1.453152027) * t + 1.421413741) * t - 0.284496736) * t + 0.254829592)
            * t;
    sign * (1.0 - poly * (-x * x).exp())
}
