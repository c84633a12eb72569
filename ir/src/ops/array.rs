//! Tensor shuffling primitives: reshape, transpose, concat, squeeze,
//! broadcast, slicing and shape reflection.

use crate::broadcast::multi_broadcast;
use crate::datum::DatumType;
use crate::error::FerryResult;
use crate::expr::{OpKind, Value};
use crate::fact::TypedFact;
use crate::ops::normalize_axis;
use crate::TVec;

/// Reshapes `data` to `shape`. One `-1` entry is inferred from the element
/// count; a `0` entry copies the input dimension at the same position unless
/// `allow_zero` is set, in which case it is a genuine zero dimension.
pub fn reshape(data: &Value, shape: &[i64], allow_zero: bool) -> FerryResult<Value> {
    let d = data.fact()?;
    if shape.iter().filter(|x| **x == -1).count() > 1 {
        bail_construction!("reshape: more than one -1 in target shape {:?}", shape);
    }
    let mut dims: TVec<i64> = shape
        .iter()
        .enumerate()
        .map(|(ix, &dim)| {
            if dim == 0 && !allow_zero {
                if ix >= d.rank() {
                    bail_construction!(
                        "reshape: dim 0 at position {} has no counterpart in input {}",
                        ix,
                        d
                    );
                }
                Ok(d.dims()[ix])
            } else {
                Ok(dim)
            }
        })
        .collect::<FerryResult<_>>()?;
    if let Some(pos) = dims.iter().position(|x| *x == -1) {
        if let Some(volume) = d.volume() {
            let known: i64 = dims.iter().filter(|x| **x >= 0).product();
            if known > 0 && volume % known == 0 {
                dims[pos] = volume / known;
            } else {
                bail_construction!("reshape: can not infer -1 in {:?} from input {}", shape, d);
            }
        }
    }
    if let (Some(before), Some(after)) =
        (d.volume(), dims.iter().all(|x| *x >= 0).then(|| dims.iter().product::<i64>()))
    {
        if before != after {
            bail_construction!("reshape: element count mismatch, {} to {:?}", d, dims);
        }
    }
    let fact = TypedFact::new(d.datum_type, dims);
    let op = OpKind::Reshape { shape: shape.iter().cloned().collect(), allow_zero };
    Ok(Value::build(op, tvec!(data.clone()), fact))
}

/// Permutes axes. With no permutation given, reverses them.
pub fn transpose(data: &Value, perm: Option<&[i64]>) -> FerryResult<Value> {
    let d = data.fact()?;
    let rank = d.rank();
    let dims: TVec<i64> = match perm {
        Some(perm) => {
            let mut seen = vec![false; rank];
            if perm.len() != rank {
                bail_construction!("transpose: perm {:?} does not cover input {}", perm, d);
            }
            for &axis in perm {
                let ix = normalize_axis("transpose", axis, rank)?;
                if seen[ix] {
                    bail_construction!("transpose: perm {:?} is not a permutation", perm);
                }
                seen[ix] = true;
            }
            perm.iter()
                .map(|&axis| {
                    let ix = if axis < 0 { axis + rank as i64 } else { axis };
                    d.dims()[ix as usize]
                })
                .collect()
        }
        None => d.dims().iter().rev().cloned().collect(),
    };
    let fact = TypedFact::new(d.datum_type, dims);
    let op = OpKind::Transpose { perm: perm.map(|p| p.iter().cloned().collect()) };
    Ok(Value::build(op, tvec!(data.clone()), fact))
}

/// Concatenates along `axis` (negative counts from the end).
pub fn concat(axis: i64, inputs: &[Value]) -> FerryResult<Value> {
    let first = match inputs.first() {
        Some(v) => v.fact()?.clone(),
        None => bail_construction!("concat of zero values"),
    };
    let axis = normalize_axis("concat", axis, first.rank())?;
    let mut dims = first.shape.clone();
    for value in &inputs[1..] {
        let fact = value.fact()?;
        if fact.datum_type != first.datum_type || fact.rank() != first.rank() {
            bail_construction!("concat: incompatible operands {} and {}", first, fact);
        }
        for (ix, (&a, &b)) in dims.iter().zip(fact.dims()).enumerate() {
            if ix != axis && a >= 0 && b >= 0 && a != b {
                bail_construction!("concat: dim {} mismatch between {} and {}", ix, first, fact);
            }
        }
        dims[axis] = if dims[axis] >= 0 && fact.dims()[axis] >= 0 {
            dims[axis] + fact.dims()[axis]
        } else {
            -1
        };
    }
    let fact = TypedFact::new(first.datum_type, dims);
    Ok(Value::build(OpKind::Concat { axis }, inputs.iter().cloned().collect(), fact))
}

/// Removes size-1 axes. With `axes` given, each named axis must be of size
/// 1; without, every statically-known size-1 axis goes away.
pub fn squeeze(data: &Value, axes: Option<&[i64]>) -> FerryResult<Value> {
    let d = data.fact()?;
    let rank = d.rank();
    let dims: TVec<i64> = match axes {
        Some(axes) => {
            let mut drop = vec![false; rank];
            for &axis in axes {
                let ix = normalize_axis("squeeze", axis, rank)?;
                if d.dims()[ix] >= 0 && d.dims()[ix] != 1 {
                    bail_construction!("squeeze: axis {} of {} is not of size 1", axis, d);
                }
                drop[ix] = true;
            }
            d.dims().iter().enumerate().filter(|(ix, _)| !drop[*ix]).map(|(_, d)| *d).collect()
        }
        None => d.dims().iter().filter(|d| **d != 1).cloned().collect(),
    };
    let fact = TypedFact::new(d.datum_type, dims);
    let op = OpKind::Squeeze { axes: axes.map(|a| a.iter().cloned().collect()) };
    Ok(Value::build(op, tvec!(data.clone()), fact))
}

/// Broadcasts `data` to `shape` (NumPy rules).
pub fn broadcast_to(data: &Value, shape: &[i64]) -> FerryResult<Value> {
    let d = data.fact()?;
    let merged = multi_broadcast(&[d.dims(), shape])?;
    if merged.as_slice() != shape {
        bail_construction!("can not broadcast {} to {:?}", d, shape);
    }
    let fact = TypedFact::new(d.datum_type, shape.iter().cloned().collect());
    let op = OpKind::BroadcastTo { shape: shape.iter().cloned().collect() };
    Ok(Value::build(op, tvec!(data.clone()), fact))
}

/// Extracts `[begin, end)` from a rank-1 value.
pub fn slice(data: &Value, begin: i64, end: i64) -> FerryResult<Value> {
    let d = data.fact()?;
    if d.rank() != 1 {
        bail_construction!("slice expects a rank-1 operand, got {}", d);
    }
    if begin < 0 || end < begin || (d.dims()[0] >= 0 && end > d.dims()[0]) {
        bail_construction!("slice: range {}..{} out of bounds for {}", begin, end, d);
    }
    let fact = TypedFact::new(d.datum_type, tvec!(end - begin));
    Ok(Value::build(OpKind::Slice { begin, end }, tvec!(data.clone()), fact))
}

/// The shape of `data` as a rank-1 i64 value. Folds to a constant as soon
/// as the input fact is fully known.
pub fn shape_of(data: &Value) -> FerryResult<Value> {
    let d = data.fact()?;
    let fact = TypedFact::new(DatumType::I64, tvec!(d.rank() as i64));
    Ok(Value::build(OpKind::ShapeOf, tvec!(data.clone()), fact))
}

/// Elementwise conversion to another element type.
pub fn cast(data: &Value, to: DatumType) -> FerryResult<Value> {
    let d = data.fact()?;
    let fact = TypedFact::new(to, d.shape.clone());
    Ok(Value::build(OpKind::Cast { to }, tvec!(data.clone()), fact))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(shape: &[i64]) -> Value {
        Value::source("x", TypedFact::new(DatumType::F32, shape.iter().cloned().collect()))
    }

    #[test]
    fn reshape_infers_minus_one() {
        let out = reshape(&source(&[2, 3, 4]), &[-1, 4], false).unwrap();
        assert_eq!(out.fact().unwrap().dims(), &[6, 4]);
    }

    #[test]
    fn reshape_zero_copies_input_dim() {
        let out = reshape(&source(&[2, 3, 4]), &[0, 12], false).unwrap();
        assert_eq!(out.fact().unwrap().dims(), &[2, 12]);
    }

    #[test]
    fn reshape_element_count_checked() {
        assert!(reshape(&source(&[2, 3, 4]), &[5, 5], false).is_err());
    }

    #[test]
    fn transpose_default_reverses() {
        let out = transpose(&source(&[2, 3, 4]), None).unwrap();
        assert_eq!(out.fact().unwrap().dims(), &[4, 3, 2]);
    }

    #[test]
    fn concat_sums_axis() {
        let out =
            concat(1, &[source(&[1, 20, 32, 32]), source(&[1, 3, 32, 32]), source(&[1, 64, 32, 32])])
                .unwrap();
        assert_eq!(out.fact().unwrap().dims(), &[1, 87, 32, 32]);
    }

    #[test]
    fn concat_rejects_mismatched_dims() {
        assert!(concat(1, &[source(&[1, 2, 3]), source(&[2, 2, 3])]).is_err());
    }

    #[test]
    fn squeeze_all_unit_axes() {
        let out = squeeze(&source(&[1, 3, 1, 5]), None).unwrap();
        assert_eq!(out.fact().unwrap().dims(), &[3, 5]);
    }

    #[test]
    fn squeeze_named_axis_must_be_unit() {
        assert!(squeeze(&source(&[1, 3]), Some(&[1])).is_err());
        let out = squeeze(&source(&[1, 3]), Some(&[0])).unwrap();
        assert_eq!(out.fact().unwrap().dims(), &[3]);
    }
}
