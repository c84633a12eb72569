//! Shape and type queries over IR values.
//!
//! Operator translators never inspect IR nodes directly; the annotation on
//! each value answers the shape- and type-dependent questions they ask while
//! picking a lowering strategy.

use ferry_ir::internal::*;

/// The annotated shape and element type of `value`. Unknown dimensions
/// come back as `-1`.
pub fn shape_and_dtype(value: &Value) -> FerryResult<(TVec<i64>, DatumType)> {
    let fact = value.fact()?;
    Ok((fact.shape.clone(), fact.datum_type))
}

pub fn rank(value: &Value) -> FerryResult<usize> {
    Ok(value.fact()?.rank())
}

/// The shape of `value` as an IR value, folded to a constant whenever the
/// annotation is complete.
pub fn symbolic_shape(value: &Value) -> FerryResult<Value> {
    fold(&ops::array::shape_of(value)?)
}
