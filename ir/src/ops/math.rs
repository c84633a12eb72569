//! Elementwise arithmetic primitives.

use crate::broadcast::multi_broadcast;
use crate::error::FerryResult;
use crate::expr::{OpKind, Value};
use crate::fact::TypedFact;
use crate::ops::check_same_datum_type;

fn elementwise_binary(op: OpKind, a: &Value, b: &Value) -> FerryResult<Value> {
    let dt = check_same_datum_type("elementwise binary", a, b)?;
    let shape = multi_broadcast(&[a.fact()?.dims(), b.fact()?.dims()])?;
    Ok(Value::build(op, tvec!(a.clone(), b.clone()), TypedFact::new(dt, shape)))
}

fn elementwise_unary(op: OpKind, a: &Value) -> FerryResult<Value> {
    let fact = a.fact()?.clone();
    if !fact.datum_type.is_float() {
        bail_construction!("{:?} requires a float operand, got {}", op, fact.datum_type);
    }
    Ok(Value::build(op, tvec!(a.clone()), fact))
}

pub fn add(a: &Value, b: &Value) -> FerryResult<Value> {
    elementwise_binary(OpKind::Add, a, b)
}

pub fn sub(a: &Value, b: &Value) -> FerryResult<Value> {
    elementwise_binary(OpKind::Sub, a, b)
}

pub fn mul(a: &Value, b: &Value) -> FerryResult<Value> {
    elementwise_binary(OpKind::Mul, a, b)
}

pub fn pow(a: &Value, b: &Value) -> FerryResult<Value> {
    elementwise_binary(OpKind::Pow, a, b)
}

pub fn sqrt(a: &Value) -> FerryResult<Value> {
    elementwise_unary(OpKind::Sqrt, a)
}

pub fn erf(a: &Value) -> FerryResult<Value> {
    elementwise_unary(OpKind::Erf, a)
}
