//! IR construction primitives, one constructor per supported operator.
//!
//! Every constructor takes concrete IR values plus concrete scalar/list
//! arguments, validates them, computes the output fact and returns a fresh
//! [`crate::expr::Value`]. The constructor set is closed: a front end can
//! only emit primitives this module defines.

pub mod array;
pub mod image;
pub mod math;
pub mod nn;

use crate::datum::DatumType;
use crate::error::FerryResult;
use crate::expr::Value;

pub(crate) fn check_same_datum_type(what: &str, a: &Value, b: &Value) -> FerryResult<DatumType> {
    let dta = a.fact()?.datum_type;
    let dtb = b.fact()?.datum_type;
    if dta != dtb {
        bail_construction!("{}: mismatched element types {} and {}", what, dta, dtb);
    }
    Ok(dta)
}

pub(crate) fn normalize_axis(what: &str, axis: i64, rank: usize) -> FerryResult<usize> {
    let rank = rank as i64;
    let normalized = if axis < 0 { axis + rank } else { axis };
    if normalized < 0 || normalized >= rank {
        bail_construction!("{}: axis {} out of range for rank {}", what, axis, rank);
    }
    Ok(normalized as usize)
}
