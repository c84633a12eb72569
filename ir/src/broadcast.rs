//! NumPy-style shape broadcasting over annotated shapes.

use itertools::EitherOrBoth;
use itertools::Itertools;

use crate::error::FerryResult;
use crate::TVec;

/// Computes the broadcast shape of several operand shapes.
///
/// Right-aligned: the shorter shape is conceptually left-padded with 1s.
/// A dimension of 1 stretches to the other operand's dimension; an unknown
/// dimension (-1) stays unknown unless the other operand pins it above 1.
pub fn multi_broadcast(shapes: &[&[i64]]) -> FerryResult<TVec<i64>> {
    let mut result: TVec<i64> = tvec!();
    for shape in shapes {
        result = pairwise(&result, shape)?;
    }
    Ok(result)
}

fn pairwise(a: &[i64], b: &[i64]) -> FerryResult<TVec<i64>> {
    let mut dims: TVec<i64> = a
        .iter()
        .rev()
        .zip_longest(b.iter().rev())
        .map(|pair| {
            let (&x, &y) = match pair {
                EitherOrBoth::Both(x, y) => (x, y),
                EitherOrBoth::Left(x) => (x, &1),
                EitherOrBoth::Right(y) => (&1, y),
            };
            match (x, y) {
                (1, d) | (d, 1) => Ok(d),
                (d, e) if d == e => Ok(d),
                (-1, d) | (d, -1) => Ok(d),
                (d, e) => {
                    bail_construction!("can not broadcast {:?} against {:?} ({} vs {})", a, b, d, e)
                }
            }
        })
        .collect::<FerryResult<_>>()?;
    dims.reverse();
    Ok(dims)
}
