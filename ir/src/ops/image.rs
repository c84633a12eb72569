//! Image primitives. Currently only 2-D resize.

use crate::error::FerryResult;
use crate::expr::{OpKind, ResizeMode, Value};
use crate::fact::TypedFact;
use crate::TVec;

/// Resizes the spatial dimensions of a rank-4 NCHW value to `size`
/// (`[height, width]`). `roi` restricts the sampled region for the
/// `tf_crop_and_resize` coordinate transformation.
#[allow(clippy::too_many_arguments)]
pub fn resize2d(
    data: &Value,
    roi: Option<&Value>,
    size: &[i64],
    mode: ResizeMode,
    coord_transform: &str,
    nearest_mode: &str,
    cubic_coeff: f32,
    exclude_outside: bool,
    extrapolation_value: f32,
) -> FerryResult<Value> {
    let d = data.fact()?;
    if d.rank() != 4 {
        bail_construction!("resize2d expects NCHW input, got {}", d);
    }
    if size.len() != 2 || size.iter().any(|s| *s <= 0) {
        bail_construction!("resize2d: bad target size {:?}", size);
    }
    if let Some(roi) = roi {
        let r = roi.fact()?;
        if r.rank() != 1 {
            bail_construction!("resize2d: roi must be rank-1, got {}", r);
        }
    }
    let fact = TypedFact::new(d.datum_type, tvec!(d.dims()[0], d.dims()[1], size[0], size[1]));
    let op = OpKind::Resize2d {
        size: size.iter().cloned().collect(),
        mode,
        coord_transform: coord_transform.to_string(),
        nearest_mode: nearest_mode.to_string(),
        cubic_coeff,
        exclude_outside,
        extrapolation_value,
    };
    let mut inputs: TVec<Value> = tvec!(data.clone());
    if let Some(roi) = roi {
        inputs.push(roi.clone());
    }
    Ok(Value::build(op, inputs, fact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::DatumType;

    fn source(shape: &[i64]) -> Value {
        Value::source("x", TypedFact::new(DatumType::F32, shape.iter().cloned().collect()))
    }

    #[test]
    fn resize_sets_spatial_dims() {
        let out = resize2d(
            &source(&[1, 3, 32, 32]),
            None,
            &[64, 48],
            ResizeMode::NearestNeighbor,
            "asymmetric",
            "floor",
            -0.75,
            false,
            0.0,
        )
        .unwrap();
        assert_eq!(out.fact().unwrap().dims(), &[1, 3, 64, 48]);
    }

    #[test]
    fn resize_rejects_non_4d() {
        assert!(resize2d(
            &source(&[3, 32, 32]),
            None,
            &[64, 64],
            ResizeMode::Linear,
            "half_pixel",
            "round_prefer_floor",
            -0.75,
            false,
            0.0,
        )
        .is_err());
    }
}
