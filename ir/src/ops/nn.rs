//! Neural-network primitives: dense/matmul, convolution, pooling, softmax.

use crate::error::FerryResult;
use crate::expr::{OpKind, Value};
use crate::fact::TypedFact;
use crate::ops::check_same_datum_type;
use crate::TVec;

pub fn relu(a: &Value) -> FerryResult<Value> {
    let fact = a.fact()?.clone();
    Ok(Value::build(OpKind::Relu, tvec!(a.clone()), fact))
}

/// `dense(data, weight)` computes `data · weightᵀ`: data is `(m, k)`,
/// weight is `(n, k)`, result is `(m, n)`.
pub fn dense(data: &Value, weight: &Value) -> FerryResult<Value> {
    let dt = check_same_datum_type("dense", data, weight)?;
    let d = data.fact()?;
    let w = weight.fact()?;
    if d.rank() != 2 || w.rank() != 2 {
        bail_construction!("dense expects rank-2 operands, got {} and {}", d, w);
    }
    let (k0, k1) = (d.dims()[1], w.dims()[1]);
    if k0 >= 0 && k1 >= 0 && k0 != k1 {
        bail_construction!("dense: reduction dims differ, {} vs {}", d, w);
    }
    let fact = TypedFact::new(dt, tvec!(d.dims()[0], w.dims()[0]));
    Ok(Value::build(OpKind::Dense, tvec!(data.clone(), weight.clone()), fact))
}

/// `batch_matmul(a, b)`: a is `(b, m, k)`, b is `(b, k, n)`, result is
/// `(b, m, n)`.
pub fn batch_matmul(a: &Value, b: &Value) -> FerryResult<Value> {
    let dt = check_same_datum_type("batch_matmul", a, b)?;
    let fa = a.fact()?;
    let fb = b.fact()?;
    if fa.rank() != 3 || fb.rank() != 3 {
        bail_construction!("batch_matmul expects rank-3 operands, got {} and {}", fa, fb);
    }
    let (ba, bb) = (fa.dims()[0], fb.dims()[0]);
    if ba >= 0 && bb >= 0 && ba != bb {
        bail_construction!("batch_matmul: batch dims differ, {} vs {}", fa, fb);
    }
    let (k0, k1) = (fa.dims()[2], fb.dims()[1]);
    if k0 >= 0 && k1 >= 0 && k0 != k1 {
        bail_construction!("batch_matmul: reduction dims differ, {} vs {}", fa, fb);
    }
    let batch = if ba >= 0 { ba } else { bb };
    let fact = TypedFact::new(dt, tvec!(batch, fa.dims()[1], fb.dims()[2]));
    Ok(Value::build(OpKind::BatchMatMul, tvec!(a.clone(), b.clone()), fact))
}

/// Adds a rank-1 bias along `axis` of `data`.
pub fn bias_add(data: &Value, bias: &Value, axis: usize) -> FerryResult<Value> {
    let dt = check_same_datum_type("bias_add", data, bias)?;
    let d = data.fact()?;
    let b = bias.fact()?;
    if b.rank() != 1 {
        bail_construction!("bias_add expects a rank-1 bias, got {}", b);
    }
    if axis >= d.rank() {
        bail_construction!("bias_add: axis {} out of range for {}", axis, d);
    }
    let (dim, blen) = (d.dims()[axis], b.dims()[0]);
    if dim >= 0 && blen >= 0 && dim != blen {
        bail_construction!("bias_add: bias length {} does not match dim {} of {}", blen, axis, d);
    }
    let fact = TypedFact::new(dt, d.shape.clone());
    Ok(Value::build(OpKind::BiasAdd { axis }, tvec!(data.clone(), bias.clone()), fact))
}

pub fn softmax(data: &Value, axis: usize) -> FerryResult<Value> {
    let fact = data.fact()?.clone();
    if axis >= fact.rank() {
        bail_construction!("softmax: axis {} out of range for {}", axis, fact);
    }
    Ok(Value::build(OpKind::Softmax { axis }, tvec!(data.clone()), fact))
}

fn pooled_dim(input: i64, pad_before: i64, pad_after: i64, kernel: i64, dilation: i64, stride: i64, ceil: bool) -> FerryResult<i64> {
    if input < 0 {
        return Ok(-1);
    }
    let effective = dilation * (kernel - 1) + 1;
    let span = input + pad_before + pad_after - effective;
    if span < 0 {
        bail_construction!(
            "kernel {} (dilation {}) does not fit input {} padded by {}+{}",
            kernel,
            dilation,
            input,
            pad_before,
            pad_after
        );
    }
    Ok(if ceil {
        // ceil division, matching ceil_mode pooling
        span.div_euclid(stride) + i64::from(span.rem_euclid(stride) != 0) + 1
    } else {
        span.div_euclid(stride) + 1
    })
}

/// 2-D convolution over NCHW data with OIHW weights. `padding` is
/// `[top, left, bottom, right]`.
#[allow(clippy::too_many_arguments)]
pub fn conv2d(
    data: &Value,
    weight: &Value,
    channels: i64,
    kernel: &[i64],
    strides: &[i64],
    padding: &[i64],
    dilations: &[i64],
    group: i64,
) -> FerryResult<Value> {
    let dt = check_same_datum_type("conv2d", data, weight)?;
    let d = data.fact()?;
    if d.rank() != 4 {
        bail_construction!("conv2d expects NCHW input, got {}", d);
    }
    if kernel.len() != 2 || strides.len() != 2 || dilations.len() != 2 || padding.len() != 4 {
        bail_construction!(
            "conv2d: bad spatial arguments (kernel {:?}, strides {:?}, padding {:?}, dilations {:?})",
            kernel,
            strides,
            padding,
            dilations
        );
    }
    let h = pooled_dim(d.dims()[2], padding[0], padding[2], kernel[0], dilations[0], strides[0], false)?;
    let w = pooled_dim(d.dims()[3], padding[1], padding[3], kernel[1], dilations[1], strides[1], false)?;
    let fact = TypedFact::new(dt, tvec!(d.dims()[0], channels, h, w));
    let op = OpKind::Conv2d {
        channels,
        kernel: kernel.iter().cloned().collect(),
        strides: strides.iter().cloned().collect(),
        padding: padding.iter().cloned().collect(),
        dilations: dilations.iter().cloned().collect(),
        group,
    };
    Ok(Value::build(op, tvec!(data.clone(), weight.clone()), fact))
}

/// 2-D max pooling over NCHW data. `padding` is `[top, left, bottom, right]`.
pub fn max_pool2d(
    data: &Value,
    kernel: &[i64],
    strides: &[i64],
    padding: &[i64],
    dilations: &[i64],
    ceil_mode: bool,
) -> FerryResult<Value> {
    let d = data.fact()?;
    if d.rank() != 4 {
        bail_construction!("max_pool2d expects NCHW input, got {}", d);
    }
    if kernel.len() != 2 || strides.len() != 2 || dilations.len() != 2 || padding.len() != 4 {
        bail_construction!(
            "max_pool2d: bad spatial arguments (kernel {:?}, strides {:?}, padding {:?}, dilations {:?})",
            kernel,
            strides,
            padding,
            dilations
        );
    }
    let h = pooled_dim(d.dims()[2], padding[0], padding[2], kernel[0], dilations[0], strides[0], ceil_mode)?;
    let w = pooled_dim(d.dims()[3], padding[1], padding[3], kernel[1], dilations[1], strides[1], ceil_mode)?;
    let fact = TypedFact::new(d.datum_type, tvec!(d.dims()[0], d.dims()[1], h, w));
    let op = OpKind::MaxPool2d {
        kernel: kernel.iter().cloned().collect(),
        strides: strides.iter().cloned().collect(),
        padding: padding.iter().cloned().collect(),
        dilations: dilations.iter().cloned().collect(),
        ceil_mode,
    };
    Ok(Value::build(op, tvec!(data.clone()), fact))
}

/// Global average pooling: collapses every spatial dimension to 1.
/// `spatial_rank` must be 1, 2 or 3 (NCW / NCHW / NCDHW data).
pub fn global_avg_pool(data: &Value, spatial_rank: usize) -> FerryResult<Value> {
    let d = data.fact()?;
    if !(1..=3).contains(&spatial_rank) || d.rank() != spatial_rank + 2 {
        bail_construction!(
            "global_avg_pool: input {} does not match spatial rank {}",
            d,
            spatial_rank
        );
    }
    let mut shape: TVec<i64> = tvec!(d.dims()[0], d.dims()[1]);
    shape.extend(std::iter::repeat(1).take(spatial_rank));
    let fact = TypedFact::new(d.datum_type, shape);
    Ok(Value::build(OpKind::GlobalAvgPool { spatial_rank }, tvec!(data.clone()), fact))
}

/// Flattens every dimension but the first into one: `(d0, Πd[1..])`.
pub fn batch_flatten(data: &Value) -> FerryResult<Value> {
    let d = data.fact()?;
    if d.rank() < 1 {
        bail_construction!("batch_flatten expects rank >= 1, got {}", d);
    }
    let rest = if d.dims()[1..].iter().all(|x| *x >= 0) {
        d.dims()[1..].iter().product()
    } else {
        -1
    };
    let fact = TypedFact::new(d.datum_type, tvec!(d.dims()[0], rest));
    Ok(Value::build(OpKind::BatchFlatten, tvec!(data.clone()), fact))
}
