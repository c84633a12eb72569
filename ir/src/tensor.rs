//! Concrete tensor payloads for constants and initializers.

use byteorder::{ByteOrder, LittleEndian};
use ndarray::{ArrayD, IxDyn};
use num_traits::AsPrimitive;

use crate::datum::DatumType;
use crate::error::FerryResult;
use crate::TVec;

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
}

/// A constant tensor: shape plus typed data, ndarray-backed.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: TensorData,
}

impl Tensor {
    /// Decodes a little-endian raw byte buffer into a typed tensor,
    /// validating the byte length against the declared shape.
    pub fn from_raw(dt: DatumType, shape: &[usize], bytes: &[u8]) -> FerryResult<Tensor> {
        let len: usize = shape.iter().product();
        if bytes.len() != len * dt.size_of() {
            bail_graph!(
                "tensor data length {} does not match shape {:?} of {} ({} bytes expected)",
                bytes.len(),
                shape,
                dt,
                len * dt.size_of()
            );
        }
        match dt {
            DatumType::F32 => {
                let mut values = vec![0f32; len];
                LittleEndian::read_f32_into(bytes, &mut values);
                Tensor::f32s(shape, &values)
            }
            DatumType::I64 => {
                let mut values = vec![0i64; len];
                LittleEndian::read_i64_into(bytes, &mut values);
                Tensor::i64s(shape, &values)
            }
        }
    }

    pub fn f32s(shape: &[usize], values: &[f32]) -> FerryResult<Tensor> {
        match ArrayD::from_shape_vec(IxDyn(shape), values.to_vec()) {
            Ok(array) => Ok(Tensor { data: TensorData::F32(array) }),
            Err(e) => bail_construction!("building f32 tensor of shape {:?}: {}", shape, e),
        }
    }

    pub fn i64s(shape: &[usize], values: &[i64]) -> FerryResult<Tensor> {
        match ArrayD::from_shape_vec(IxDyn(shape), values.to_vec()) {
            Ok(array) => Ok(Tensor { data: TensorData::I64(array) }),
            Err(e) => bail_construction!("building i64 tensor of shape {:?}: {}", shape, e),
        }
    }

    pub fn scalar_f32(value: f32) -> Tensor {
        Tensor { data: TensorData::F32(ArrayD::from_elem(IxDyn(&[]), value)) }
    }

    pub fn datum_type(&self) -> DatumType {
        match &self.data {
            TensorData::F32(_) => DatumType::F32,
            TensorData::I64(_) => DatumType::I64,
        }
    }

    pub fn shape(&self) -> TVec<usize> {
        match &self.data {
            TensorData::F32(a) => a.shape().iter().cloned().collect(),
            TensorData::I64(a) => a.shape().iter().cloned().collect(),
        }
    }

    pub fn rank(&self) -> usize {
        match &self.data {
            TensorData::F32(a) => a.ndim(),
            TensorData::I64(a) => a.ndim(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            TensorData::F32(a) => a.len(),
            TensorData::I64(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn as_f32s(&self) -> Option<&ArrayD<f32>> {
        match &self.data {
            TensorData::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64s(&self) -> Option<&ArrayD<i64>> {
        match &self.data {
            TensorData::I64(a) => Some(a),
            _ => None,
        }
    }

    /// Materializes the tensor as a flat i64 vector. Used for "shape" and
    /// "axes" operands that must be constant int64 tensors.
    pub fn to_i64_vec(&self) -> FerryResult<Vec<i64>> {
        match &self.data {
            TensorData::I64(a) => Ok(a.iter().cloned().collect()),
            TensorData::F32(_) => {
                bail_construction!("expected an int64 tensor, got {}", self.datum_type())
            }
        }
    }

    pub fn cast_to(&self, dt: DatumType) -> Tensor {
        if self.datum_type() == dt {
            return self.clone();
        }
        let data = match (&self.data, dt) {
            (TensorData::F32(a), DatumType::I64) => {
                TensorData::I64(a.mapv(|v| AsPrimitive::<i64>::as_(v)))
            }
            (TensorData::I64(a), DatumType::F32) => {
                TensorData::F32(a.mapv(|v| AsPrimitive::<f32>::as_(v)))
            }
            _ => unreachable!(),
        };
        Tensor { data }
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(array: ArrayD<f32>) -> Tensor {
        Tensor { data: TensorData::F32(array) }
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(array: ArrayD<i64>) -> Tensor {
        Tensor { data: TensorData::I64(array) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FerryError;

    #[test]
    fn raw_f32_little_endian() {
        let bytes: Vec<u8> = [1.0f32, -2.5, 3.25].iter().flat_map(|f| f.to_le_bytes()).collect();
        let t = Tensor::from_raw(DatumType::F32, &[3], &bytes).unwrap();
        assert_eq!(t.as_f32s().unwrap().as_slice().unwrap(), &[1.0, -2.5, 3.25]);
    }

    #[test]
    fn raw_i64_little_endian() {
        let bytes: Vec<u8> = [6i64, 4].iter().flat_map(|i| i.to_le_bytes()).collect();
        let t = Tensor::from_raw(DatumType::I64, &[2], &bytes).unwrap();
        assert_eq!(t.to_i64_vec().unwrap(), vec![6, 4]);
    }

    #[test]
    fn raw_length_mismatch_is_invalid() {
        let err = Tensor::from_raw(DatumType::F32, &[4], &[0u8; 12]).unwrap_err();
        assert!(matches!(err, FerryError::InvalidGraph(_)));
    }

    #[test]
    fn cast_roundtrip() {
        let t = Tensor::i64s(&[2], &[3, -7]).unwrap();
        let f = t.cast_to(DatumType::F32);
        assert_eq!(f.as_f32s().unwrap().as_slice().unwrap(), &[3.0, -7.0]);
    }
}
