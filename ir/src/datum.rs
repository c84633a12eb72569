use std::fmt;

/// Element type of a tensor value.
///
/// The IR only ever constructs f32 and i64 tensors; source graphs declaring
/// anything else are rejected by the front end before reaching this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatumType {
    F32,
    I64,
}

impl DatumType {
    pub fn size_of(&self) -> usize {
        match self {
            DatumType::F32 => 4,
            DatumType::I64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DatumType::F32)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DatumType::I64)
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatumType::F32 => write!(f, "f32"),
            DatumType::I64 => write!(f, "i64"),
        }
    }
}
