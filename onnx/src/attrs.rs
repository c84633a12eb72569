//! Typed attribute access on [`NodeDef`].
//!
//! Attribute lookups are last-wins: when a producer emitted the same
//! attribute name twice, the later occurrence shadows the earlier one.

use crate::graph::{AttrValue, NodeDef};
use ferry_ir::prelude::*;

/// Scalar types extractable from a single attribute.
pub trait AttrScalarType<'a>: Sized {
    const KIND: &'static str;
    fn cast(attr: &'a AttrValue) -> Option<Self>;
}

impl<'a> AttrScalarType<'a> for i64 {
    const KIND: &'static str = "int";
    fn cast(attr: &'a AttrValue) -> Option<i64> {
        match attr {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl<'a> AttrScalarType<'a> for f32 {
    const KIND: &'static str = "float";
    fn cast(attr: &'a AttrValue) -> Option<f32> {
        match attr {
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl<'a> AttrScalarType<'a> for bool {
    const KIND: &'static str = "int";
    fn cast(attr: &'a AttrValue) -> Option<bool> {
        match attr {
            AttrValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl<'a> AttrScalarType<'a> for usize {
    const KIND: &'static str = "int";
    fn cast(attr: &'a AttrValue) -> Option<usize> {
        match attr {
            AttrValue::Int(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }
}

impl<'a> AttrScalarType<'a> for &'a str {
    const KIND: &'static str = "string";
    fn cast(attr: &'a AttrValue) -> Option<&'a str> {
        match attr {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl<'a> AttrScalarType<'a> for String {
    const KIND: &'static str = "string";
    fn cast(attr: &'a AttrValue) -> Option<String> {
        match attr {
            AttrValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Element types extractable from a list attribute.
pub trait AttrTVecType<'a>: Sized {
    const KIND: &'static str;
    fn cast(attr: &'a AttrValue) -> Option<TVec<Self>>;
}

impl<'a> AttrTVecType<'a> for i64 {
    const KIND: &'static str = "ints";
    fn cast(attr: &'a AttrValue) -> Option<TVec<i64>> {
        match attr {
            AttrValue::Ints(v) => Some(v.iter().cloned().collect()),
            _ => None,
        }
    }
}

impl<'a> AttrTVecType<'a> for f32 {
    const KIND: &'static str = "floats";
    fn cast(attr: &'a AttrValue) -> Option<TVec<f32>> {
        match attr {
            AttrValue::Floats(v) => Some(v.iter().cloned().collect()),
            _ => None,
        }
    }
}

impl NodeDef {
    fn find_attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().rev().find(|a| a.name == name).map(|a| &a.value)
    }

    fn wrong_kind(&self, name: &str, expected: &str, found: &AttrValue) -> FerryError {
        FerryError::AttributeMissingOrWrongKind(format!(
            "node {} ({}): attribute '{}' is {}, expected {}",
            self.name,
            self.op_type,
            name,
            found.kind(),
            expected
        ))
    }

    /// The attribute as a scalar, or `None` when absent. A present attribute
    /// of the wrong kind is an error.
    pub fn get_attr_opt<'a, T: AttrScalarType<'a>>(&'a self, name: &str) -> FerryResult<Option<T>> {
        match self.find_attr(name) {
            None => Ok(None),
            Some(attr) => match T::cast(attr) {
                Some(v) => Ok(Some(v)),
                None => Err(self.wrong_kind(name, T::KIND, attr)),
            },
        }
    }

    /// The attribute as a scalar. Absence is an error.
    pub fn get_attr<'a, T: AttrScalarType<'a>>(&'a self, name: &str) -> FerryResult<T> {
        match self.get_attr_opt(name)? {
            Some(v) => Ok(v),
            None => Err(FerryError::AttributeMissingOrWrongKind(format!(
                "node {} ({}): attribute '{}' is missing",
                self.name, self.op_type, name
            ))),
        }
    }

    /// The attribute as a scalar, falling back to `default` when it is
    /// absent or not of the requested kind.
    pub fn get_attr_or<'a, T: AttrScalarType<'a>>(&'a self, name: &str, default: T) -> T {
        self.find_attr(name).and_then(T::cast).unwrap_or(default)
    }

    /// The attribute as a list, or `None` when absent.
    pub fn get_attr_opt_tvec<'a, T: AttrTVecType<'a>>(
        &'a self,
        name: &str,
    ) -> FerryResult<Option<TVec<T>>> {
        match self.find_attr(name) {
            None => Ok(None),
            Some(attr) => match T::cast(attr) {
                Some(v) => Ok(Some(v)),
                None => Err(self.wrong_kind(name, T::KIND, attr)),
            },
        }
    }

    /// The attribute as a list. Absence is an error.
    pub fn get_attr_tvec<'a, T: AttrTVecType<'a>>(&'a self, name: &str) -> FerryResult<TVec<T>> {
        match self.get_attr_opt_tvec(name)? {
            Some(v) => Ok(v),
            None => Err(FerryError::AttributeMissingOrWrongKind(format!(
                "node {} ({}): attribute '{}' is missing",
                self.name, self.op_type, name
            ))),
        }
    }
}
