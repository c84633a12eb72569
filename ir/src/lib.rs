//! # Ferry IR
//!
//! The intermediate representation half of the ferry model-import compiler:
//! an SSA expression graph where every value carries a shape and element-type
//! annotation computed at construction time, plus the constant-folding
//! service that downstream front ends invoke after each translation step.
//!
//! Front ends (see `ferry-onnx`) only ever manipulate opaque [`Value`]
//! handles; shape- or type-dependent decisions go through the value's
//! [`TypedFact`].

#[macro_use]
extern crate derive_new;

/// A SmallVec instantiation with 4 embeddable values.
///
/// Used about everywhere in ferry, for node inputs and outputs, or
/// tensor dimensions.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

/// Builds a `TVec` from a list of values.
#[macro_export]
macro_rules! tvec {
    ($elem:expr; $n:expr) => ({ $crate::TVec::from_elem($elem, $n) });
    () => ($crate::TVec::new());
    ($($x:expr),+$(,)*) => ({
        let mut vec = $crate::TVec::new();
        $(vec.push($x);)+
        vec
    });
}

#[macro_use]
pub mod error;

pub mod broadcast;
pub mod datum;
pub mod expr;
pub mod fact;
pub mod fold;
pub mod module;
pub mod ops;
pub mod tensor;

pub mod prelude {
    pub use crate::datum::DatumType;
    pub use crate::error::{FerryError, FerryResult};
    pub use crate::expr::{Fact, OpKind, Value};
    pub use crate::fact::TypedFact;
    pub use crate::module::Module;
    pub use crate::tensor::Tensor;
    pub use crate::{bail_construction, bail_feature, bail_graph, tvec};
    pub use crate::TVec;
}

pub mod internal {
    pub use crate::broadcast::multi_broadcast;
    pub use crate::fold::fold;
    pub use crate::ops;
    pub use crate::prelude::*;
}
