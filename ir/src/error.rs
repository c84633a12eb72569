//! The error taxonomy shared by the IR and the front ends.
//!
//! Translation failures are deterministic input-validity failures: the first
//! error aborts the whole graph translation and nothing is retried.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FerryError {
    /// Structural problem in the source graph: wrong arity, unresolved name
    /// reference, empty required name, missing declared output.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// No translator registered for an op-type name.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// A recognized operator used with an attribute combination this
    /// implementation does not support.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Required attribute absent or of the wrong kind.
    #[error("attribute missing or wrong kind: {0}")]
    AttributeMissingOrWrongKind(String),

    /// An IR primitive was handed arguments it can not build from, or a
    /// value expected to be a constant tensor is not.
    #[error("runtime construction error: {0}")]
    RuntimeConstruction(String),
}

pub type FerryResult<T> = Result<T, FerryError>;

#[macro_export]
macro_rules! bail_graph {
    ($($arg:tt)*) => {
        return Err($crate::error::FerryError::InvalidGraph(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! bail_feature {
    ($($arg:tt)*) => {
        return Err($crate::error::FerryError::UnsupportedFeature(format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! bail_construction {
    ($($arg:tt)*) => {
        return Err($crate::error::FerryError::RuntimeConstruction(format!($($arg)*)))
    };
}
