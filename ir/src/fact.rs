use std::fmt;

use crate::datum::DatumType;
use crate::TVec;

/// Shape and element-type annotation carried by every tensor value.
///
/// Dimensions are `i64`, with `-1` standing for an unknown dimension. The
/// annotation is computed once, when the value is constructed, so shape
/// queries never re-run inference over the subgraph.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TypedFact {
    pub datum_type: DatumType,
    pub shape: TVec<i64>,
}

impl TypedFact {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn dims(&self) -> &[i64] {
        &self.shape
    }

    /// True when no dimension is unknown.
    pub fn is_concrete(&self) -> bool {
        self.shape.iter().all(|d| *d >= 0)
    }

    /// Element count, when every dimension is known.
    pub fn volume(&self) -> Option<i64> {
        if self.is_concrete() {
            Some(self.shape.iter().product())
        } else {
            None
        }
    }
}

impl fmt::Display for TypedFact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dims: Vec<String> = self
            .shape
            .iter()
            .map(|d| if *d < 0 { "?".to_string() } else { d.to_string() })
            .collect();
        write!(f, "{}x{}", dims.join("x"), self.datum_type)
    }
}
