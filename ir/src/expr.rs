//! The SSA expression graph.
//!
//! A [`Value`] is a cheap-clone handle to one point in the constructed IR.
//! Values are produced once and may be read by any number of downstream
//! consumers; they are never mutated after construction.

use std::fmt;
use std::sync::Arc;

use crate::datum::DatumType;
use crate::error::FerryResult;
use crate::fact::TypedFact;
use crate::tensor::Tensor;
use crate::TVec;

/// Interpolation mode of the 2-D resize primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    NearestNeighbor,
    Linear,
    Cubic,
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResizeMode::NearestNeighbor => write!(f, "nearest_neighbor"),
            ResizeMode::Linear => write!(f, "linear"),
            ResizeMode::Cubic => write!(f, "cubic"),
        }
    }
}

/// The primitive applied at one expression node.
///
/// Concrete (non-symbolic) operator arguments live inside the variant;
/// tensor operands are the node's inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    /// A free variable: a graph input of declared shape.
    Source { name: String },
    /// An embedded constant.
    Const(Tensor),
    /// Grouping of several values into one (graph boundary only).
    Tuple,

    // elementwise
    Add,
    Sub,
    Mul,
    Pow,
    Sqrt,
    Erf,
    Relu,

    // linear algebra
    Dense,
    BatchMatMul,
    BiasAdd { axis: usize },

    // cnn
    Conv2d {
        channels: i64,
        kernel: TVec<i64>,
        strides: TVec<i64>,
        padding: TVec<i64>,
        dilations: TVec<i64>,
        group: i64,
    },
    MaxPool2d {
        kernel: TVec<i64>,
        strides: TVec<i64>,
        padding: TVec<i64>,
        dilations: TVec<i64>,
        ceil_mode: bool,
    },
    GlobalAvgPool { spatial_rank: usize },

    // nn
    Softmax { axis: usize },
    BatchFlatten,

    // array
    Reshape { shape: TVec<i64>, allow_zero: bool },
    Transpose { perm: Option<TVec<i64>> },
    Concat { axis: usize },
    Squeeze { axes: Option<TVec<i64>> },
    BroadcastTo { shape: TVec<i64> },
    /// 1-D range extraction, end exclusive.
    Slice { begin: i64, end: i64 },
    ShapeOf,
    Cast { to: DatumType },

    // image
    Resize2d {
        size: TVec<i64>,
        mode: ResizeMode,
        coord_transform: String,
        nearest_mode: String,
        cubic_coeff: f32,
        exclude_outside: bool,
        extrapolation_value: f32,
    },
}

/// The annotation attached to a value: a tensor fact, or the element facts
/// of a tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Fact {
    Tensor(TypedFact),
    Tuple(TVec<TypedFact>),
}

impl Fact {
    pub fn as_tensor(&self) -> FerryResult<&TypedFact> {
        match self {
            Fact::Tensor(f) => Ok(f),
            Fact::Tuple(_) => bail_construction!("tuple value has no tensor fact"),
        }
    }
}

#[derive(Debug)]
struct ExprNode {
    op: OpKind,
    inputs: TVec<Value>,
    fact: Fact,
}

/// An opaque handle to one point in the constructed IR.
#[derive(Debug, Clone)]
pub struct Value(Arc<ExprNode>);

impl Value {
    pub(crate) fn build(op: OpKind, inputs: TVec<Value>, fact: TypedFact) -> Value {
        Value(Arc::new(ExprNode { op, inputs, fact: Fact::Tensor(fact) }))
    }

    /// A fresh graph-input value of the declared (possibly partially
    /// unknown) shape.
    pub fn source(name: impl Into<String>, fact: TypedFact) -> Value {
        Value::build(OpKind::Source { name: name.into() }, tvec!(), fact)
    }

    /// An embedded constant value.
    pub fn konst(tensor: Tensor) -> Value {
        let fact = TypedFact::new(
            tensor.datum_type(),
            tensor.shape().iter().map(|d| *d as i64).collect(),
        );
        Value::build(OpKind::Const(tensor), tvec!(), fact)
    }

    /// Groups several values into a single tuple value.
    pub fn tuple(values: TVec<Value>) -> FerryResult<Value> {
        let facts: FerryResult<TVec<TypedFact>> =
            values.iter().map(|v| v.fact().map(|f| f.clone())).collect();
        Ok(Value(Arc::new(ExprNode { op: OpKind::Tuple, inputs: values, fact: Fact::Tuple(facts?) })))
    }

    pub fn op(&self) -> &OpKind {
        &self.0.op
    }

    pub fn inputs(&self) -> &[Value] {
        &self.0.inputs
    }

    /// The tensor fact of this value; fails on tuple values.
    pub fn fact(&self) -> FerryResult<&TypedFact> {
        self.0.fact.as_tensor()
    }

    pub fn annotation(&self) -> &Fact {
        &self.0.fact
    }

    pub fn as_const(&self) -> Option<&Tensor> {
        match &self.0.op {
            OpKind::Const(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.as_const().is_some()
    }

    pub fn is_source(&self) -> bool {
        matches!(&self.0.op, OpKind::Source { .. })
    }

    /// Pointer identity: true when both handles designate the same node.
    pub fn same_as(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Rebuilds the node with new inputs, keeping operator and fact.
    /// Constant folding uses this to substitute folded operands.
    pub(crate) fn with_inputs(&self, inputs: TVec<Value>) -> Value {
        Value(Arc::new(ExprNode { op: self.0.op.clone(), inputs, fact: self.0.fact.clone() }))
    }
}
