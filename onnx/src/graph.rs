//! In-memory representation of an ONNX-style graph.
//!
//! These structures mirror the subset of the ONNX model format the front end
//! consumes: named nodes with attribute lists, declared inputs with element
//! type and shape, raw little-endian initializers, and a list of output
//! names. Loaders fill them in; the translator only ever reads them.

use std::collections::BTreeMap;

use ferry_ir::prelude::*;

/// Element type tag of a declared input or initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    F32,
    F64,
    F16,
    I32,
    I64,
    U8,
    Bool,
    String,
}

impl std::fmt::Display for ElemType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ElemType::F32 => "float32",
            ElemType::F64 => "float64",
            ElemType::F16 => "float16",
            ElemType::I32 => "int32",
            ElemType::I64 => "int64",
            ElemType::U8 => "uint8",
            ElemType::Bool => "bool",
            ElemType::String => "string",
        };
        write!(f, "{}", name)
    }
}

impl ElemType {
    /// The IR element type, for the types the IR carries.
    pub fn to_datum_type(self) -> Option<DatumType> {
        match self {
            ElemType::F32 => Some(DatumType::F32),
            ElemType::I64 => Some(DatumType::I64),
            _ => None,
        }
    }
}

/// One attribute payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Strs(Vec<String>),
}

impl AttrValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Str(_) => "string",
            AttrValue::Ints(_) => "ints",
            AttrValue::Floats(_) => "floats",
            AttrValue::Strs(_) => "strings",
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> AttrValue {
        AttrValue::Int(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> AttrValue {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> AttrValue {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> AttrValue {
        AttrValue::Str(v)
    }
}

impl From<&[i64]> for AttrValue {
    fn from(v: &[i64]) -> AttrValue {
        AttrValue::Ints(v.to_vec())
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> AttrValue {
        AttrValue::Ints(v)
    }
}

impl From<&[f32]> for AttrValue {
    fn from(v: &[f32]) -> AttrValue {
        AttrValue::Floats(v.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

/// One operator invocation. Input and output names refer to values by name;
/// an empty input name stands for an omitted optional input.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDef {
    pub name: String,
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl NodeDef {
    pub fn new(op_type: &str, name: &str, inputs: &[&str], outputs: &[&str]) -> NodeDef {
        NodeDef {
            name: name.to_string(),
            op_type: op_type.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attributes: vec![],
        }
    }

    /// Appends an attribute. Appending again under the same name shadows the
    /// previous occurrence: lookups take the last one.
    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> NodeDef {
        self.attributes.push(Attribute { name: name.to_string(), value: value.into() });
        self
    }
}

/// A declared graph input: name, element type and shape, with `-1` marking
/// an unknown dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDef {
    pub name: String,
    pub elem_type: ElemType,
    pub shape: Vec<i64>,
}

impl ValueDef {
    pub fn new(name: &str, elem_type: ElemType, shape: &[i64]) -> ValueDef {
        ValueDef { name: name.to_string(), elem_type, shape: shape.to_vec() }
    }
}

/// An initializer: a named constant with raw little-endian data, possibly
/// stored outside the model file.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDef {
    pub name: String,
    pub elem_type: ElemType,
    pub shape: Vec<i64>,
    pub data: Vec<u8>,
    pub external: bool,
}

impl TensorDef {
    pub fn f32s(name: &str, shape: &[i64], values: &[f32]) -> TensorDef {
        TensorDef {
            name: name.to_string(),
            elem_type: ElemType::F32,
            shape: shape.to_vec(),
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            external: false,
        }
    }

    pub fn i64s(name: &str, shape: &[i64], values: &[i64]) -> TensorDef {
        TensorDef {
            name: name.to_string(),
            elem_type: ElemType::I64,
            shape: shape.to_vec(),
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            external: false,
        }
    }
}

/// A whole model graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDef {
    pub name: String,
    pub inputs: Vec<ValueDef>,
    pub outputs: Vec<String>,
    pub initializers: Vec<TensorDef>,
    pub nodes: Vec<NodeDef>,
}

impl GraphDef {
    pub fn new(name: &str) -> GraphDef {
        GraphDef { name: name.to_string(), ..GraphDef::default() }
    }

    /// Counts nodes per operator type. Handy to check a model against the
    /// supported operator set before translating it.
    pub fn op_type_census(&self) -> BTreeMap<&str, usize> {
        let mut census = BTreeMap::new();
        for node in &self.nodes {
            *census.entry(&*node.op_type).or_insert(0) += 1;
        }
        census
    }
}
