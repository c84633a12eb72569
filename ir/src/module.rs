use crate::expr::{OpKind, Value};
use crate::TVec;

/// The terminal artifact of a translation: one function value closing over
/// its inputs and a single body (a lone output, or a tuple of outputs).
///
/// Constructed once per successful translation, then handed to downstream
/// passes and code generation.
#[derive(Debug, Clone, new)]
pub struct Module {
    inputs: TVec<Value>,
    body: Value,
}

impl Module {
    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The output values in declared order: the tuple elements when the body
    /// is a tuple, otherwise the body itself.
    pub fn outputs(&self) -> TVec<Value> {
        match self.body.op() {
            OpKind::Tuple => self.body.inputs().iter().cloned().collect(),
            _ => tvec!(self.body.clone()),
        }
    }
}
