//! The Resize operator.
//!
//! Target spatial dims come either from the `sizes` input or from the
//! `scales` input. The scales path is lowered as shape arithmetic over the
//! input's symbolic shape, then folded; translation only proceeds when the
//! result comes out constant.

use ferry_ir::expr::ResizeMode;
use ferry_ir::internal::*;

use crate::env::Environment;
use crate::graph::NodeDef;
use crate::infer;
use crate::ops::{
    check_input_arity_range, check_op_type, check_output_arity, wire, OnnxOpRegister, OpTranslator,
};

pub fn register(reg: &mut OnnxOpRegister) {
    reg.insert("Resize", Box::new(Resize));
}

struct Resize;

impl Resize {
    /// `[height, width]` from the `sizes` input, a constant int64 vector of
    /// one entry per input dim.
    fn spatial_from_sizes(node: &NodeDef, env: &Environment, name: &str) -> FerryResult<TVec<i64>> {
        let sizes = fold(&env.resolve(node, name)?)?;
        let sizes = match sizes.as_const() {
            Some(t) => t.to_i64_vec()?,
            None => {
                bail_feature!("node {} (Resize): sizes input is not a constant", node.name)
            }
        };
        if sizes.len() != 4 {
            bail_graph!("node {} (Resize): sizes must have 4 entries, got {:?}", node.name, sizes);
        }
        Ok(tvec!(sizes[2], sizes[3]))
    }

    /// `[height, width]` from the `scales` input: round(scale * dim), built
    /// as IR shape arithmetic and folded down to a constant.
    fn spatial_from_scales(
        node: &NodeDef,
        env: &Environment,
        data: &Value,
        name: &str,
    ) -> FerryResult<TVec<i64>> {
        let scales = env.resolve(node, name)?;
        let shape = infer::symbolic_shape(data)?;
        let shape = ops::array::cast(&shape, DatumType::F32)?;
        let scaled = ops::math::mul(&shape, &scales)?;
        let spatial = fold(&ops::array::slice(&scaled, 2, 4)?)?;
        match spatial.as_const().and_then(|t| t.as_f32s().cloned()) {
            Some(dims) => Ok(dims.iter().map(|d| d.round() as i64).collect()),
            None => bail_feature!(
                "node {} (Resize): target size is not computable at translation time",
                node.name
            ),
        }
    }

    /// The spatial region of interest: entries 2..4 and 6..8 of the 8-entry
    /// roi input, when that input is given at all.
    fn spatial_roi(node: &NodeDef, env: &Environment, name: &str) -> FerryResult<Option<Value>> {
        if name.is_empty() {
            return Ok(None);
        }
        let roi = env.resolve(node, name)?;
        let begins = ops::array::slice(&roi, 2, 4)?;
        let ends = ops::array::slice(&roi, 6, 8)?;
        Ok(Some(fold(&ops::array::concat(0, &[begins, ends])?)?))
    }
}

impl OpTranslator for Resize {
    fn name(&self) -> &'static str {
        "Resize"
    }

    fn translate(&self, node: &NodeDef, env: &mut Environment) -> FerryResult<Value> {
        check_op_type(node, self.name())?;
        check_output_arity(node, 1)?;
        check_input_arity_range(node, 3, 4)?;
        let data = env.resolve(node, &node.inputs[0])?;
        if infer::rank(&data)? != 4 {
            bail_feature!("node {} (Resize): only rank-4 inputs supported", node.name);
        }

        let mode = match node.get_attr_or("mode", "nearest") {
            "nearest" => ResizeMode::NearestNeighbor,
            "linear" => ResizeMode::Linear,
            "cubic" => ResizeMode::Cubic,
            other => bail_feature!("node {} (Resize): mode '{}' not supported", node.name, other),
        };
        let coord_transform = node.get_attr_or("coordinate_transformation_mode", "half_pixel");
        let nearest_mode = node.get_attr_or("nearest_mode", "round_prefer_floor");
        let cubic_coeff = node.get_attr_or("cubic_coeff_a", -0.75f32);
        let exclude_outside = node.get_attr_or("exclude_outside", 0i64) != 0;
        let extrapolation_value = node.get_attr_or("extrapolation_value", 0f32);

        let size = if node.inputs.len() == 4 && !node.inputs[3].is_empty() {
            Self::spatial_from_sizes(node, env, &node.inputs[3])?
        } else if !node.inputs[2].is_empty() {
            Self::spatial_from_scales(node, env, &data, &node.inputs[2])?
        } else {
            bail_graph!("node {} (Resize): neither scales nor sizes given", node.name);
        };
        let roi = Self::spatial_roi(node, env, &node.inputs[1])?;

        let out = ops::image::resize2d(
            &data,
            roi.as_ref(),
            &size,
            mode,
            coord_transform,
            nearest_mode,
            cubic_coeff,
            exclude_outside,
            extrapolation_value,
        )?;
        wire(node, env, out)
    }
}
