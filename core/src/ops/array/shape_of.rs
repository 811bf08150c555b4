use crate::internal::*;

/// The shape of the input, as a rank 1 integer tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct ShapeOf {
    pub output_type: ElementType,
}

impl Default for ShapeOf {
    fn default() -> ShapeOf {
        ShapeOf { output_type: ElementType::I64 }
    }
}

impl ShapeOf {
    fn shape_tensor(&self, shape: &[usize]) -> GraftResult<Arc<Tensor>> {
        let dims = shape.iter().map(|&d| d as i64).collect::<Vec<_>>();
        Ok(tensor1(&dims).cast_to_dt(self.output_type)?.into_owned().into_arc_tensor())
    }
}

impl Operation for ShapeOf {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(1, 1)?;
        node_check!(
            ctx,
            matches!(self.output_type, ElementType::I64 | ElementType::I32),
            "Output type must be i32 or i64, got {}",
            self.output_type
        );
        ctx.set_input_is_relevant_to_value(0, false);
        let input = ctx.input_shape(0)?.clone();
        let rank = input.rank();
        ctx.set_output_type(0, self.output_type, PartialShape::new([rank]));
        if let Ok(shape) = input.to_shape() {
            let value = self.shape_tensor(&shape)?;
            ctx.set_output_value(0, value);
        }
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let input = args_1!(inputs);
        Ok(tvec!(self.shape_tensor(input.shape())?))
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("output_type", &AttributeValue::ElementType(self.output_type))
    }
}
