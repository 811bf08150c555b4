use crate::internal::*;

/// Element type conversion. Float to integer truncates toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct Convert {
    pub to: ElementType,
}

impl Operation for Convert {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(1, 1)?;
        node_check!(ctx, self.to.is_static(), "Destination type must be static");
        let shape = ctx.input_shape(0)?.clone();
        ctx.set_output_type(0, self.to, shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let input = args_1!(inputs);
        let output = input.cast_to_dt(self.to)?.into_owned();
        Ok(tvec!(output.into_arc_tensor()))
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("destination_type", &AttributeValue::ElementType(self.to))
    }
}
