use crate::internal::*;

/// A function output. Forwards its single input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Result;

impl Operation for Result {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(1, 1)?;
        let input = ctx.input(0)?.clone();
        ctx.set_output_type(0, input.element_type, input.shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        Ok(inputs)
    }

    fn can_constant_fold(&self) -> bool {
        false
    }
}
