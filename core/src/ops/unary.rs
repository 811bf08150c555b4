use crate::internal::*;

/// `max(x, 0)`, element-wise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relu;

impl Operation for Relu {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(1, 1)?;
        let input = ctx.input(0)?.clone();
        node_check!(
            ctx,
            input.element_type != ElementType::Boolean,
            "Relu expects a numeric input, got {}",
            input.element_type
        );
        ctx.set_output_type(0, input.element_type, input.shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let input = args_1!(inputs);
        fn relu<T: Arith>(t: &Tensor) -> GraftResult<Tensor> {
            Ok(t.to_array_view::<T>()?.mapv(|x| x.maxi(T::zero())).into())
        }
        let output = dispatch_numbers!(relu(input.element_type())(&input))?;
        Ok(tvec!(output.into_arc_tensor()))
    }
}
