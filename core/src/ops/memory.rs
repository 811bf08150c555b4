//! Variables: state carried across runs of a function.
//!
//! `ReadValue` produces the current value of a variable (or its initializer
//! on the first run), `Assign` stores a new one. Both touch state outside of
//! their inputs, so neither can be folded. The state itself lives in the
//! evaluator (`SimpleState`).
use crate::internal::*;

#[derive(Debug, Clone, PartialEq, new)]
pub struct ReadValue {
    pub variable_id: String,
    pub element_type: ElementType,
    pub shape: PartialShape,
}

impl Operation for ReadValue {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(1, 1)?;
        let init = ctx.input(0)?.clone();
        let Some(et) = ElementType::merge(self.element_type, init.element_type) else {
            return Err(ctx.failure(format!(
                "Variable {} holds {}, initializer is {}",
                self.variable_id, self.element_type, init.element_type
            )));
        };
        node_check!(
            ctx,
            self.shape.compatible(&init.shape),
            "Variable {} is of shape {}, initializer is {}",
            self.variable_id,
            self.shape,
            init.shape
        );
        ctx.set_input_is_relevant_to_value(0, false);
        ctx.set_output_type(0, et, self.shape.clone());
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    /// Without state, a variable reads as its initializer.
    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let init = args_1!(inputs);
        Ok(tvec!(init))
    }

    fn is_stateless(&self) -> bool {
        false
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("variable_id", &AttributeValue::String(self.variable_id.clone()))?;
        visitor.on_attribute("variable_type", &AttributeValue::ElementType(self.element_type))?;
        visitor.on_attribute("variable_shape", &AttributeValue::Shape(self.shape.clone()))
    }
}

/// Store its input into a variable. An `Assign` is usually a sink of its
/// function: nothing consumes it, but it must be executed.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Assign {
    pub variable_id: String,
}

impl Operation for Assign {
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

    fn is_stateless(&self) -> bool {
        false
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("variable_id", &AttributeValue::String(self.variable_id.clone()))
    }
}
