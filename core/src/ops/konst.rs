use crate::internal::*;

/// A value embedded in the graph.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Constant {
    pub value: Arc<Tensor>,
}

impl Constant {
    pub fn value(&self) -> &Arc<Tensor> {
        &self.value
    }
}

impl Operation for Constant {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(0, 0)?;
        ctx.set_output_type(0, self.value.element_type(), PartialShape::from_static(self.value.shape()));
        ctx.set_output_value(0, self.value.clone());
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        Ok(tvec!(self.value.clone()))
    }

    // Folding a constant would be a no-op rewrite.
    fn can_constant_fold(&self) -> bool {
        false
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("element_type", &AttributeValue::ElementType(self.value.element_type()))?;
        visitor.on_attribute(
            "shape",
            &AttributeValue::VecI64(self.value.shape().iter().map(|&d| d as i64).collect()),
        )?;
        visitor.on_attribute("value", &AttributeValue::Buffer(self.value.clone()))
    }
}
