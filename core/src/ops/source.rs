use crate::internal::*;

/// A function input.
#[derive(Debug, Clone, PartialEq, new)]
pub struct Parameter {
    pub element_type: ElementType,
    pub shape: PartialShape,
    /// informative only
    #[new(default)]
    pub layout: Option<Layout>,
}

impl Parameter {
    pub fn with_layout(mut self, layout: Layout) -> Parameter {
        self.layout = Some(layout);
        self
    }
}

impl Operation for Parameter {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(0, 0)?;
        if let (Some(layout), Some(rank)) = (&self.layout, self.shape.rank_length()) {
            node_check!(
                ctx,
                layout.rank().is_none_or(|r| r == rank),
                "Layout {} does not match shape {}",
                layout,
                self.shape
            );
        }
        ctx.set_output_type(0, self.element_type, self.shape.clone());
        Ok(())
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("element_type", &AttributeValue::ElementType(self.element_type))?;
        visitor.on_attribute("shape", &AttributeValue::Shape(self.shape.clone()))?;
        if let Some(layout) = &self.layout {
            visitor.on_attribute("layout", &AttributeValue::String(layout.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout_rank_must_match() {
        let mut model = Function::new("p");
        let p = Parameter::new(ElementType::F32, PartialShape::from_static(&[1, 3, 8, 8]));
        model.wire_node("ok", p.clone().with_layout("NCHW".parse().unwrap()), &[]).unwrap();
        model.wire_node("ellipsis", p.clone().with_layout("N...C".parse().unwrap()), &[]).unwrap();
        assert!(model.wire_node("bad", p.with_layout("NC".parse().unwrap()), &[]).is_err());
    }
}
