use crate::internal::*;
use crate::ops::source::Parameter;
use crate::plan::{SimplePlan, SimpleState};

/// Run one of two sub-functions depending on a boolean scalar.
///
/// The first input is the condition, the others feed the parameters of both
/// bodies, in order. Both bodies must have as many results as the `If` has
/// outputs.
#[derive(Debug, Clone, new)]
pub struct If {
    pub then_body: Arc<Function>,
    pub else_body: Arc<Function>,
}

impl If {
    /// Result descriptors of `body` once its parameters are refined with
    /// the actual inputs.
    fn specialize(body: &Function, inputs: &[TensorDesc]) -> GraftResult<TVec<TensorDesc>> {
        ensure!(
            body.parameters().len() == inputs.len(),
            "Body {} has {} parameters, {} inputs given",
            body.name,
            body.parameters().len(),
            inputs.len()
        );
        let mut body = body.clone();
        for (&p, input) in body.parameters().to_vec().iter().zip(inputs) {
            let node = body.node_mut(p)?;
            let Some(param) = node.op_as_mut::<Parameter>() else { bail!("Parameter expected, got {node}") };
            let et = ElementType::merge(param.element_type, input.element_type)
                .with_context(|| format!("Input of type {} for a parameter of type {}", input.element_type, param.element_type))?;
            let shape = PartialShape::merge(&param.shape, &input.shape)
                .with_context(|| format!("Input of shape {} for a parameter of shape {}", input.shape, param.shape))?;
            param.element_type = et;
            param.shape = shape;
            node.state = ValidationState::Unvalidated;
        }
        body.validate_nodes_and_infer_types()?;
        (0..body.results().len()).map(|ix| Ok(body.result_desc(ix)?.clone())).collect()
    }

    fn body_is_stateless(body: &Function) -> bool {
        body.nodes().iter().filter(|n| !n.is_garbage()).all(|n| n.op.is_stateless())
    }
}

impl Operation for If {
    fn nb_outputs(&self) -> usize {
        self.then_body.results().len()
    }

    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        node_check!(ctx, !ctx.inputs().is_empty(), "If needs a condition input");
        node_check!(
            ctx,
            self.then_body.results().len() == self.else_body.results().len(),
            "then body has {} results, else body {}",
            self.then_body.results().len(),
            self.else_body.results().len()
        );
        let cond = ctx.input(0)?.clone();
        node_check!(
            ctx,
            cond.element_type.is_dynamic() || cond.element_type == ElementType::Boolean,
            "Condition must be boolean, got {}",
            cond.element_type
        );
        node_check!(ctx, cond.shape.volume().compatible(&Dimension::new(1)), "Condition must be a scalar, got {}", cond.shape);
        let inputs = ctx.inputs()[1..].to_vec();
        let branch = cond.konst.as_ref().map(|c| c.as_i64s().first().is_some_and(|c| *c != 0));
        let descs = match branch {
            Some(true) => Self::specialize(&self.then_body, &inputs),
            Some(false) => Self::specialize(&self.else_body, &inputs),
            None => Self::specialize(&self.then_body, &inputs).and_then(|then| {
                let otherwise = Self::specialize(&self.else_body, &inputs)?;
                then.into_iter()
                    .zip(otherwise)
                    .map(|(a, b)| {
                        let et = ElementType::merge(a.element_type, b.element_type).with_context(|| {
                            format!("Branches produce {} and {}", a.element_type, b.element_type)
                        })?;
                        Ok(TensorDesc::new(et, PartialShape::hull(&a.shape, &b.shape)))
                    })
                    .collect()
            }),
        };
        let descs = descs.map_err(|e| ctx.failure(format!("{e:#}")))?;
        for (ix, desc) in descs.into_iter().enumerate() {
            ctx.set_output_type(ix, desc.element_type, desc.shape);
        }
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let cond = inputs.first().context("If needs a condition input")?;
        let cond = cond.cast_to::<bool>()?.to_scalar::<bool>()?;
        let body = if cond { &self.then_body } else { &self.else_body };
        let plan = SimplePlan::new(body.as_ref())?;
        SimpleState::new(plan).run_arcs(inputs[1..].iter().cloned().collect())
    }

    fn is_stateless(&self) -> bool {
        Self::body_is_stateless(&self.then_body) && Self::body_is_stateless(&self.else_body)
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("then_body", &AttributeValue::Function(self.then_body.clone()))?;
        visitor.on_attribute("else_body", &AttributeValue::Function(self.else_body.clone()))
    }
}
