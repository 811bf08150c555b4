//! Reference evaluation of a whole function on host tensors.
use std::borrow::Borrow;

use crate::internal::*;
use crate::ops::memory::{Assign, ReadValue};
use crate::ops::source::Parameter;

/// A function and the order in which to evaluate its nodes.
#[derive(Debug, Clone)]
pub struct SimplePlan<M: Borrow<Function>> {
    pub model: M,
    pub order: Vec<usize>,
    /// per node, the last step at which one of its outputs is read
    flush_after: Vec<usize>,
}

impl<M: Borrow<Function>> SimplePlan<M> {
    pub fn new(model: M) -> GraftResult<SimplePlan<M>> {
        let order = model.borrow().get_ordered_ops()?;
        let mut flush_after = vec![0; model.borrow().nodes().len()];
        for (step, &n) in order.iter().enumerate() {
            for i in &model.borrow().nodes()[n].inputs {
                flush_after[i.node] = step;
            }
        }
        Ok(SimplePlan { model, order, flush_after })
    }

    pub fn model(&self) -> &Function {
        self.model.borrow()
    }

    /// Run once, with fresh variables.
    pub fn run(&self, inputs: TVec<Tensor>) -> GraftResult<TVec<Arc<Tensor>>> {
        let mut state = SimpleState::new(self);
        state.run(inputs)
    }
}

/// Evaluation state of a plan: the values of the variables, kept from one
/// run to the next.
#[derive(Debug, Clone)]
pub struct SimpleState<M: Borrow<Function>, P: Borrow<SimplePlan<M>>> {
    plan: P,
    pub variables: HashMap<String, Arc<Tensor>>,
    _phantom: std::marker::PhantomData<M>,
}

impl<M: Borrow<Function>, P: Borrow<SimplePlan<M>>> SimpleState<M, P> {
    pub fn new(plan: P) -> SimpleState<M, P> {
        SimpleState { plan, variables: HashMap::default(), _phantom: std::marker::PhantomData }
    }

    pub fn model(&self) -> &Function {
        self.plan.borrow().model()
    }

    /// Forget every variable: the next run reads initializers again.
    pub fn reset_variables(&mut self) {
        self.variables.clear();
    }

    pub fn run(&mut self, inputs: TVec<Tensor>) -> GraftResult<TVec<Arc<Tensor>>> {
        self.run_arcs(inputs.into_iter().map(Arc::new).collect())
    }

    pub fn run_arcs(&mut self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let &mut SimpleState { ref plan, ref mut variables, .. } = self;
        let plan: &SimplePlan<M> = plan.borrow();
        let model = plan.model();
        ensure!(
            inputs.len() == model.parameters().len(),
            "Function {} expects {} inputs, got {}",
            model.name,
            model.parameters().len(),
            inputs.len()
        );
        let mut inputs: TVec<Option<Arc<Tensor>>> = inputs.into_iter().map(Some).collect();
        let mut values: Vec<Option<TVec<Arc<Tensor>>>> = vec![None; model.nodes().len()];
        for (step, &n) in plan.order.iter().enumerate() {
            let node = model.node(n)?;
            trace!("Running step {step}, node {node}");
            let node_inputs = node
                .inputs
                .iter()
                .map(|i| {
                    values[i.node]
                        .as_ref()
                        .and_then(|v| v.get(i.slot))
                        .cloned()
                        .with_context(|| format!("Input {i:?} of {node} not computed"))
                })
                .collect::<GraftResult<TVec<_>>>()?;
            let outputs = if node.op_is::<Parameter>() {
                let ix = model.parameters().iter().position(|&p| p == n).context("Dangling parameter")?;
                let input = inputs[ix].take().context("Parameter fed twice")?;
                ensure!(
                    node.outputs[0].desc.matches(&input),
                    "Input #{} of {}: expected {:?}, got {:?}",
                    ix,
                    model.name,
                    node.outputs[0].desc,
                    input
                );
                tvec!(input)
            } else if let Some(read) = node.op_as::<ReadValue>() {
                match variables.get(&read.variable_id) {
                    Some(value) => tvec!(value.clone()),
                    None => node.op.eval(node_inputs)?,
                }
            } else if let Some(assign) = node.op_as::<Assign>() {
                let outputs = node.op.eval(node_inputs)?;
                variables.insert(assign.variable_id.clone(), outputs[0].clone());
                outputs
            } else {
                node.op.eval(node_inputs).with_context(|| format!("Evaluating {node}"))?
            };
            ensure!(
                outputs.len() == node.outputs.len(),
                "Evaluating {}: expected {} outputs, got {}",
                node,
                node.outputs.len(),
                outputs.len()
            );
            if cfg!(debug_assertions) {
                for (ix, (v, o)) in outputs.iter().zip(node.outputs.iter()).enumerate() {
                    ensure!(o.desc.matches(v), "Evaluating {}: output {}, expected {:?}, got {:?}", node, ix, o.desc, v);
                }
            }
            values[n] = Some(outputs);
            for i in &node.inputs {
                if plan.flush_after[i.node] == step {
                    values[i.node] = None;
                }
            }
        }
        model
            .results()
            .iter()
            .map(|&r| {
                values[r].as_ref().and_then(|v| v.first()).cloned().with_context(|| format!("Result #{r} not computed"))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::binary::Add;

    #[test]
    fn accumulate_in_variable() {
        let mut model = Function::new("counter");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::from_static(&[2])).unwrap();
        let init = model.add_const("init", tensor1(&[0f32, 0.0])).unwrap();
        let read = model
            .wire_node("read", ReadValue::new("acc".into(), ElementType::F32, PartialShape::from_static(&[2])), &[init])
            .unwrap();
        let sum = model.wire_node("sum", Add::default(), &[read[0], x]).unwrap();
        let assign = model.wire_node("assign", Assign::new("acc".into()), &sum).unwrap();
        model.add_sink(assign[0].node).unwrap();
        model.add_result(sum[0]).unwrap();

        let plan = SimplePlan::new(&model).unwrap();
        let mut state = SimpleState::new(&plan);
        let out = state.run(tvec!(tensor1(&[1f32, 2.0]))).unwrap();
        assert_eq!(*out[0], tensor1(&[1f32, 2.0]));
        let out = state.run(tvec!(tensor1(&[1f32, 2.0]))).unwrap();
        assert_eq!(*out[0], tensor1(&[2f32, 4.0]));
        state.reset_variables();
        let out = state.run(tvec!(tensor1(&[5f32, 5.0]))).unwrap();
        assert_eq!(*out[0], tensor1(&[5f32, 5.0]));
    }

    #[test]
    fn inputs_are_checked() {
        let mut model = Function::new("id");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::from_static(&[2])).unwrap();
        model.add_result(x).unwrap();
        let plan = SimplePlan::new(&model).unwrap();
        assert!(plan.run(tvec!(tensor1(&[1f32, 2.0, 3.0]))).is_err());
        assert!(plan.run(tvec!(tensor1(&[1i32, 2]))).is_err());
        assert!(plan.run(tvec!()).is_err());
        assert_eq!(*plan.run(tvec!(tensor1(&[1f32, 2.0]))).unwrap()[0], tensor1(&[1f32, 2.0]));
    }

    #[test]
    fn state_owning_its_plan() {
        let mut model = Function::new("double");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::from_static(&[2])).unwrap();
        let sum = model.wire_node("sum", Add::default(), &[x, x]).unwrap();
        model.add_result(sum[0]).unwrap();
        let mut state = SimpleState::new(SimplePlan::new(&model).unwrap());
        assert_eq!(state.model().name, "double");
        for _ in 0..2 {
            let out = state.run(tvec!(tensor1(&[1f32, 2.5]))).unwrap();
            assert_eq!(*out[0], tensor1(&[2f32, 5.0]));
        }
    }
}
