//! Buffer reuse constraints between nodes.
//!
//! Two nodes are memory dependent when their outputs may be alive at the
//! same time for some order of execution: their buffers can not be shared.
//! Along a given topological order, an output is alive from the step
//! producing it up to the step of its last consumer, so every node scheduled
//! strictly in between is marked dependent with its producer.
use std::collections::{BTreeMap, BTreeSet};

use super::{Pass, PassSession};
use crate::internal::*;

/// Runtime info key holding the friendly names of the nodes a node must not
/// share its buffers with.
pub const MEMORY_DEPENDENCIES: &str = "memory_dependencies";

/// Symmetric relation between node ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryDependencies(pub BTreeMap<usize, BTreeSet<usize>>);

impl MemoryDependencies {
    /// Compute the relation for `order`, a topological order of the live
    /// nodes of `model`.
    pub fn compute(model: &Function, order: &[usize]) -> GraftResult<MemoryDependencies> {
        let mut position = vec![None; model.nodes().len()];
        for (step, &n) in order.iter().enumerate() {
            position[n] = Some(step);
        }
        let mut deps = MemoryDependencies::default();
        for (step, &n) in order.iter().enumerate() {
            let node = model.node(n)?;
            // consumers outside of the order never run
            let last_use = node.outputs.iter().flat_map(|o| o.successors.iter()).filter_map(|s| position[s.node]).max();
            let Some(last_use) = last_use else { continue };
            ensure!(last_use > step, "Order is not topological: {} runs after a consumer", node);
            for &other in &order[step + 1..last_use] {
                deps.add(n, other);
            }
        }
        Ok(deps)
    }

    pub fn add(&mut self, a: usize, b: usize) {
        self.0.entry(a).or_default().insert(b);
        self.0.entry(b).or_default().insert(a);
    }

    /// Nodes `node` can not share buffers with.
    pub fn get(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.0.get(&node).into_iter().flat_map(|deps| deps.iter().copied())
    }

    /// True if `a` and `b` can not share buffers.
    pub fn forbidden(&self, a: usize, b: usize) -> bool {
        self.0.get(&a).is_some_and(|deps| deps.contains(&b))
    }
}

/// Annotate every node with its memory dependencies, computed along the
/// function default order, as a list of friendly names under
/// `MEMORY_DEPENDENCIES`.
///
/// This only annotates: the pass always reports zero changes.
#[derive(Clone, Debug, Default)]
pub struct MarkMemoryDependencies;

impl Pass for MarkMemoryDependencies {
    fn name(&self) -> Cow<'static, str> {
        "mark-memory-dependencies".into()
    }

    fn run(&mut self, _session: &mut PassSession, model: &mut Function) -> GraftResult<usize> {
        let order = model.get_ordered_ops()?;
        let deps = MemoryDependencies::compute(model, &order)?;
        for &n in &order {
            let names: BTreeSet<String> =
                deps.get(n).map(|d| Ok(model.node(d)?.friendly_name().to_string())).collect::<GraftResult<_>>()?;
            let node = model.node_mut(n)?;
            if names.is_empty() {
                node.rt_info.remove(MEMORY_DEPENDENCIES);
            } else {
                let value = AttributeValue::VecString(names.into_iter().collect());
                node.rt_info.insert(MEMORY_DEPENDENCIES, RtAttribute::Value(value));
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::binary::{Add, Multiply};
    use crate::ops::unary::Relu;

    #[test]
    fn chain_has_no_dependencies() {
        let mut model = Function::new("chain");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::dynamic()).unwrap();
        let b = model.wire_node("b", Relu, &[a]).unwrap();
        let c = model.wire_node("c", Relu, &b).unwrap();
        model.add_result(c[0]).unwrap();
        let order = model.get_ordered_ops().unwrap();
        let deps = MemoryDependencies::compute(&model, &order).unwrap();
        assert_eq!(deps.get(b[0].node).count(), 0);
        assert!(!deps.forbidden(a.node, c[0].node));
    }

    #[test]
    fn diamond() {
        crate::setup_test_logger();
        let mut model = Function::new("diamond");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::dynamic()).unwrap();
        let left = model.wire_node("left", Relu, &[a]).unwrap()[0];
        let right = model.wire_node("right", Relu, &[a]).unwrap()[0];
        let join = model.wire_node("join", Add::default(), &[left, right]).unwrap()[0];
        model.add_result(join).unwrap();
        let order = vec![a.node, left.node, right.node, join.node, model.results()[0]];
        let deps = MemoryDependencies::compute(&model, &order).unwrap();
        // a is alive while left runs, left while right runs
        assert!(deps.forbidden(left.node, right.node));
        assert!(deps.forbidden(right.node, left.node));
        assert!(deps.forbidden(a.node, left.node));
        assert!(!deps.forbidden(a.node, right.node));
        assert!(!deps.forbidden(right.node, join.node));
        assert!(!deps.forbidden(a.node, join.node));
    }

    #[test]
    fn rejects_non_topological_order() {
        let mut model = Function::new("m");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::dynamic()).unwrap();
        let b = model.wire_node("b", Relu, &[a]).unwrap()[0];
        model.add_result(b).unwrap();
        let order = vec![b.node, a.node, model.results()[0]];
        assert!(MemoryDependencies::compute(&model, &order).is_err());
    }

    #[test]
    fn annotate() {
        let mut model = Function::new("m");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::dynamic()).unwrap();
        let r = model.wire_node("r", Relu, &[a]).unwrap()[0];
        let m = model.wire_node("m", Multiply::default(), &[r, a]).unwrap()[0];
        model.add_result(m).unwrap();
        let mut session = PassSession::default();
        assert_eq!(MarkMemoryDependencies.run(&mut session, &mut model).unwrap(), 0);
        assert_eq!(session.counter(), 0);
        let expected = |name: &str| RtAttribute::Value(AttributeValue::VecString(vec![name.to_string()]));
        assert_eq!(model.node(r.node).unwrap().rt_info.get(MEMORY_DEPENDENCIES), Some(&expected("a")));
        assert_eq!(model.node(a.node).unwrap().rt_info.get(MEMORY_DEPENDENCIES), Some(&expected("r")));
        assert!(model.node(m.node).unwrap().rt_info.get(MEMORY_DEPENDENCIES).is_none());
    }
}
