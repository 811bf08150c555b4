//! Evaluation order: producers before consumers.
use crate::internal::*;
use bit_set::BitSet;

/// Topological order of the nodes needed to compute `targets`.
///
/// A node prerequisites are its input producers and its control
/// dependencies. Ties follow the input order, so the result is stable for a
/// given graph. Fails if the graph has a cycle.
pub fn eval_order_for_nodes(nodes: &[Node], targets: &[usize]) -> GraftResult<Vec<usize>> {
    let mut done = BitSet::with_capacity(nodes.len());
    let mut pending = BitSet::with_capacity(nodes.len());
    let mut needed: Vec<usize> = targets.iter().rev().copied().collect();
    let mut order: Vec<usize> = vec![];
    while let Some(&node) = needed.last() {
        if done.contains(node) {
            needed.pop();
            continue;
        }
        let missing: TVec<usize> = prerequisites(&nodes[node]).filter(|n| !done.contains(*n)).collect();
        if missing.is_empty() {
            order.push(node);
            needed.pop();
            pending.remove(node);
            done.insert(node);
        } else if pending.contains(node) {
            bail!("Cycle in graph, around node {}", nodes[node]);
        } else {
            pending.insert(node);
            needed.extend(missing.into_iter().rev());
        }
    }
    Ok(order)
}

fn prerequisites(node: &Node) -> impl Iterator<Item = usize> + '_ {
    node.inputs.iter().map(|i| i.node).chain(node.control_deps.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::binary::Add;
    use crate::ops::unary::Relu;

    #[test]
    fn simple() {
        let mut model = Function::new("simple");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::scalar()).unwrap();
        let b = model.add_const("b", tensor0(12.0f32)).unwrap();
        let add = model.wire_node("add", Add::default(), &[a, b]).unwrap();
        model.add_result(add[0]).unwrap();
        assert_eq!(model.get_ordered_ops().unwrap(), vec!(0, 1, 2, 3));
    }

    #[test]
    fn diamond() {
        let mut model = Function::new("diamond");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::scalar()).unwrap();
        let add = model.wire_node("add", Add::default(), &[a, a]).unwrap();
        model.add_result(add[0]).unwrap();
        assert_eq!(model.get_ordered_ops().unwrap(), vec!(0, 1, 2));
    }

    #[test]
    fn control_dependencies_come_first() {
        let mut model = Function::new("ctrl");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::scalar()).unwrap();
        let r1 = model.wire_node("r1", Relu, &[a]).unwrap();
        let r2 = model.wire_node("r2", Relu, &[a]).unwrap();
        let add = model.wire_node("add", Add::default(), &[r1[0], r2[0]]).unwrap();
        model.add_result(add[0]).unwrap();
        model.add_control_dependency(r1[0].node, r2[0].node).unwrap();
        let order = model.get_ordered_ops().unwrap();
        let pos = |n: usize| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(r2[0].node) < pos(r1[0].node));
    }

    #[test]
    fn cycle_is_an_error() {
        let mut model = Function::new("cycle");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::scalar()).unwrap();
        let r1 = model.wire_node("r1", Relu, &[a]).unwrap();
        let r2 = model.wire_node("r2", Relu, &[r1[0]]).unwrap();
        model.add_result(r2[0]).unwrap();
        model.add_edge(r2[0], InletId::new(r1[0].node, 0)).unwrap();
        assert!(model.get_ordered_ops().is_err());
    }
}
