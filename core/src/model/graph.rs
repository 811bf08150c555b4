use super::order::eval_order_for_nodes;
use super::{copy_runtime_info, InferenceContext, NameGenerator, ValidationState};
use crate::internal::*;
use crate::ops::konst::Constant;
use crate::ops::sink::Result as ResultOp;
use crate::ops::source::Parameter;
use bit_set::BitSet;
use graft_data::itertools::Itertools;
use std::fmt;

/// A computation graph: an arena of nodes, with its parameters (inputs),
/// results (outputs) and sinks (side-effect nodes kept alive without
/// consumers).
///
/// Node ids are indices in the arena. Replaced nodes stay in the arena as
/// garbage, detached from the graph, until `compact` is called.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    nodes: Vec<Node>,
    parameters: Vec<usize>,
    results: Vec<usize>,
    sinks: Vec<usize>,
    naming: NameGenerator,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Function {
        Function {
            name: name.into(),
            nodes: vec![],
            parameters: vec![],
            results: vec![],
            sinks: vec![],
            naming: NameGenerator::default(),
        }
    }

    /// Add a node and connect its inputs, without running inference.
    ///
    /// An empty `name` leaves the friendly name unset.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Op>,
        inputs: &[OutletId],
    ) -> GraftResult<usize> {
        let op = op.into();
        let name = name.into();
        let id = self.nodes.len();
        for (ix, input) in inputs.iter().enumerate() {
            self.outlet_desc(*input)
                .with_context(|| format!("Wiring input #{ix} of {:?} to {:?}", name, input))?;
        }
        let unique = self.naming.next_name(op.kind().type_name());
        let friendly = if name.is_empty() { None } else { Some(name) };
        self.nodes.push(Node::new(id, unique, friendly, op));
        for (ix, input) in inputs.iter().enumerate() {
            self.add_edge(*input, InletId::new(id, ix))?;
        }
        Ok(id)
    }

    /// Add a node, connect its inputs and run shape and type inference.
    ///
    /// If inference fails, the node is detached from the graph and the
    /// validation error returned.
    pub fn wire_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Op>,
        inputs: &[OutletId],
    ) -> GraftResult<TVec<OutletId>> {
        let id = self.add_node(name, op, inputs)?;
        if let Err(e) = self.validate_node(id) {
            self.detach(id);
            return Err(e);
        }
        Ok((0..self.nodes[id].outputs.len()).map(|slot| OutletId::new(id, slot)).collect())
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        element_type: ElementType,
        shape: PartialShape,
    ) -> GraftResult<OutletId> {
        let id = self.wire_node(name, Parameter::new(element_type, shape), &[])?[0].node;
        self.parameters.push(id);
        Ok(OutletId::new(id, 0))
    }

    pub fn add_const(&mut self, name: impl Into<String>, v: impl IntoArcTensor) -> GraftResult<OutletId> {
        Ok(self.wire_node(name, Constant::new(v.into_arc_tensor()), &[])?[0])
    }

    /// Mark `outlet` as an output of the function.
    pub fn add_result(&mut self, outlet: OutletId) -> GraftResult<usize> {
        let id = self.wire_node("", ResultOp, &[outlet])?[0].node;
        self.results.push(id);
        Ok(id)
    }

    /// Keep `node` alive and scheduled even without consumers.
    pub fn add_sink(&mut self, node: usize) -> GraftResult<()> {
        self.node(node)?;
        if !self.sinks.contains(&node) {
            self.sinks.push(node);
        }
        Ok(())
    }

    /// Order `node` after `dependency`, without a data edge.
    pub fn add_control_dependency(&mut self, node: usize, dependency: usize) -> GraftResult<()> {
        self.node(dependency)?;
        let node = self.node_mut(node)?;
        if !node.control_deps.contains(&dependency) {
            node.control_deps.push(dependency);
        }
        Ok(())
    }

    /// Connect `outlet` to `inlet`, replacing the previous edge on `inlet`
    /// if any. The consumer will be re-validated.
    pub fn add_edge(&mut self, outlet: OutletId, inlet: InletId) -> GraftResult<()> {
        self.outlet_desc(outlet)?;
        if let Some(previous) = self.node(inlet.node)?.inputs.get(inlet.slot).cloned() {
            self.nodes[previous.node].outputs[previous.slot]
                .successors
                .retain(|&mut succ| succ != inlet);
        }
        self.nodes[outlet.node].outputs[outlet.slot].successors.push(inlet);
        let succ = &mut self.nodes[inlet.node];
        #[allow(clippy::comparison_chain)]
        if inlet.slot == succ.inputs.len() {
            succ.inputs.push(outlet);
        } else if inlet.slot < succ.inputs.len() {
            succ.inputs[inlet.slot] = outlet;
        } else {
            bail!(
                "Edges must be added in order and consecutive. Trying to connect input {:?} of node {}",
                inlet.slot,
                succ
            )
        }
        succ.state = ValidationState::Unvalidated;
        Ok(())
    }

    pub fn parameters(&self) -> &[usize] {
        &self.parameters
    }

    pub fn results(&self) -> &[usize] {
        &self.results
    }

    pub fn sinks(&self) -> &[usize] {
        &self.sinks
    }

    /// The outlets feeding the result nodes, in order.
    pub fn result_outlets(&self) -> TVec<OutletId> {
        self.results.iter().map(|&r| self.nodes[r].inputs[0]).collect()
    }

    pub fn parameter_desc(&self, ix: usize) -> GraftResult<&TensorDesc> {
        let id = *self.parameters.get(ix).with_context(|| format!("No parameter #{ix}"))?;
        self.nodes[id].output_desc(0)
    }

    pub fn result_desc(&self, ix: usize) -> GraftResult<&TensorDesc> {
        let id = *self.results.get(ix).with_context(|| format!("No result #{ix}"))?;
        self.nodes[id].output_desc(0)
    }

    pub fn node(&self, id: usize) -> GraftResult<&Node> {
        self.nodes.get(id).with_context(|| format!("Invalid node id {id}"))
    }

    pub fn node_mut(&mut self, id: usize) -> GraftResult<&mut Node> {
        self.nodes.get_mut(id).with_context(|| format!("Invalid node id {id}"))
    }

    /// Every node in the arena, garbage included.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Find a live node by friendly or unique name.
    pub fn node_by_name(&self, name: impl AsRef<str>) -> GraftResult<&Node> {
        let name = name.as_ref();
        self.nodes
            .iter()
            .filter(|n| !n.is_garbage())
            .find(|n| n.friendly_name() == name)
            .or_else(|| self.nodes.iter().find(|n| !n.is_garbage() && n.name == name))
            .with_context(|| format!("No node found for name: \"{name}\""))
    }

    pub fn outlet_desc(&self, outlet: OutletId) -> GraftResult<&TensorDesc> {
        let node = self.node(outlet.node)?;
        ensure!(!node.is_garbage(), "Node {} has been removed from the graph", node);
        node.output_desc(outlet.slot)
    }

    pub fn outlet_desc_mut(&mut self, outlet: OutletId) -> GraftResult<&mut TensorDesc> {
        self.node_mut(outlet.node)?
            .outputs
            .get_mut(outlet.slot)
            .map(|o| &mut o.desc)
            .with_context(|| format!("Invalid outlet reference {outlet:?}"))
    }

    /// Consumers of an output port.
    pub fn consumers(&self, outlet: OutletId) -> GraftResult<&[InletId]> {
        self.node(outlet.node)?
            .outputs
            .get(outlet.slot)
            .map(|o| &*o.successors)
            .with_context(|| format!("Invalid outlet reference {outlet:?}"))
    }

    /// Producer outlet for each input of node `id`.
    pub fn input_outlets(&self, id: usize) -> GraftResult<&[OutletId]> {
        Ok(&self.node(id)?.inputs)
    }

    /// Topological order of every node reachable from the parameters,
    /// results and sinks, following data edges and control dependencies.
    pub fn get_ordered_ops(&self) -> GraftResult<Vec<usize>> {
        let targets = self
            .parameters
            .iter()
            .chain(self.results.iter())
            .chain(self.sinks.iter())
            .copied()
            .collect_vec();
        eval_order_for_nodes(&self.nodes, &targets)
    }

    /// Run `validate_and_infer_types` on one node, and store its outputs.
    ///
    /// Returns true if an output descriptor changed. Names attached to the
    /// output descriptors are preserved.
    pub fn validate_node(&mut self, id: usize) -> GraftResult<bool> {
        let node = self.node(id)?;
        let inputs = node
            .inputs
            .iter()
            .map(|i| self.outlet_desc(*i).cloned())
            .collect::<GraftResult<TVec<_>>>()?;
        let mut ctx =
            InferenceContext::new(node.friendly_name(), node.kind().type_name(), inputs, node.outputs.len());
        let result = node.op.validate_and_infer_types(&mut ctx);
        let node = &mut self.nodes[id];
        if let Err(e) = result {
            node.state = ValidationState::Failed(e.to_string());
            return Err(e.context(format!("Validating {node}")));
        }
        let (outputs, relevance) = ctx.into_parts();
        let mut changed = false;
        for (outlet, desc) in node.outputs.iter_mut().zip(outputs) {
            if !outlet.desc.same_type_and_shape(&desc) || outlet.desc.konst != desc.konst {
                changed = true;
                outlet.desc.element_type = desc.element_type;
                outlet.desc.shape = desc.shape;
                outlet.desc.konst = desc.konst;
            }
        }
        node.relevance = relevance;
        node.state = ValidationState::Valid;
        Ok(changed)
    }

    /// Re-run inference, in order, on every node not known to be valid, and
    /// on the consumers of every output it changed.
    pub fn validate_nodes_and_infer_types(&mut self) -> GraftResult<()> {
        let order = self.get_ordered_ops()?;
        let mut changed = BitSet::with_capacity(self.nodes.len());
        for id in order {
            let node = &self.nodes[id];
            let stale = node.state != ValidationState::Valid
                || node.inputs.iter().any(|i| changed.contains(i.node));
            if stale && self.validate_node(id)? {
                changed.insert(id);
            }
        }
        Ok(())
    }

    /// Forget every inferred constant value, and mark all nodes for
    /// re-validation.
    pub fn invalidate_values(&mut self) {
        for node in &mut self.nodes {
            node.invalidate_values();
        }
    }

    /// Move every consumer of `old` to `new`, with the tensor names.
    ///
    /// `new.node` itself is left untouched if it consumes `old`, so a node
    /// can be inserted after an existing output.
    pub fn replace_output(&mut self, old: OutletId, new: OutletId) -> GraftResult<()> {
        self.outlet_desc(new)?;
        let successors = self.consumers(old)?.to_vec();
        for succ in successors {
            if succ.node != new.node {
                self.add_edge(new, succ)?;
            }
        }
        let names = std::mem::take(&mut self.outlet_desc_mut(old)?.names);
        self.outlet_desc_mut(new)?.names.extend(names);
        Ok(())
    }

    /// Substitute node `new` for node `old`: consumers, function results and
    /// sinks, control dependencies and runtime info move to `new`. `old`
    /// then becomes garbage, along with the producers only it used.
    pub fn replace_node(&mut self, old: usize, new: usize) -> GraftResult<()> {
        ensure!(old != new, "Can not replace node {} by itself", old);
        let (old_node, new_node) = (self.node(old)?, self.node(new)?);
        ensure!(
            old_node.outputs.len() == new_node.outputs.len(),
            "Output count mismatch replacing {} ({} outputs) by {} ({} outputs)",
            old_node,
            old_node.outputs.len(),
            new_node,
            new_node.outputs.len()
        );
        if old_node.op_is::<Parameter>() && !new_node.op_is::<Parameter>() {
            bail!("Parameter {} can only be replaced by another Parameter", old_node);
        }
        for slot in 0..self.nodes[old].outputs.len() {
            self.replace_output(OutletId::new(old, slot), OutletId::new(new, slot))?;
        }
        for node in &mut self.nodes {
            if node.id != new && node.control_deps.contains(&old) {
                node.control_deps.retain(|&d| d != old);
                if !node.control_deps.contains(&new) {
                    node.control_deps.push(new);
                }
            }
        }
        let inherited = std::mem::take(&mut self.nodes[old].control_deps);
        for dep in inherited {
            if dep != new && !self.nodes[new].control_deps.contains(&dep) {
                self.nodes[new].control_deps.push(dep);
            }
        }
        copy_runtime_info(self, &[old, new], &[new])?;
        for list in [&mut self.parameters, &mut self.results, &mut self.sinks] {
            for id in list.iter_mut() {
                if *id == old {
                    *id = new;
                }
            }
            let mut seen = BitSet::new();
            list.retain(|&id| seen.insert(id));
        }
        self.release(old);
        Ok(())
    }

    fn is_anchored(&self, id: usize) -> bool {
        self.parameters.contains(&id)
            || self.results.contains(&id)
            || self.sinks.contains(&id)
            || self.nodes.iter().any(|n| !n.garbage && n.control_deps.contains(&id))
    }

    /// Disconnect a node from its producers and mark it garbage.
    fn detach(&mut self, id: usize) {
        let inputs = std::mem::take(&mut self.nodes[id].inputs);
        for (slot, input) in inputs.into_iter().enumerate() {
            self.nodes[input.node].outputs[input.slot]
                .successors
                .retain(|s| *s != InletId::new(id, slot));
        }
        self.nodes[id].control_deps.clear();
        self.nodes[id].garbage = true;
    }

    /// Detach `id` if nothing uses it anymore, then the producers it kept
    /// alive, recursively.
    pub(crate) fn release(&mut self, id: usize) {
        let mut todo = vec![id];
        while let Some(id) = todo.pop() {
            let node = &self.nodes[id];
            if node.garbage || node.consumers_count() > 0 || self.is_anchored(id) {
                continue;
            }
            let producers = node.inputs.iter().map(|i| i.node).chain(node.control_deps.iter().copied()).collect_vec();
            trace!("Releasing {}", self.nodes[id]);
            self.detach(id);
            todo.extend(producers);
        }
    }

    /// Wire `op`, or if all its inputs are known constants and it can be
    /// evaluated, wire a Constant with its value instead.
    pub fn wire_or_fold(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Op>,
        inputs: &[OutletId],
    ) -> GraftResult<TVec<OutletId>> {
        let op = op.into();
        let name = name.into();
        let mut values = tvec!();
        for input in inputs {
            match &self.outlet_desc(*input)?.konst {
                Some(k) => values.push(k.clone()),
                None => break,
            }
        }
        if values.len() == inputs.len() && op.can_constant_fold() {
            let outputs = op.eval(values)?;
            let single = outputs.len() == 1;
            let mut wires = tvec!();
            for (ix, v) in outputs.into_iter().enumerate() {
                let name = if single { name.clone() } else { format!("{name}.{ix}") };
                wires.push(self.add_const(name, v)?);
            }
            return Ok(wires);
        }
        self.wire_node(name, op, inputs)
    }

    /// Drop garbage and unreachable nodes, renumbering the remaining ones in
    /// evaluation order.
    pub fn compact(&mut self) -> GraftResult<()> {
        let order = self.get_ordered_ops()?;
        if order.len() == self.nodes.len() && order.iter().enumerate().all(|(a, b)| a == *b) {
            return Ok(());
        }
        let mut old_to_new = vec![usize::MAX; self.nodes.len()];
        for (ix, id) in order.iter().enumerate() {
            old_to_new[*id] = ix;
        }
        let mut nodes = std::mem::take(&mut self.nodes).into_iter().map(Some).collect_vec();
        let mut new_nodes = Vec::with_capacity(order.len());
        for id in &order {
            let Some(mut node) = nodes[*id].take() else { bail!("Node {id} scheduled twice") };
            node.id = old_to_new[node.id];
            for input in &mut node.inputs {
                ensure!(old_to_new[input.node] < order.len());
                input.node = old_to_new[input.node];
            }
            for output in &mut node.outputs {
                output.successors.retain(|s| old_to_new[s.node] < order.len());
                for succ in &mut output.successors {
                    succ.node = old_to_new[succ.node];
                }
                output.successors.sort();
            }
            node.control_deps.retain(|d| old_to_new[*d] < order.len());
            for dep in &mut node.control_deps {
                *dep = old_to_new[*dep];
            }
            new_nodes.push(node);
        }
        self.nodes = new_nodes;
        for list in [&mut self.parameters, &mut self.results, &mut self.sinks] {
            for id in list.iter_mut() {
                *id = old_to_new[*id];
            }
        }
        ensure!(self.nodes.iter().enumerate().all(|(ix, n)| n.id == ix));
        self.check_edges().context("after graph compaction")
    }

    #[cfg(not(all(debug_assertions, feature = "paranoid_assertions")))]
    #[inline]
    pub fn check_edges(&self) -> GraftResult<()> {
        Ok(())
    }

    /// Performs a sanity check on network connections.
    #[cfg(all(debug_assertions, feature = "paranoid_assertions"))]
    pub fn check_edges(&self) -> GraftResult<()> {
        for node_id in self.get_ordered_ops()? {
            let node = &self.nodes[node_id];
            for (ix, input) in node.inputs.iter().enumerate() {
                let prec = &self.nodes[input.node];
                if !prec.outputs[input.slot].successors.contains(&InletId::new(node.id, ix)) {
                    bail!(
                        "Mismatched oncoming edge, node:{} input:{} to {:?} not reciprocated",
                        node.id,
                        ix,
                        prec
                    )
                }
            }
            for (ix, output) in node.outputs.iter().enumerate() {
                for succ in &output.successors {
                    if self.nodes[succ.node].inputs[succ.slot] != OutletId::new(node.id, ix) {
                        bail!(
                            "Mismatched outgoing edge, node:{} output:{} to {:?} not reciprocated",
                            node.id,
                            ix,
                            succ
                        )
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(fmt, "Function {}", self.name)?;
        for node in self.nodes.iter().filter(|n| !n.garbage) {
            let mut dump = AttributeDump::default();
            let _ = node.op.visit_attributes(&mut dump);
            writeln!(
                fmt,
                "{:5} | {:30} {:12} {} => {}{}",
                node.id,
                node.friendly_name(),
                node.kind().type_name(),
                node.inputs.iter().map(|o| format!("{o:?}")).join(" "),
                node.outputs.iter().map(|o| format!("{:?}", o.desc)).join(" ; "),
                if dump.values.is_empty() { String::new() } else { format!(" {dump}") },
            )?;
            if !node.control_deps.is_empty() {
                writeln!(fmt, "      |   * after: {}", node.control_deps.iter().join(", "))?;
            }
        }
        writeln!(fmt, "results: {}", self.result_outlets().iter().map(|o| format!("{o:?}")).join(", "))
    }
}
