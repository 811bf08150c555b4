use super::{RtInfo, TensorDesc, ValidationState};
use crate::internal::*;
use graft_data::itertools::Itertools;
use std::fmt;

/// A node in the graph: an operation instance and its wiring.
#[derive(Debug, Clone)]
pub struct Node {
    /// node id in the owning function arena
    pub id: usize,
    /// unique name, generated by the function
    pub name: String,
    friendly_name: Option<String>,
    /// the operation
    pub op: Op,
    /// producers of each input port
    pub inputs: Vec<OutletId>,
    /// output ports
    pub outputs: TVec<Outlet>,
    /// nodes to consider "before" this one, without a data edge
    pub control_deps: Vec<usize>,
    pub rt_info: RtInfo,
    pub state: ValidationState,
    /// per input, as declared by the last successful inference
    pub relevance: TVec<InputRelevance>,
    pub(crate) garbage: bool,
}

impl Node {
    pub(crate) fn new(id: usize, name: String, friendly_name: Option<String>, op: Op) -> Node {
        let outputs = (0..op.nb_outputs()).map(|_| Outlet::default()).collect();
        Node {
            id,
            name,
            friendly_name,
            op,
            inputs: vec![],
            outputs,
            control_deps: vec![],
            rt_info: RtInfo::default(),
            state: ValidationState::Unvalidated,
            relevance: tvec!(),
            garbage: false,
        }
    }

    /// User facing name, defaults to the unique name.
    pub fn friendly_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_friendly_name(&self) -> bool {
        self.friendly_name.is_some()
    }

    /// The friendly name can be set once.
    pub fn set_friendly_name(&mut self, name: impl Into<String>) -> GraftResult<()> {
        let name = name.into();
        match &self.friendly_name {
            Some(previous) if *previous != name => {
                bail!("Node {} already named {:?}, can not rename to {:?}", self.name, previous, name)
            }
            _ => self.friendly_name = Some(name),
        }
        Ok(())
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }

    pub fn op_as<O: OpVariant>(&self) -> Option<&O> {
        O::from_op(&self.op)
    }

    pub fn op_as_mut<O: OpVariant>(&mut self) -> Option<&mut O> {
        O::from_op_mut(&mut self.op)
    }

    pub fn op_is<O: OpVariant>(&self) -> bool {
        self.kind() == O::KIND
    }

    /// Detached from the graph by a replacement, waiting for `compact`.
    pub fn is_garbage(&self) -> bool {
        self.garbage
    }

    pub fn output_desc(&self, slot: usize) -> GraftResult<&TensorDesc> {
        self.outputs
            .get(slot)
            .map(|o| &o.desc)
            .with_context(|| format!("Node {} has no output {}", self, slot))
    }

    /// Total count of consumers over all outputs.
    pub fn consumers_count(&self) -> usize {
        self.outputs.iter().map(|o| o.successors.len()).sum()
    }

    /// Forget computed values. Next inference will recompute them.
    pub fn invalidate_values(&mut self) {
        self.state = ValidationState::Unvalidated;
        if !self.op_is::<ops::konst::Constant>() {
            for o in &mut self.outputs {
                o.desc.konst = None;
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "#{} \"{}\" {}", self.id, self.friendly_name(), self.op)
    }
}

/// Information for each outlet of a node
#[derive(Clone, Default)]
pub struct Outlet {
    /// the tensor descriptor
    pub desc: TensorDesc,
    /// where this outlet is used.
    pub successors: TVec<InletId>,
}

impl fmt::Debug for Outlet {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{:?} {}",
            self.desc,
            self.successors.iter().map(|o| format!("{o:?}")).join(" ")
        )
    }
}

/// How an input influences the node outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputRelevance {
    /// the input value (not only its shape) is needed to infer output shapes
    pub shape: bool,
    /// the input value is needed to compute output values
    pub value: bool,
}

impl Default for InputRelevance {
    fn default() -> InputRelevance {
        InputRelevance { shape: false, value: true }
    }
}

/// Identifier for a node output in the graph.
///
/// This happens to be a unique identifier of any variable tensor in the graph
/// (as the graph typically connect one single node output to one or several
/// inputs slots)
#[derive(Clone, Copy, PartialEq, Eq, Hash, new, Default, PartialOrd, Ord)]
pub struct OutletId {
    /// node identifier in the graph
    pub node: usize,
    /// rank of the input in the node
    pub slot: usize,
}

impl fmt::Debug for OutletId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}/{}>", self.node, self.slot)
    }
}

impl From<usize> for OutletId {
    fn from(node: usize) -> OutletId {
        OutletId::new(node, 0)
    }
}

impl From<(usize, usize)> for OutletId {
    fn from(pair: (usize, usize)) -> OutletId {
        OutletId::new(pair.0, pair.1)
    }
}

/// Identifier for a node input in the graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, new, Ord, PartialOrd)]
pub struct InletId {
    /// node identifier in the graph
    pub node: usize,
    /// rank of the input in the node
    pub slot: usize,
}

impl fmt::Debug for InletId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, ">{}/{}", self.node, self.slot)
    }
}
