//! Declarative subgraph patterns.
//!
//! A `Pattern` is a small arena of pattern nodes. Each node is built from
//! nodes created before it, so a pattern can not contain a cycle. The last
//! node added is the root the `Matcher` starts from.
use crate::internal::*;
use std::fmt;

mod matcher;
pub mod predicates;

pub use self::matcher::{Match, Matcher};

/// Extra condition on a candidate outlet.
pub type Predicate = Arc<dyn Fn(&Function, OutletId) -> bool + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(usize);

impl fmt::Display for PatternId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "#{}", self.0)
    }
}

#[derive(Clone)]
pub enum PatternNode {
    /// any outlet
    Any { predicate: Option<Predicate> },
    /// an outlet of a node of one of `kinds`. Empty `inputs` accepts any
    /// inputs.
    Op { kinds: TVec<OpKind>, inputs: TVec<PatternId>, predicate: Option<Predicate> },
    /// the first alternative that matches
    Or(TVec<PatternId>),
}

impl fmt::Debug for PatternNode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PatternNode::Any { predicate } => {
                write!(fmt, "Any{}", if predicate.is_some() { "(?)" } else { "" })
            }
            PatternNode::Op { kinds, inputs, predicate } => write!(
                fmt,
                "{:?}{}{:?}",
                kinds.iter().map(|k| k.type_name()).collect::<Vec<_>>(),
                if predicate.is_some() { "(?)" } else { "" },
                inputs
            ),
            PatternNode::Or(alternatives) => write!(fmt, "Or{alternatives:?}"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Pattern {
    nodes: Vec<PatternNode>,
}

impl Pattern {
    pub fn new() -> Pattern {
        Pattern::default()
    }

    fn push(&mut self, node: PatternNode) -> PatternId {
        self.nodes.push(node);
        PatternId(self.nodes.len() - 1)
    }

    pub fn any_input(&mut self) -> PatternId {
        self.push(PatternNode::Any { predicate: None })
    }

    pub fn any_input_with(
        &mut self,
        predicate: impl Fn(&Function, OutletId) -> bool + Send + Sync + 'static,
    ) -> PatternId {
        self.push(PatternNode::Any { predicate: Some(Arc::new(predicate)) })
    }

    /// A node of operation `K` whose inputs match `inputs`, in order.
    pub fn wrap_type<K: OpVariant>(&mut self, inputs: &[PatternId]) -> PatternId {
        self.wrap_types(&[K::KIND], inputs, None)
    }

    pub fn wrap_type_with<K: OpVariant>(
        &mut self,
        inputs: &[PatternId],
        predicate: impl Fn(&Function, OutletId) -> bool + Send + Sync + 'static,
    ) -> PatternId {
        self.wrap_types(&[K::KIND], inputs, Some(Arc::new(predicate)))
    }

    /// A node of any of `kinds`.
    pub fn wrap_types(&mut self, kinds: &[OpKind], inputs: &[PatternId], predicate: Option<Predicate>) -> PatternId {
        self.push(PatternNode::Op { kinds: kinds.into(), inputs: inputs.into(), predicate })
    }

    pub fn or(&mut self, alternatives: &[PatternId]) -> PatternId {
        self.push(PatternNode::Or(alternatives.into()))
    }

    pub fn node(&self, id: PatternId) -> &PatternNode {
        &self.nodes[id.0]
    }

    /// The last node added.
    pub fn root(&self) -> Option<PatternId> {
        self.nodes.len().checked_sub(1).map(PatternId)
    }
}
