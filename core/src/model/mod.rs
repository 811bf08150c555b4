//! The graph: `Function` owns an arena of `Node`s wired output-to-input.
//!
//! Nodes are addressed by their index in the arena. Edges are `OutletId`
//! (producer node, output slot) on the consumer side, and the list of
//! `InletId` successors on the producer side. Both views are kept in sync by
//! every mutating method of `Function`.
mod fact;
mod graph;
mod naming;
mod node;
pub mod order;
pub mod rt_info;
mod validation;

pub use self::fact::TensorDesc;
pub use self::graph::Function;
pub use self::naming::NameGenerator;
pub use self::node::{InletId, InputRelevance, Node, Outlet, OutletId};
pub use self::rt_info::{copy_runtime_info, InitNodeInfo, RtAttribute, RtInfo};
pub use self::validation::{InferenceContext, ValidationFailure, ValidationState};
