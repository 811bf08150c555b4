//! # Graft
//!
//! Graph IR for neural network models: typed tensor operations wired in a
//! `Function`, partial shape and type inference, a declarative pattern
//! matcher, and the rewriting passes built on top of it (constant folding,
//! fusions, memory dependencies).
//!
//! ## Example
//!
//! ```
//! use graft_core::internal::*;
//!
//! let mut model = Function::new("double");
//! let input = model.add_parameter("input", ElementType::F32, PartialShape::from_static(&[3])).unwrap();
//! let two = model.add_const("two", tensor0(2f32)).unwrap();
//! let mul = model.wire_node("mul", ops::binary::Multiply::default(), &[input, two]).unwrap();
//! model.add_result(mul[0]).unwrap();
//!
//! let plan = SimplePlan::new(&model).unwrap();
//! let outputs = plan.run(tvec!(tensor1(&[1f32, 2.5, 5.0]))).unwrap();
//! assert_eq!(*outputs[0], tensor1(&[2f32, 5.0, 10.0]));
//! ```

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;
#[macro_use]
extern crate maplit;

#[macro_use]
pub mod macros;

pub mod attributes;
pub mod model;
pub mod ops;
pub mod optim;
pub mod pattern;
pub mod plan;

pub use graft_data;

pub mod prelude {
    pub use crate::model::{Function, InletId, Node, OutletId, TensorDesc};
    pub use crate::ops::{Op, OpKind};
    pub use crate::optim::PassManager;
    pub use crate::plan::{SimplePlan, SimpleState};
    pub use graft_data::prelude::*;
}

pub mod internal {
    pub use crate::attributes::{AttributeDump, AttributeValue, AttributeVisitor};
    pub use crate::model::*;
    pub use crate::node_check;
    pub use crate::{args_1, args_2, args_3, args_5};
    pub use crate::ops;
    pub use crate::ops::{AutoBroadcast, OpVariant, Operation};
    pub use crate::optim::{Pass, PassSession};
    pub use crate::pattern::{Match, Matcher, Pattern, PatternId};
    pub use crate::prelude::*;
    pub use graft_data::internal::*;
}

#[cfg(test)]
#[allow(dead_code)]
pub(crate) fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("GRAFT_LOG").try_init();
}
