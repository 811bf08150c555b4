#[macro_use]
mod macros;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used about everywhere in graft, for node inputs and outputs, or
/// tensor dimensions.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub type GraftError = anyhow::Error;
pub type GraftResult<T> = anyhow::Result<T>;

pub mod prelude {
    pub use crate::datum::{Datum, ElementType};
    pub use crate::dim::{Dimension, Interval};
    pub use crate::layout::Layout;
    pub use crate::shape::PartialShape;
    pub use crate::tensor::litteral::*;
    pub use crate::tensor::{IntoArcTensor, IntoTensor, Tensor};
    pub use crate::tvec;
    pub use crate::TVec;
    pub use crate::{GraftError, GraftResult};
    pub use crate::{dispatch_datum, dispatch_floatlike, dispatch_numbers};
    pub use half::f16;
}

pub mod internal {
    pub use crate::datum::Arith;
    pub use crate::prelude::*;
    pub use anyhow::{anyhow as format_err, bail, ensure, Context as GraftErrorContext};
    pub use ndarray as graft_ndarray;
    pub use smallvec as graft_smallvec;
    pub use std::borrow::Cow;
    pub use std::collections::HashMap;
    pub use std::sync::Arc;
}

pub use anyhow;
pub use ndarray as graft_ndarray;
pub use itertools;

pub mod datum;
pub mod dim;
pub mod layout;
pub mod shape;
pub mod tensor;
