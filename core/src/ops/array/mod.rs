/// # Operators on array and shapes
mod concat;
mod reshape;
mod reverse;
mod shape_of;
mod slice;

pub use self::concat::Concat;
pub use self::reshape::Reshape;
pub use self::reverse::{Reverse, ReverseMode};
pub use self::shape_of::ShapeOf;
pub use self::slice::Slice;
