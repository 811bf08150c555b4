//! Tensor descriptors: what is known about a value flowing on an edge.
use crate::internal::*;
use std::collections::BTreeSet;
use std::fmt;

/// Type information about the tensor produced by an output port.
///
/// Element type and shape may be partially known. `names` are the tensor
/// aliases, transferred along when a producer is replaced. `konst` holds the
/// value when inference could establish it (constants, static `ShapeOf`...).
#[derive(Clone, PartialEq, Default)]
pub struct TensorDesc {
    pub element_type: ElementType,
    pub shape: PartialShape,
    pub names: BTreeSet<String>,
    pub konst: Option<Arc<Tensor>>,
}

impl TensorDesc {
    pub fn new(element_type: ElementType, shape: impl Into<PartialShape>) -> TensorDesc {
        TensorDesc { element_type, shape: shape.into(), ..TensorDesc::default() }
    }

    /// Nothing known.
    pub fn dynamic() -> TensorDesc {
        TensorDesc { shape: PartialShape::dynamic(), ..TensorDesc::default() }
    }

    pub fn from_tensor(t: Arc<Tensor>) -> TensorDesc {
        TensorDesc {
            element_type: t.element_type(),
            shape: PartialShape::from_static(t.shape()),
            konst: Some(t),
            ..TensorDesc::default()
        }
    }

    pub fn with_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> TensorDesc {
        self.names.extend(names.into_iter().map(|n| n.into()));
        self
    }

    pub fn is_static(&self) -> bool {
        self.element_type.is_static() && self.shape.is_static()
    }

    pub fn rank(&self) -> Dimension {
        self.shape.rank()
    }

    /// Element type and shape equality, names and values ignored.
    pub fn same_type_and_shape(&self, other: &TensorDesc) -> bool {
        self.element_type == other.element_type && self.shape == other.shape
    }

    /// True if `t` is a possible value for this descriptor.
    pub fn matches(&self, t: &Tensor) -> bool {
        self.element_type.compatible(&t.element_type())
            && self.shape.compatible(&PartialShape::from_static(t.shape()))
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} {}", self.element_type, self.shape)?;
        if let Some(k) = &self.konst {
            write!(fmt, " = {}", k.dump(false))?;
        }
        Ok(())
    }
}

impl fmt::Debug for TensorDesc {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{self}")?;
        if !self.names.is_empty() {
            write!(fmt, " {:?}", self.names)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_tensor_is_static() {
        let desc = TensorDesc::from_tensor(rctensor1(&[1i64, 2, 3]));
        assert!(desc.is_static());
        assert_eq!(desc.shape, PartialShape::from_static(&[3]));
        assert_eq!(desc.element_type, ElementType::I64);
    }

    #[test]
    fn matches_partial() {
        let desc = TensorDesc::new(ElementType::F32, PartialShape::new([Dimension::dynamic(), 2.into()]));
        assert!(desc.matches(&tensor2(&[[1f32, 2.0], [3.0, 4.0], [5.0, 6.0]])));
        assert!(!desc.matches(&tensor1(&[1f32, 2.0])));
        assert!(!desc.matches(&tensor2(&[[1i32, 2]])));
    }
}
