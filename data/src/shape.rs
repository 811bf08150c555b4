//! Shapes with partial knowledge: the rank may be unknown, each dimension
//! may be an interval.
use crate::dim::Dimension;
use crate::TVec;
use anyhow::bail;
use itertools::Itertools;
use std::fmt;
use std::ops::{Index, IndexMut};

#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct PartialShape {
    dims: Option<TVec<Dimension>>,
}

impl PartialShape {
    /// Shape of unknown rank.
    pub fn dynamic() -> PartialShape {
        PartialShape { dims: None }
    }

    /// Shape of known rank, every dimension unknown.
    pub fn dynamic_of_rank(rank: usize) -> PartialShape {
        PartialShape { dims: Some(tvec![Dimension::dynamic(); rank]) }
    }

    pub fn scalar() -> PartialShape {
        PartialShape { dims: Some(tvec!()) }
    }

    pub fn new(dims: impl IntoIterator<Item = Dimension>) -> PartialShape {
        PartialShape { dims: Some(dims.into_iter().collect()) }
    }

    pub fn from_static(dims: &[usize]) -> PartialShape {
        PartialShape::new(dims.iter().map(|&d| Dimension::from(d)))
    }

    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    pub fn dims_mut(&mut self) -> Option<&mut TVec<Dimension>> {
        self.dims.as_mut()
    }

    pub fn rank(&self) -> Dimension {
        match &self.dims {
            Some(d) => Dimension::from(d.len()),
            None => Dimension::dynamic(),
        }
    }

    /// Rank, if known.
    pub fn rank_length(&self) -> Option<usize> {
        self.dims.as_ref().map(|d| d.len())
    }

    pub fn is_rank_static(&self) -> bool {
        self.dims.is_some()
    }

    pub fn is_static(&self) -> bool {
        self.dims.as_ref().is_some_and(|d| d.iter().all(|d| d.is_static()))
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    pub fn compatible(&self, other: &PartialShape) -> bool {
        PartialShape::merge(self, other).is_some()
    }

    /// Same rank, and static dimensions at the same positions with equal
    /// lengths.
    pub fn same_scheme(&self, other: &PartialShape) -> bool {
        match (&self.dims, &other.dims) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(a, b)| {
                        (a.is_dynamic() && b.is_dynamic()) || a.get_length() == b.get_length()
                    })
            }
            _ => false,
        }
    }

    /// Most specific shape compatible with both shapes, None if the shapes
    /// can not both hold.
    pub fn merge(a: &PartialShape, b: &PartialShape) -> Option<PartialShape> {
        match (&a.dims, &b.dims) {
            (None, _) => Some(b.clone()),
            (_, None) => Some(a.clone()),
            (Some(a), Some(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                let dims = a
                    .iter()
                    .zip(b.iter())
                    .map(|(a, b)| Dimension::merge(a, b))
                    .collect::<Option<TVec<_>>>()?;
                Some(PartialShape { dims: Some(dims) })
            }
        }
    }

    /// Merge `other` into self. Returns false, leaving self untouched, if
    /// the shapes are not compatible.
    pub fn merge_into(&mut self, other: &PartialShape) -> bool {
        match PartialShape::merge(self, other) {
            Some(merged) => {
                *self = merged;
                true
            }
            None => false,
        }
    }

    /// Numpy-style broadcasting: shapes are aligned on their last axis, the
    /// shorter one is padded with 1 on the left.
    pub fn broadcast_merge(a: &PartialShape, b: &PartialShape) -> Option<PartialShape> {
        let (Some(a), Some(b)) = (&a.dims, &b.dims) else {
            return Some(PartialShape::dynamic());
        };
        let rank = a.len().max(b.len());
        let one = Dimension::from(1usize);
        let mut dims = TVec::with_capacity(rank);
        for i in 0..rank {
            let da = if i + a.len() >= rank { &a[i + a.len() - rank] } else { &one };
            let db = if i + b.len() >= rank { &b[i + b.len() - rank] } else { &one };
            dims.push(Dimension::broadcast_merge(da, db)?);
        }
        Some(PartialShape { dims: Some(dims) })
    }

    /// Smallest shape containing both.
    pub fn hull(a: &PartialShape, b: &PartialShape) -> PartialShape {
        match (&a.dims, &b.dims) {
            (Some(a), Some(b)) if a.len() == b.len() => PartialShape::new(
                a.iter().zip(b.iter()).map(|(a, b)| Dimension::hull(a, b)),
            ),
            _ => PartialShape::dynamic(),
        }
    }

    /// True if every shape allowed by self is allowed by other.
    pub fn refines(&self, other: &PartialShape) -> bool {
        match (&self.dims, &other.dims) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.refines(b))
            }
        }
    }

    pub fn relaxes(&self, other: &PartialShape) -> bool {
        other.refines(self)
    }

    pub fn to_shape(&self) -> anyhow::Result<TVec<usize>> {
        let Some(dims) = &self.dims else { bail!("Shape {} has dynamic rank", self) };
        dims.iter().map(|d| d.to_usize()).collect()
    }

    /// Lower bound of each dimension. Fails on dynamic rank.
    pub fn min_shape(&self) -> anyhow::Result<TVec<usize>> {
        let Some(dims) = &self.dims else { bail!("Shape {} has dynamic rank", self) };
        Ok(dims.iter().map(|d| d.min_length() as usize).collect())
    }

    /// Upper bound of each dimension, None for unbounded ones. Fails on
    /// dynamic rank.
    pub fn max_shape(&self) -> anyhow::Result<TVec<Option<usize>>> {
        let Some(dims) = &self.dims else { bail!("Shape {} has dynamic rank", self) };
        Ok(dims.iter().map(|d| d.max_length().map(|m| m as usize)).collect())
    }

    /// Number of elements.
    pub fn volume(&self) -> Dimension {
        match &self.dims {
            Some(dims) => dims.iter().copied().product(),
            None => Dimension::dynamic(),
        }
    }
}

impl Index<usize> for PartialShape {
    type Output = Dimension;
    fn index(&self, ix: usize) -> &Dimension {
        match &self.dims {
            Some(d) => &d[ix],
            None => panic!("Indexing a shape of dynamic rank"),
        }
    }
}

impl IndexMut<usize> for PartialShape {
    fn index_mut(&mut self, ix: usize) -> &mut Dimension {
        match &mut self.dims {
            Some(d) => &mut d[ix],
            None => panic!("Indexing a shape of dynamic rank"),
        }
    }
}

impl From<Vec<Dimension>> for PartialShape {
    fn from(dims: Vec<Dimension>) -> PartialShape {
        PartialShape::new(dims)
    }
}

impl From<TVec<Dimension>> for PartialShape {
    fn from(dims: TVec<Dimension>) -> PartialShape {
        PartialShape { dims: Some(dims) }
    }
}

impl From<&[usize]> for PartialShape {
    fn from(dims: &[usize]) -> PartialShape {
        PartialShape::from_static(dims)
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match &self.dims {
            Some(dims) => write!(fmt, "[{}]", dims.iter().join(",")),
            None => write!(fmt, "[...]"),
        }
    }
}

impl fmt::Debug for PartialShape {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_dim() -> impl Strategy<Value = Dimension> {
        prop_oneof![
            (0i64..5).prop_map(Dimension::new),
            (0i64..5, 0i64..5).prop_map(|(a, b)| Dimension::interval(a.min(b), a.max(b))),
            Just(Dimension::dynamic()),
        ]
    }

    fn arb_shape() -> impl Strategy<Value = PartialShape> {
        prop_oneof![
            1 => Just(PartialShape::dynamic()),
            4 => proptest::collection::vec(arb_dim(), 0..4).prop_map(PartialShape::from),
        ]
    }

    proptest! {
        #[test]
        fn merge_commutes(a in arb_shape(), b in arb_shape()) {
            prop_assert_eq!(PartialShape::merge(&a, &b), PartialShape::merge(&b, &a));
        }

        #[test]
        fn merge_idempotent(a in arb_shape()) {
            prop_assert_eq!(PartialShape::merge(&a, &a), Some(a.clone()));
        }

        #[test]
        fn merge_with_dynamic_is_identity(a in arb_shape()) {
            prop_assert_eq!(PartialShape::merge(&a, &PartialShape::dynamic()), Some(a.clone()));
        }

        #[test]
        fn hull_relaxes(a in arb_shape(), b in arb_shape()) {
            let h = PartialShape::hull(&a, &b);
            prop_assert!(h.relaxes(&a));
            prop_assert!(h.relaxes(&b));
        }
    }

    #[test]
    fn merge_rank_mismatch() {
        let a = PartialShape::from_static(&[2, 3]);
        let b = PartialShape::from_static(&[2, 3, 1]);
        assert!(PartialShape::merge(&a, &b).is_none());
        assert!(!a.compatible(&b));
    }

    #[test]
    fn merge_fills_dynamic_dims() {
        let a = PartialShape::new([Dimension::dynamic(), 3.into()]);
        let b = PartialShape::new([4.into(), Dimension::at_least(2)]);
        let m = PartialShape::merge(&a, &b).unwrap();
        assert_eq!(m, PartialShape::from_static(&[4, 3]));
        assert!(m.is_static());
    }

    #[test]
    fn broadcast() {
        let a = PartialShape::from_static(&[8, 1, 6, 1]);
        let b = PartialShape::from_static(&[7, 1, 5]);
        assert_eq!(
            PartialShape::broadcast_merge(&a, &b),
            Some(PartialShape::from_static(&[8, 7, 6, 5]))
        );
        let c = PartialShape::from_static(&[3]);
        let d = PartialShape::from_static(&[4]);
        assert_eq!(PartialShape::broadcast_merge(&c, &d), None);
    }

    #[test]
    fn bounds() {
        let s = PartialShape::new([Dimension::interval(1, 4), 3.into(), Dimension::at_least(2)]);
        assert_eq!(&*s.min_shape().unwrap(), &[1, 3, 2]);
        assert_eq!(&*s.max_shape().unwrap(), &[Some(4), Some(3), None]);
        assert!(s.to_shape().is_err());
        assert!(PartialShape::dynamic().min_shape().is_err());
    }

    #[test]
    fn display() {
        let s = PartialShape::new([1.into(), Dimension::dynamic(), Dimension::interval(3, 5)]);
        assert_eq!(s.to_string(), "[1,?,3..5]");
        assert_eq!(PartialShape::dynamic().to_string(), "[...]");
        assert_eq!(PartialShape::scalar().to_string(), "[]");
    }
}
