//! Common predicates for pattern nodes.
use super::Predicate;
use crate::internal::*;

/// The outlet has exactly `n` consumers.
pub fn consumers_count(n: usize) -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    move |model, outlet| model.consumers(outlet).is_ok_and(|c| c.len() == n)
}

pub fn has_static_shape() -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    |model, outlet| model.outlet_desc(outlet).is_ok_and(|d| d.shape.is_static())
}

pub fn has_static_rank() -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    |model, outlet| model.outlet_desc(outlet).is_ok_and(|d| d.shape.is_rank_static())
}

pub fn rank_equals(rank: usize) -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    move |model, outlet| model.outlet_desc(outlet).is_ok_and(|d| d.shape.rank_length() == Some(rank))
}

pub fn type_matches(et: ElementType) -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    move |model, outlet| model.outlet_desc(outlet).is_ok_and(|d| d.element_type == et)
}

pub fn type_matches_any(types: &[ElementType]) -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    let types: TVec<ElementType> = types.into();
    move |model, outlet| model.outlet_desc(outlet).is_ok_and(|d| types.contains(&d.element_type))
}

/// The outlet value is known at inference time.
pub fn has_value() -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    |model, outlet| model.outlet_desc(outlet).is_ok_and(|d| d.konst.is_some())
}

/// Every predicate holds.
pub fn all(predicates: Vec<Predicate>) -> impl Fn(&Function, OutletId) -> bool + Send + Sync + Clone {
    move |model, outlet| predicates.iter().all(|p| p(model, outlet))
}
