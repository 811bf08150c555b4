use super::{Pattern, PatternId, PatternNode};
use crate::internal::*;

/// A successful match: the outlet bound to every visited pattern node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub root: OutletId,
    pub map: HashMap<PatternId, OutletId>,
}

impl Match {
    pub fn get(&self, id: PatternId) -> Option<OutletId> {
        self.map.get(&id).copied()
    }

    /// Node bound to `id`.
    pub fn node(&self, id: PatternId) -> Option<usize> {
        self.get(id).map(|o| o.node)
    }

    /// Like `get`, for pattern nodes a match always binds.
    pub fn outlet(&self, id: PatternId) -> GraftResult<OutletId> {
        self.get(id).with_context(|| format!("Pattern node {id} is not bound"))
    }
}

/// Matches a pattern against the graph, starting from its root.
///
/// Matching is a depth-first descent binding pattern nodes to outlets. The
/// only backtracking point is `Or`: alternatives are tried in order, and the
/// bindings of a failed alternative are dropped.
#[derive(Clone, Debug)]
pub struct Matcher {
    name: String,
    pattern: Pattern,
    root: PatternId,
}

impl Matcher {
    pub fn new(name: impl Into<String>, pattern: Pattern) -> GraftResult<Matcher> {
        let root = pattern.root().context("Empty pattern")?;
        Ok(Matcher { name: name.into(), pattern, root })
    }

    /// Match from `root` instead of the last pattern node added.
    pub fn with_root(name: impl Into<String>, pattern: Pattern, root: PatternId) -> Matcher {
        Matcher { name: name.into(), pattern, root }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Match the root against any output of `node`.
    pub fn match_node(&self, model: &Function, node: usize) -> Option<Match> {
        let outputs = model.node(node).ok()?.outputs.len();
        (0..outputs).find_map(|slot| self.match_value(model, OutletId::new(node, slot)))
    }

    pub fn match_value(&self, model: &Function, outlet: OutletId) -> Option<Match> {
        let mut map = HashMap::default();
        if self.match_pattern(model, self.root, outlet, &mut map) {
            trace!("{}: matched at {:?}", self.name, outlet);
            Some(Match { root: outlet, map })
        } else {
            None
        }
    }

    fn match_pattern(
        &self,
        model: &Function,
        id: PatternId,
        outlet: OutletId,
        map: &mut HashMap<PatternId, OutletId>,
    ) -> bool {
        if let Some(bound) = map.get(&id) {
            return *bound == outlet;
        }
        let Ok(node) = model.node(outlet.node) else { return false };
        if node.is_garbage() {
            return false;
        }
        let matched = match self.pattern.node(id) {
            PatternNode::Any { predicate } => predicate.as_ref().is_none_or(|p| p(model, outlet)),
            PatternNode::Op { kinds, inputs, predicate } => {
                if !kinds.contains(&node.kind()) || !predicate.as_ref().is_none_or(|p| p(model, outlet)) {
                    trace!("{}: {} rejected {}", self.name, id, node);
                    return false;
                }
                if !inputs.is_empty() && inputs.len() != node.inputs.len() {
                    return false;
                }
                map.insert(id, outlet);
                let inputs_match = inputs
                    .iter()
                    .zip(node.inputs.iter())
                    .all(|(&input, &producer)| self.match_pattern(model, input, producer, map));
                if !inputs_match {
                    map.remove(&id);
                }
                return inputs_match;
            }
            PatternNode::Or(alternatives) => {
                for &alt in alternatives {
                    let snapshot = map.clone();
                    if self.match_pattern(model, alt, outlet, map) {
                        map.insert(id, outlet);
                        return true;
                    }
                    *map = snapshot;
                }
                false
            }
        };
        if matched {
            map.insert(id, outlet);
        }
        matched
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::binary::{Add, Multiply};
    use crate::ops::konst::Constant;
    use crate::ops::unary::Relu;
    use crate::pattern::predicates::consumers_count;

    fn add_relu() -> (Pattern, PatternId, PatternId, PatternId) {
        let mut p = Pattern::new();
        let x = p.any_input();
        let k = p.wrap_type::<Constant>(&[]);
        let add = p.wrap_type_with::<Add>(&[x, k], consumers_count(1));
        p.wrap_type::<Relu>(&[add]);
        (p, x, k, add)
    }

    #[test]
    fn binds_every_pattern_node() {
        let mut model = Function::new("m");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
        let k = model.add_const("k", tensor0(1f32)).unwrap();
        let add = model.wire_node("add", Add::default(), &[x, k]).unwrap();
        let relu = model.wire_node("relu", Relu, &add).unwrap();
        let (pattern, px, pk, padd) = add_relu();
        let m = Matcher::new("add_relu", pattern).unwrap().match_node(&model, relu[0].node).unwrap();
        assert_eq!(m.root, relu[0]);
        assert_eq!(m.get(px), Some(x));
        assert_eq!(m.get(pk), Some(k));
        assert_eq!(m.get(padd), Some(add[0]));
    }

    #[test]
    fn consumers_count_rejects_shared_value() {
        let mut model = Function::new("m");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
        let k = model.add_const("k", tensor0(1f32)).unwrap();
        let add = model.wire_node("add", Add::default(), &[x, k]).unwrap();
        let relu = model.wire_node("relu", Relu, &add).unwrap();
        model.wire_node("other", Multiply::default(), &[add[0], x]).unwrap();
        let matcher = Matcher::new("add_relu", add_relu().0).unwrap();
        assert!(matcher.match_node(&model, relu[0].node).is_none());
    }

    #[test]
    fn kind_and_arity_mismatch() {
        let mut model = Function::new("m");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
        let add = model.wire_node("add", Add::default(), &[x, x]).unwrap();
        let relu = model.wire_node("relu", Relu, &add).unwrap();
        let matcher = Matcher::new("add_relu", add_relu().0).unwrap();
        assert!(matcher.match_node(&model, relu[0].node).is_none());
        assert!(matcher.match_node(&model, add[0].node).is_none());
    }

    #[test]
    fn same_pattern_node_binds_once() {
        let mut model = Function::new("m");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
        let y = model.add_parameter("y", ElementType::F32, PartialShape::dynamic()).unwrap();
        let square = model.wire_node("square", Multiply::default(), &[x, x]).unwrap()[0];
        let product = model.wire_node("product", Multiply::default(), &[x, y]).unwrap()[0];
        let mut p = Pattern::new();
        let any = p.any_input();
        p.wrap_type::<Multiply>(&[any, any]);
        let matcher = Matcher::new("square", p).unwrap();
        assert!(matcher.match_value(&model, square).is_some());
        assert!(matcher.match_value(&model, product).is_none());
    }

    #[test]
    fn alternatives() {
        let mut model = Function::new("m");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
        let relu = model.wire_node("relu", Relu, &[x]).unwrap()[0];
        let mut p = Pattern::new();
        let any = p.any_input();
        let add = p.wrap_type::<Add>(&[any, any]);
        let relu_p = p.wrap_type::<Relu>(&[any]);
        let either = p.or(&[add, relu_p]);
        let m = Matcher::new("either", p).unwrap().match_value(&model, relu).unwrap();
        assert_eq!(m.get(either), Some(relu));
        assert_eq!(m.get(relu_p), Some(relu));
        assert_eq!(m.get(add), None);
        assert_eq!(m.get(any), Some(x));
    }
}
