//! Runtime information attached to nodes, and its propagation across
//! rewrites.
use crate::internal::*;
use std::collections::{BTreeMap, BTreeSet};

pub const FUSED_NAMES: &str = "fused_names";
pub const PRIMITIVES_PRIORITY: &str = "primitives_priority";
pub const DISABLE_CONSTANT_FOLDING: &str = "disable_constant_folding";
pub const LAYOUT: &str = "layout";

#[derive(Clone, Debug, PartialEq)]
pub enum RtAttribute {
    /// Friendly names of every node merged into this one.
    FusedNames(BTreeSet<String>),
    /// Comma separated list of preferred kernel implementations.
    PrimitivesPriority(String),
    /// Keep constant folding away from this node.
    DisableConstantFolding,
    Layout(Layout),
    Value(AttributeValue),
}

impl RtAttribute {
    /// Whether the attribute survives a rewrite, being copied from replaced
    /// nodes to their replacements.
    pub fn is_copyable(&self) -> bool {
        !matches!(self, RtAttribute::DisableConstantFolding | RtAttribute::Layout(_))
    }

    fn merge(&self, other: &RtAttribute) -> RtAttribute {
        match (self, other) {
            (RtAttribute::FusedNames(a), RtAttribute::FusedNames(b)) => {
                RtAttribute::FusedNames(a.union(b).cloned().collect())
            }
            _ => other.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RtInfo(pub BTreeMap<String, RtAttribute>);

impl RtInfo {
    pub fn get(&self, key: &str) -> Option<&RtAttribute> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RtAttribute) -> Option<RtAttribute> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<RtAttribute> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fused_names(&self) -> Option<&BTreeSet<String>> {
        match self.get(FUSED_NAMES) {
            Some(RtAttribute::FusedNames(names)) => Some(names),
            _ => None,
        }
    }

    pub fn disable_constant_folding(&mut self) {
        self.insert(DISABLE_CONSTANT_FOLDING, RtAttribute::DisableConstantFolding);
    }

    pub fn is_constant_folding_disabled(&self) -> bool {
        self.contains(DISABLE_CONSTANT_FOLDING)
    }
}

/// Merge the runtime info of `from` nodes into each of the `to` nodes.
///
/// Copyable attributes from the sources are merged (the fused names sets are
/// united, a source lacking one contributing its own friendly name), then
/// written over each target. Non copyable attributes already on a target are
/// kept.
pub fn copy_runtime_info(model: &mut Function, from: &[usize], to: &[usize]) -> GraftResult<()> {
    let mut merged: BTreeMap<String, RtAttribute> = BTreeMap::new();
    for &src in from {
        let node = model.node(src)?;
        for (key, attr) in node.rt_info.0.iter().filter(|(_, a)| a.is_copyable()) {
            let value = match merged.get(key) {
                Some(previous) => previous.merge(attr),
                None => attr.clone(),
            };
            merged.insert(key.clone(), value);
        }
    }
    if merged.contains_key(FUSED_NAMES) {
        let mut names = btreeset!();
        for &src in from {
            let node = model.node(src)?;
            match node.rt_info.fused_names() {
                Some(fused) => names.extend(fused.iter().cloned()),
                None => {
                    names.insert(node.friendly_name().to_string());
                }
            }
        }
        merged.insert(FUSED_NAMES.to_string(), RtAttribute::FusedNames(names));
    }
    for &dst in to {
        let node = model.node_mut(dst)?;
        let mut info: BTreeMap<String, RtAttribute> = node
            .rt_info
            .0
            .iter()
            .filter(|(_, a)| !a.is_copyable())
            .map(|(k, a)| (k.clone(), a.clone()))
            .collect();
        info.extend(merged.iter().map(|(k, a)| (k.clone(), a.clone())));
        node.rt_info = RtInfo(info);
    }
    Ok(())
}

/// Seed every node with a fused names set holding its own friendly name, so
/// that later rewrites can track what was merged where.
#[derive(Clone, Debug, Default)]
pub struct InitNodeInfo;

impl crate::optim::Pass for InitNodeInfo {
    fn name(&self) -> Cow<'static, str> {
        "init-node-info".into()
    }

    fn run(
        &mut self,
        _session: &mut crate::optim::PassSession,
        model: &mut Function,
    ) -> GraftResult<usize> {
        let mut done = 0;
        for node in model.nodes_mut() {
            if node.is_garbage() || node.rt_info.contains(FUSED_NAMES) {
                continue;
            }
            let names = btreeset!(node.friendly_name().to_string());
            node.rt_info.insert(FUSED_NAMES, RtAttribute::FusedNames(names));
            done += 1;
        }
        Ok(done)
    }
}
