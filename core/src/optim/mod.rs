//! Graph rewriting passes and the manager running them.
//!
//! A pass mutates the function in place. Nodes it replaces become garbage:
//! a pass must not keep node ids across a `replace_node` call, and ids are
//! only renumbered by an explicit `Function::compact`.
use crate::internal::*;
use crate::model::InitNodeInfo;
use std::fmt::Debug;

mod constant_folding;
pub mod fuse;
mod matcher_pass;
mod memory_deps;

pub use self::constant_folding::ConstantFolding;
pub use self::matcher_pass::{GraphRewrite, MatcherCallback, MatcherPass};
pub use self::memory_deps::{MarkMemoryDependencies, MemoryDependencies, MEMORY_DEPENDENCIES};

pub trait Pass: Debug + Send + Sync + dyn_clone::DynClone {
    fn name(&self) -> Cow<'static, str>;

    /// Called before every run.
    fn reset(&mut self) -> GraftResult<()> {
        Ok(())
    }

    /// Run once over the function. Returns how many changes were made.
    fn run(&mut self, session: &mut PassSession, model: &mut Function) -> GraftResult<usize>;
}

dyn_clone::clone_trait_object!(Pass);

/// Bookkeeping shared by the passes of a `PassManager` run.
#[derive(Clone, Debug, Default)]
pub struct PassSession {
    counter: usize,
    steps: Option<usize>,
}

impl PassSession {
    pub fn new(steps: Option<usize>) -> PassSession {
        PassSession { counter: 0, steps }
    }

    /// Rewrites applied so far.
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// True once the rewrite budget is spent.
    pub fn exhausted(&self) -> bool {
        self.steps.is_some_and(|steps| self.counter >= steps)
    }

    /// Account for one applied rewrite.
    pub fn record(&mut self, pass: &str, what: impl std::fmt::Display) {
        debug!("applying rewrite #{}: {} >> {}", self.counter, pass, what);
        self.counter += 1;
    }
}

/// Runs a list of passes over a function, in order.
#[derive(Debug, Clone)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    steps: Option<usize>,
    validate: bool,
    fixpoint: bool,
}

impl Default for PassManager {
    fn default() -> PassManager {
        PassManager { passes: vec![], steps: None, validate: true, fixpoint: false }
    }
}

impl PassManager {
    pub fn new() -> PassManager {
        PassManager::default()
    }

    pub fn with_pass(mut self, pass: impl Pass + 'static) -> PassManager {
        self.passes.push(Box::new(pass));
        self
    }

    /// Stop after `steps` rewrites.
    pub fn stopping_at(self, steps: usize) -> PassManager {
        PassManager { steps: Some(steps), ..self }
    }

    /// Re-run shape and type inference after each pass (default true).
    pub fn validate_after_each_pass(self, validate: bool) -> PassManager {
        PassManager { validate, ..self }
    }

    /// Run the whole list again until no pass changes anything.
    pub fn until_fixpoint(self, fixpoint: bool) -> PassManager {
        PassManager { fixpoint, ..self }
    }

    /// Folding and fusions, repeated until stable.
    pub fn common_optimizations() -> PassManager {
        PassManager::new()
            .with_pass(InitNodeInfo)
            .with_pass(ConstantFolding)
            .with_pass(
                GraphRewrite::new("common-fusions")
                    .with_matcher(fuse::eliminate_convert())
                    .with_matcher(fuse::add_fake_quantize_fusion())
                    .with_matcher(fuse::mul_fake_quantize_fusion()),
            )
            .until_fixpoint(true)
    }

    /// Run the passes. Returns how many changes were made.
    pub fn run(&self, model: &mut Function) -> GraftResult<usize> {
        let mut session = PassSession::new(self.steps);
        let mut passes = self.passes.clone();
        let mut total = 0;
        for round in 0.. {
            let mut changed = 0;
            for pass in passes.iter_mut() {
                if session.exhausted() {
                    debug!("Rewrite budget exhausted, skipping {}", pass.name());
                    return Ok(total + changed);
                }
                pass.reset()?;
                let done = pass
                    .run(&mut session, model)
                    .with_context(|| format!("Running pass {} (round {})", pass.name(), round))?;
                debug!("Pass {} (round {}): {} change(s)", pass.name(), round, done);
                if self.validate {
                    model
                        .validate_nodes_and_infer_types()
                        .with_context(|| format!("Validating after pass {}", pass.name()))?;
                }
                model.check_edges().with_context(|| format!("after pass {}", pass.name()))?;
                changed += done;
            }
            total += changed;
            if !self.fixpoint || changed == 0 {
                break;
            }
        }
        Ok(total)
    }
}
