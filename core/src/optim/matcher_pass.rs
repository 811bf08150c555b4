use super::{Pass, PassSession};
use crate::internal::*;
use crate::pattern::{Match, Matcher};

/// Rewrites the graph around a match. Returns false when it declines to
/// change anything, in which case it must have left the graph untouched.
pub type MatcherCallback = Arc<dyn Fn(&mut Function, &Match) -> GraftResult<bool> + Send + Sync>;

/// A pattern and the rewrite to apply where it matches.
#[derive(Clone)]
pub struct MatcherPass {
    matcher: Matcher,
    callback: MatcherCallback,
}

impl std::fmt::Debug for MatcherPass {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "MatcherPass({})", self.matcher.name())
    }
}

impl MatcherPass {
    pub fn new(
        matcher: Matcher,
        callback: impl Fn(&mut Function, &Match) -> GraftResult<bool> + Send + Sync + 'static,
    ) -> MatcherPass {
        MatcherPass { matcher, callback: Arc::new(callback) }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Try the rewrite rooted at `node`. Returns true if the graph changed.
    pub fn apply(&self, session: &mut PassSession, model: &mut Function, node: usize) -> GraftResult<bool> {
        let Some(found) = self.matcher.match_node(model, node) else { return Ok(false) };
        let changed =
            (self.callback)(model, &found).with_context(|| format!("Applying {} at node #{}", self.matcher.name(), node))?;
        if changed {
            session.record(self.matcher.name(), node);
            model.check_edges()?;
        }
        Ok(changed)
    }
}

impl Pass for MatcherPass {
    fn name(&self) -> Cow<'static, str> {
        self.matcher.name().to_string().into()
    }

    fn run(&mut self, session: &mut PassSession, model: &mut Function) -> GraftResult<usize> {
        let mut done = 0;
        for node in model.get_ordered_ops()? {
            if session.exhausted() {
                break;
            }
            if model.node(node)?.is_garbage() {
                continue;
            }
            if self.apply(session, model, node)? {
                done += 1;
            }
        }
        Ok(done)
    }
}

/// Several matcher passes sharing one walk over the graph. On each node,
/// matchers are tried in registration order and the first one changing the
/// graph wins.
#[derive(Clone, Debug)]
pub struct GraphRewrite {
    name: String,
    matchers: Vec<MatcherPass>,
}

impl GraphRewrite {
    pub fn new(name: impl Into<String>) -> GraphRewrite {
        GraphRewrite { name: name.into(), matchers: vec![] }
    }

    pub fn with_matcher(mut self, matcher: MatcherPass) -> GraphRewrite {
        self.matchers.push(matcher);
        self
    }
}

impl Pass for GraphRewrite {
    fn name(&self) -> Cow<'static, str> {
        self.name.clone().into()
    }

    fn run(&mut self, session: &mut PassSession, model: &mut Function) -> GraftResult<usize> {
        let mut done = 0;
        for node in model.get_ordered_ops()? {
            for matcher in &self.matchers {
                if session.exhausted() {
                    return Ok(done);
                }
                if model.node(node)?.is_garbage() {
                    break;
                }
                if matcher.apply(session, model, node)? {
                    done += 1;
                    break;
                }
            }
        }
        Ok(done)
    }
}
