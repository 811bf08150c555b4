use crate::internal::*;
use crate::ops::cast::Convert;
use crate::optim::MatcherPass;
use crate::pattern::{Matcher, Pattern};

pub(super) fn matcher_pass() -> MatcherPass {
    let mut p = Pattern::new();
    let input = p.any_input();
    let convert = p.wrap_type::<Convert>(&[input]);
    let matcher = Matcher::with_root("eliminate-convert", p, convert);
    MatcherPass::new(matcher, move |model, m| {
        let input = m.outlet(input)?;
        let node = model.node(m.root.node)?;
        let to = node.op_as::<Convert>().context("Convert expected")?.to;
        if model.outlet_desc(input)?.element_type != to {
            return Ok(false);
        }
        let id = node.id;
        model.replace_output(m.root, input)?;
        model.release(id);
        Ok(true)
    })
}
