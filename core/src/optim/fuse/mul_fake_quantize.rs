use super::range_constant;
use crate::internal::*;
use crate::ops::binary::{Divide, Multiply};
use crate::ops::konst::Constant;
use crate::ops::quant::FakeQuantize;
use crate::optim::MatcherPass;
use crate::pattern::predicates::consumers_count;
use crate::pattern::{Matcher, Pattern};

pub(super) fn matcher_pass() -> MatcherPass {
    let mut p = Pattern::new();
    let input = p.any_input();
    let konst = p.wrap_type::<Constant>(&[]);
    let mul = p.wrap_type_with::<Multiply>(&[input, konst], consumers_count(1));
    let ranges = [p.any_input(), p.any_input(), p.any_input(), p.any_input()];
    let fq = p.wrap_type::<FakeQuantize>(&[mul, ranges[0], ranges[1], ranges[2], ranges[3]]);
    let matcher = Matcher::with_root("mul-fake-quantize-fusion", p, fq);
    MatcherPass::new(matcher, move |model, m| {
        let x = m.outlet(input)?;
        if !model.outlet_desc(x)?.element_type.is_real() {
            return Ok(false);
        }
        let (mul, fq) = (m.outlet(mul)?.node, m.root.node);
        let k = model.outlet_desc(m.outlet(konst)?)?.konst.clone().context("Constant without value")?;
        // a negative scale would swap the range bounds
        if !k.as_f64s().iter().all(|v| *v > 0.0) {
            return Ok(false);
        }
        let Some(k) = range_constant(model, &k, mul, fq)? else { return Ok(false) };

        let fq_node = model.node(fq)?;
        let op = *fq_node.op_as::<FakeQuantize>().context("FakeQuantize expected")?;
        let ranges = fq_node.inputs[1..].to_vec();
        let name = fq_node.friendly_name().to_string();
        let k = model.add_const(format!("{name}.scale"), k)?;
        let low = model.wire_or_fold(format!("{name}.input_low"), Divide::default(), &[ranges[0], k])?[0];
        let high = model.wire_or_fold(format!("{name}.input_high"), Divide::default(), &[ranges[1], k])?[0];
        model.release(k.node);
        let fused = model.wire_node(name, op, &[x, low, high, ranges[2], ranges[3]])?[0];
        copy_runtime_info(model, &[mul, fq], &[low.node, high.node, fused.node])?;
        model.replace_node(fq, fused.node)?;
        Ok(true)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::optim::PassManager;

    fn net(k: Tensor) -> (Function, usize) {
        let mut model = Function::new("mul-fq");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::from_static(&[1, 2, 2])).unwrap();
        let k = model.add_const("k", k).unwrap();
        let mul = model.wire_node("mul", Multiply::default(), &[x, k]).unwrap()[0];
        let low = model.add_const("low", tensor0(-4f32)).unwrap();
        let high = model.add_const("high", tensor0(4f32)).unwrap();
        let fq = model.wire_node("fq", FakeQuantize::new(9, AutoBroadcast::Numpy), &[mul, low, high, low, high]).unwrap();
        let result = model.add_result(fq[0]).unwrap();
        (model, result)
    }

    fn fuse(model: &mut Function) -> usize {
        PassManager::new().with_pass(matcher_pass()).run(model).unwrap()
    }

    #[test]
    fn positive_scale() {
        let (mut model, result) = net(tensor0(2f32));
        let input = tvec!(tensor3(&[[[-1.2f32, 0.3], [0.9, 2.5]]]));
        let before = SimplePlan::new(&model).unwrap().run(input.clone()).unwrap();
        assert_eq!(fuse(&mut model), 1);
        let fused = model.node(result).unwrap().inputs[0].node;
        let node = model.node(fused).unwrap();
        let konst = |ix: usize| model.outlet_desc(node.inputs[ix]).unwrap().konst.clone().unwrap();
        assert_eq!(*konst(1), tensor0(-2f32));
        assert_eq!(*konst(2), tensor0(2f32));
        let after = SimplePlan::new(&model).unwrap().run(input).unwrap();
        before[0].close_enough(&after[0], true).unwrap();
    }

    #[test]
    fn per_channel_scale() {
        let (mut model, result) = net(tensor3(&[[[1f32], [4.0]]]));
        assert_eq!(fuse(&mut model), 1);
        let fused = model.node(result).unwrap().inputs[0].node;
        let low = model.node(fused).unwrap().inputs[1];
        assert_eq!(*model.outlet_desc(low).unwrap().konst.clone().unwrap(), tensor3(&[[[-4f32], [-1.0]]]));
    }

    #[test]
    fn non_positive_scale() {
        assert_eq!(fuse(&mut net(tensor0(-2f32)).0), 0);
        assert_eq!(fuse(&mut net(tensor0(0f32)).0), 0);
        assert_eq!(fuse(&mut net(tensor3(&[[[1f32], [-1.0]]])).0), 0);
    }
}
