use super::range_constant;
use crate::internal::*;
use crate::ops::binary::{Add, Subtract};
use crate::ops::konst::Constant;
use crate::ops::quant::FakeQuantize;
use crate::optim::MatcherPass;
use crate::pattern::predicates::consumers_count;
use crate::pattern::{Matcher, Pattern};

pub(super) fn matcher_pass() -> MatcherPass {
    let mut p = Pattern::new();
    let input = p.any_input();
    let konst = p.wrap_type::<Constant>(&[]);
    let add = p.wrap_type_with::<Add>(&[input, konst], consumers_count(1));
    let ranges = [p.any_input(), p.any_input(), p.any_input(), p.any_input()];
    let fq = p.wrap_type::<FakeQuantize>(&[add, ranges[0], ranges[1], ranges[2], ranges[3]]);
    let matcher = Matcher::with_root("add-fake-quantize-fusion", p, fq);
    MatcherPass::new(matcher, move |model, m| {
        let x = m.outlet(input)?;
        if model.outlet_desc(x)?.element_type.bitwidth() < ElementType::F32.bitwidth() {
            return Ok(false);
        }
        let (add, fq) = (m.outlet(add)?.node, m.root.node);
        let k = model.outlet_desc(m.outlet(konst)?)?.konst.clone().context("Constant without value")?;
        let Some(k) = range_constant(model, &k, add, fq)? else { return Ok(false) };

        let fq_node = model.node(fq)?;
        let op = *fq_node.op_as::<FakeQuantize>().context("FakeQuantize expected")?;
        let ranges = fq_node.inputs[1..].to_vec();
        let name = fq_node.friendly_name().to_string();
        let k = model.add_const(format!("{name}.shift"), k)?;
        let low = model.wire_or_fold(format!("{name}.input_low"), Subtract::default(), &[ranges[0], k])?[0];
        let high = model.wire_or_fold(format!("{name}.input_high"), Subtract::default(), &[ranges[1], k])?[0];
        model.release(k.node);
        let fused = model.wire_node(name, op, &[x, low, high, ranges[2], ranges[3]])?[0];
        copy_runtime_info(model, &[add, fq], &[low.node, high.node, fused.node])?;
        model.replace_node(fq, fused.node)?;
        Ok(true)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::array::Concat;
    use crate::ops::matmul::MatMul;
    use crate::optim::PassManager;
    use approx::assert_abs_diff_eq;

    struct Net {
        model: Function,
        add: usize,
        fq: usize,
        result: usize,
    }

    fn net(x_shape: &[usize], et: ElementType, k: Tensor) -> Net {
        let mut model = Function::new("add-fq");
        let x = model.add_parameter("x", et, PartialShape::from_static(x_shape)).unwrap();
        let k = model.add_const("k", k).unwrap();
        let add = model.wire_node("add", Add::default(), &[x, k]).unwrap()[0];
        let low = model.add_const("low", tensor0(0f32).cast_to_dt(et).unwrap().into_owned()).unwrap();
        let high = model.add_const("high", tensor0(20f32).cast_to_dt(et).unwrap().into_owned()).unwrap();
        let fq = model
            .wire_node("fq", FakeQuantize::new(11, AutoBroadcast::Numpy), &[add, low, high, low, high])
            .unwrap()[0];
        let result = model.add_result(fq).unwrap();
        Net { model, add: add.node, fq: fq.node, result }
    }

    fn fuse(model: &mut Function) -> usize {
        PassManager::new().with_pass(matcher_pass()).run(model).unwrap()
    }

    fn range(model: &Function, fq: usize, ix: usize) -> Tensor {
        let input = model.node(fq).unwrap().inputs[ix];
        model.outlet_desc(input).unwrap().konst.as_deref().unwrap().clone()
    }

    #[test]
    fn scalar_constant() {
        crate::setup_test_logger();
        let Net { mut model, add, fq, result } = net(&[1, 3], ElementType::F32, tensor0(2f32));
        let before = SimplePlan::new(&model).unwrap().run(tvec!(tensor2(&[[-3f32, 4.1, 15.2]]))).unwrap();
        assert_eq!(fuse(&mut model), 1);
        assert!(model.node(add).unwrap().is_garbage());
        assert!(model.node(fq).unwrap().is_garbage());
        let fused = model.node(result).unwrap().inputs[0].node;
        let node = model.node(fused).unwrap();
        assert!(node.op_is::<FakeQuantize>());
        assert_eq!(node.friendly_name(), "fq");
        assert!(model.node(node.inputs[0].node).unwrap().op_is::<crate::ops::source::Parameter>());
        assert_eq!(range(&model, fused, 1), tensor0(-2f32));
        assert_eq!(range(&model, fused, 2), tensor0(18f32));
        assert_eq!(range(&model, fused, 3), tensor0(0f32));
        assert_eq!(range(&model, fused, 4), tensor0(20f32));
        let after = SimplePlan::new(&model).unwrap().run(tvec!(tensor2(&[[-3f32, 4.1, 15.2]]))).unwrap();
        before[0].close_enough(&after[0], true).unwrap();
    }

    #[test]
    fn per_channel_constant() {
        let k = tensor3(&[[[1f32], [2.0], [3.0]]]);
        let Net { mut model, result, .. } = net(&[2, 3, 4], ElementType::F32, k);
        assert_eq!(fuse(&mut model), 1);
        let fused = model.node(result).unwrap().inputs[0].node;
        let low = range(&model, fused, 1);
        assert_eq!(low.shape(), &[1, 3, 1]);
        for (v, e) in low.as_slice::<f32>().unwrap().iter().zip([-1f32, -2.0, -3.0]) {
            assert_abs_diff_eq!(*v, e);
        }
    }

    #[test]
    fn narrow_types_are_left_alone() {
        let Net { mut model, add, .. } = net(&[1, 3], ElementType::F16, tensor0(f16::from_f32(2.0)));
        assert_eq!(fuse(&mut model), 0);
        assert!(!model.node(add).unwrap().is_garbage());
    }

    #[test]
    fn shared_add_is_left_alone() {
        let Net { mut model, add, .. } = net(&[1, 3], ElementType::F32, tensor0(2f32));
        model.add_result(OutletId::new(add, 0)).unwrap();
        assert_eq!(fuse(&mut model), 0);
    }

    #[test]
    fn concat_consumer_blocks_per_channel_constant() {
        let k = tensor2(&[[1f32], [2.0], [3.0]]);
        let Net { mut model, fq, .. } = net(&[3, 4], ElementType::F32, k.clone());
        let out = OutletId::new(fq, 0);
        model.wire_node("concat", Concat::new(0), &[out, out]).unwrap();
        assert_eq!(fuse(&mut model), 0);

        let Net { mut model, .. } = net(&[3, 4], ElementType::F32, k);
        assert_eq!(fuse(&mut model), 1);
    }

    #[test]
    fn matmul_producer_blocks_per_channel_constant() {
        let mut model = Function::new("mm");
        let a = model.add_parameter("a", ElementType::F32, PartialShape::from_static(&[3, 2])).unwrap();
        let b = model.add_const("b", tensor2(&[[1f32, 0.0, 1.0, 0.0], [0.0, 1.0, 0.0, 1.0]])).unwrap();
        let mm = model.wire_node("mm", MatMul::default(), &[a, b]).unwrap()[0];
        let k = model.add_const("k", tensor2(&[[1f32], [2.0], [3.0]])).unwrap();
        let add = model.wire_node("add", Add::default(), &[mm, k]).unwrap()[0];
        let low = model.add_const("low", tensor0(0f32)).unwrap();
        let high = model.add_const("high", tensor0(1f32)).unwrap();
        let fq = model.wire_node("fq", FakeQuantize::new(2, AutoBroadcast::Numpy), &[add, low, high, low, high]).unwrap();
        model.add_result(fq[0]).unwrap();
        assert_eq!(fuse(&mut model), 0);
    }
}
