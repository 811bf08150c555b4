use graft_core::internal::*;
use graft_core::ops::array::{Reverse, ReverseMode, Slice};
use graft_core::ops::binary::{Add, Multiply};
use graft_core::ops::cast::Convert;
use graft_core::ops::quant::FakeQuantize;
use graft_core::ops::unary::Relu;
use graft_core::optim::{fuse, MarkMemoryDependencies, MEMORY_DEPENDENCIES};
use graft_core::pattern::predicates::consumers_count;

fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("GRAFT_LOG").try_init();
}

#[test]
fn reverse_index_mode() {
    setup_test_logger();
    let mut model = Function::new("reverse");
    let data = model.add_parameter("data", ElementType::F32, PartialShape::from_static(&[8])).unwrap();
    let axes = model.add_const("axes", tensor1(&[0i64])).unwrap();
    let rev = model.wire_node("rev", Reverse::new(ReverseMode::Index), &[data, axes]).unwrap();
    model.add_result(rev[0]).unwrap();
    let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
    let output = SimplePlan::new(&model).unwrap().run(tvec!(tensor1(&input))).unwrap();
    let expected: Vec<f32> = (0..8).rev().map(|i| i as f32).collect();
    assert_eq!(*output[0], tensor1(&expected));
}

#[test]
fn reverse_rejects_rank_2_axes() {
    let mut model = Function::new("reverse");
    let data = model.add_parameter("data", ElementType::F32, PartialShape::from_static(&[2, 2])).unwrap();
    let axes = model.add_const("axes", tensor2(&[[0i64, 1]])).unwrap();
    let err = model.wire_node("rev", Reverse::new(ReverseMode::Index), &[data, axes]).unwrap_err();
    assert!(format!("{err:#}").contains("rev"));
}

#[test]
fn slice_drops_first_element() {
    let mut model = Function::new("slice");
    let data = model.add_parameter("data", ElementType::F32, PartialShape::from_static(&[10])).unwrap();
    let start = model.add_const("start", tensor1(&[1i64])).unwrap();
    let stop = model.add_const("stop", tensor1(&[i64::MAX])).unwrap();
    let step = model.add_const("step", tensor1(&[1i64])).unwrap();
    let sliced = model.wire_node("slice", Slice, &[data, start, stop, step]).unwrap()[0];
    assert_eq!(model.outlet_desc(sliced).unwrap().shape, PartialShape::from_static(&[9]));
}

#[test]
fn add_fake_quantize_fusion_with_scalar() {
    setup_test_logger();
    let mut model = Function::new("add-fq");
    let x = model.add_parameter("x", ElementType::F32, PartialShape::from_static(&[1, 4])).unwrap();
    let c = model.add_const("c", tensor0(0.5f32)).unwrap();
    let add = model.wire_node("add", Add::default(), &[x, c]).unwrap()[0];
    let low = model.add_const("low", tensor0(-1f32)).unwrap();
    let high = model.add_const("high", tensor0(1f32)).unwrap();
    let fq = model.wire_node("fq", FakeQuantize::new(256, AutoBroadcast::Numpy), &[add, low, high, low, high]).unwrap();
    let result = model.add_result(fq[0]).unwrap();

    let done = PassManager::new().with_pass(fuse::add_fake_quantize_fusion()).run(&mut model).unwrap();
    assert_eq!(done, 1);
    assert!(model.node(add.node).unwrap().is_garbage());
    assert!(model.node(add.node).unwrap().outputs[0].successors.is_empty());

    let fused = model.node(model.node(result).unwrap().inputs[0].node).unwrap();
    assert!(fused.op_is::<FakeQuantize>());
    assert_eq!(fused.inputs[0], x);
    let value = |ix: usize| model.outlet_desc(fused.inputs[ix]).unwrap().konst.clone().unwrap();
    assert_eq!(*value(1), tensor0(-1.5f32));
    assert_eq!(*value(2), tensor0(0.5f32));
    assert_eq!(*value(3), tensor0(-1f32));
    assert_eq!(*value(4), tensor0(1f32));
}

#[test]
fn replaced_node_keeps_no_consumers() {
    let mut model = Function::new("replace");
    let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
    let old = model.wire_node("old", Relu, &[x]).unwrap()[0];
    let square = model.wire_node("square", Multiply::default(), &[old, old]).unwrap()[0];
    model.add_result(square).unwrap();
    let new = model.wire_node("new", Relu, &[x]).unwrap()[0];
    model.replace_node(old.node, new.node).unwrap();
    let old = model.node(old.node).unwrap();
    assert!(old.is_garbage());
    assert!(old.outputs[0].successors.is_empty());
    assert_eq!(model.node(square.node).unwrap().inputs.as_slice(), &[new, new]);
    assert_eq!(model.consumers(new).unwrap().len(), 2);
    model.check_edges().unwrap();
}

#[test]
fn consumers_count_rejects_shared_value() {
    let mut model = Function::new("shared");
    let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
    let relu = model.wire_node("relu", Relu, &[x]).unwrap()[0];
    let a = model.wire_node("a", Relu, &[relu]).unwrap()[0];
    model.wire_node("b", Relu, &[relu]).unwrap();

    let mut pattern = Pattern::new();
    let input = pattern.any_input();
    let inner = pattern.wrap_type_with::<Relu>(&[input], consumers_count(1));
    pattern.wrap_type::<Relu>(&[inner]);
    let matcher = Matcher::new("relu-relu", pattern).unwrap();
    assert!(matcher.match_value(&model, a).is_none());
}

#[test]
fn common_optimizations() {
    setup_test_logger();
    let mut model = Function::new("common");
    let x = model.add_parameter("x", ElementType::F32, PartialShape::from_static(&[1, 3])).unwrap();
    let one = model.add_const("one", tensor0(1f32)).unwrap();
    let two = model.wire_node("two", Add::default(), &[one, one]).unwrap()[0];
    let converted = model.wire_node("convert", Convert::new(ElementType::F32), &[x]).unwrap()[0];
    let add = model.wire_node("add", Add::default(), &[converted, two]).unwrap()[0];
    let low = model.add_const("low", tensor0(0f32)).unwrap();
    let high = model.add_const("high", tensor0(10f32)).unwrap();
    let fq = model.wire_node("fq", FakeQuantize::new(11, AutoBroadcast::Numpy), &[add, low, high, low, high]).unwrap();
    model.add_result(fq[0]).unwrap();

    let input = tvec!(tensor2(&[[-4f32, 3.2, 7.6]]));
    let before = SimplePlan::new(&model).unwrap().run(input.clone()).unwrap();
    PassManager::common_optimizations().run(&mut model).unwrap();
    let after = SimplePlan::new(&model).unwrap().run(input).unwrap();
    before[0].close_enough(&after[0], true).unwrap();

    let fused = model.node_by_name("fq").unwrap();
    assert!(fused.op_is::<FakeQuantize>());
    assert_eq!(fused.inputs[0], x);
    let names = fused.rt_info.fused_names().unwrap();
    assert!(names.contains("add") && names.contains("fq"));
    assert!(model.nodes().iter().filter(|n| !n.is_garbage()).all(|n| !n.op_is::<Convert>() && !n.op_is::<Add>()));

    let live = model.nodes().iter().filter(|n| !n.is_garbage()).count();
    model.compact().unwrap();
    assert_eq!(model.nodes().len(), live);
    let out = SimplePlan::new(&model).unwrap().run(tvec!(tensor2(&[[-4f32, 3.2, 7.6]]))).unwrap();
    before[0].close_enough(&out[0], true).unwrap();
}

#[test]
fn memory_dependencies_annotation() {
    let mut model = Function::new("diamond");
    let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
    let left = model.wire_node("left", Relu, &[x]).unwrap()[0];
    let right = model.wire_node("right", Relu, &[x]).unwrap()[0];
    let join = model.wire_node("join", Add::default(), &[left, right]).unwrap()[0];
    model.add_result(join).unwrap();
    let done = PassManager::new().with_pass(MarkMemoryDependencies).run(&mut model).unwrap();
    assert_eq!(done, 0);
    let deps = |name: &str| match model.node_by_name(name).unwrap().rt_info.get(MEMORY_DEPENDENCIES) {
        Some(RtAttribute::Value(AttributeValue::VecString(names))) => names.clone(),
        _ => vec![],
    };
    assert_eq!(deps("left"), vec!["right".to_string(), "x".to_string()]);
    assert_eq!(deps("right"), vec!["left".to_string()]);
    assert!(deps("join").is_empty());
}
