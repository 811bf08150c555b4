use super::{Pass, PassSession};
use crate::internal::*;
use crate::ops::konst::Constant;

/// Replace every node whose value can be computed at optimization time by a
/// `Constant`.
///
/// A node is folded when its outputs values are already known from
/// inference, or when every input its value depends on is known. Inputs
/// contributing only their shape are fed a zero tensor of that shape. An
/// evaluation failure only means the node stays as it is.
#[derive(Clone, Debug, Default)]
pub struct ConstantFolding;

impl ConstantFolding {
    /// Values of the outputs of `id`, if they can be computed.
    fn fold(model: &Function, id: usize) -> GraftResult<Option<TVec<Arc<Tensor>>>> {
        let node = model.node(id)?;
        if let Some(known) = node.outputs.iter().map(|o| o.desc.konst.clone()).collect::<Option<TVec<_>>>() {
            return Ok(Some(known));
        }
        let mut inputs = tvec!();
        for (ix, input) in node.inputs.iter().enumerate() {
            let desc = model.outlet_desc(*input)?;
            let value_relevant = node.relevance.get(ix).is_none_or(|r| r.value);
            match &desc.konst {
                Some(k) => inputs.push(k.clone()),
                None if !value_relevant && desc.shape.is_static() && desc.element_type.is_static() => {
                    inputs.push(Tensor::zero_dt(desc.element_type, &desc.shape.to_shape()?)?.into_arc_tensor())
                }
                None => return Ok(None),
            }
        }
        match node.op.eval(inputs) {
            Ok(outputs) => Ok(Some(outputs)),
            Err(e) => {
                debug!("Could not fold {node}: {e:#}");
                Ok(None)
            }
        }
    }
}

impl Pass for ConstantFolding {
    fn name(&self) -> Cow<'static, str> {
        "constant-folding".into()
    }

    fn run(&mut self, session: &mut PassSession, model: &mut Function) -> GraftResult<usize> {
        let mut done = 0;
        for id in model.get_ordered_ops()? {
            if session.exhausted() {
                break;
            }
            let node = model.node(id)?;
            if node.is_garbage()
                || !node.op.can_constant_fold()
                || node.rt_info.is_constant_folding_disabled()
                || node.op_is::<Constant>()
            {
                continue;
            }
            let Some(values) = Self::fold(model, id)? else { continue };
            let name = node.friendly_name().to_string();
            let single = values.len() == 1;
            let mut constants = tvec!();
            for (ix, value) in values.into_iter().enumerate() {
                let name = if single { name.clone() } else { format!("{name}.{ix}") };
                constants.push(model.add_const(name, value)?);
            }
            if single {
                model.replace_node(id, constants[0].node)?;
            } else {
                for (slot, k) in constants.iter().enumerate() {
                    model.replace_output(OutletId::new(id, slot), *k)?;
                }
                let targets = constants.iter().map(|k| k.node).collect::<TVec<_>>();
                copy_runtime_info(model, &[id], &targets)?;
                model.release(id);
            }
            session.record("constant-folding", &name);
            done += 1;
        }
        Ok(done)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::array::{Reshape, ShapeOf};
    use crate::ops::binary::{Add, Divide, Multiply};
    use crate::ops::memory::ReadValue;
    use crate::ops::unary::Relu;
    use crate::optim::PassManager;
    use proptest::prelude::*;

    fn fold(model: &mut Function) -> usize {
        PassManager::new().with_pass(ConstantFolding).run(model).unwrap()
    }

    #[test]
    fn folds_constant_chain() {
        let mut model = Function::new("chain");
        let a = model.add_const("a", tensor1(&[1f32, -2.0])).unwrap();
        let b = model.add_const("b", tensor0(3f32)).unwrap();
        let sum = model.wire_node("sum", Add::default(), &[a, b]).unwrap();
        let prod = model.wire_node("prod", Multiply::default(), &[sum[0], b]).unwrap();
        let relu = model.wire_node("relu", Relu, &prod).unwrap();
        let result = model.add_result(relu[0]).unwrap();
        assert_eq!(fold(&mut model), 3);
        let folded = model.node(result).unwrap().inputs[0];
        let node = model.node(folded.node).unwrap();
        assert!(node.op_is::<Constant>());
        assert_eq!(node.friendly_name(), "relu");
        assert_eq!(model.outlet_desc(folded).unwrap().konst.as_deref(), Some(&tensor1(&[12f32, 3.0])));
        let live = model.nodes().iter().filter(|n| !n.is_garbage()).count();
        assert_eq!(live, 2);
    }

    fn folded_chain(len: usize) -> Arc<Tensor> {
        let mut model = Function::new("chain");
        let mut wire = model.add_const("k", tensor0(1i32)).unwrap();
        let one = model.add_const("one", tensor0(1i32)).unwrap();
        for i in 0..len {
            wire = model.wire_node(format!("add{i}"), Add::default(), &[wire, one]).unwrap()[0];
        }
        let result = model.add_result(wire).unwrap();
        fold(&mut model);
        let input = model.node(result).unwrap().inputs[0];
        model.outlet_desc(input).unwrap().konst.clone().unwrap()
    }

    proptest! {
        #[test]
        fn same_value_whatever_the_chain_length(len in 1usize..24) {
            prop_assert_eq!(&*folded_chain(len), &tensor0(len as i32 + 1));
        }
    }

    #[test]
    fn leaves_dynamic_and_stateful_nodes() {
        let mut model = Function::new("m");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::dynamic()).unwrap();
        let k = model.add_const("k", tensor0(1f32)).unwrap();
        let sum = model.wire_node("sum", Add::default(), &[x, k]).unwrap();
        model.add_result(sum[0]).unwrap();
        let read = model
            .wire_node("read", ReadValue::new("v".into(), ElementType::F32, PartialShape::scalar()), &[k])
            .unwrap();
        model.add_result(read[0]).unwrap();
        assert_eq!(fold(&mut model), 0);
    }

    #[test]
    fn evaluation_failure_is_not_an_error() {
        let mut model = Function::new("m");
        let a = model.add_const("a", tensor1(&[7i32, 8])).unwrap();
        let zero = model.add_const("zero", tensor0(0i32)).unwrap();
        let div = model.wire_node("div", Divide::default(), &[a, zero]).unwrap();
        model.add_result(div[0]).unwrap();
        assert_eq!(fold(&mut model), 0);
        assert!(model.node(div[0].node).unwrap().op_is::<Divide>());
    }

    #[test]
    fn honours_disabled_folding() {
        let mut model = Function::new("m");
        let a = model.add_const("a", tensor0(1f32)).unwrap();
        let sum = model.wire_node("sum", Add::default(), &[a, a]).unwrap();
        model.add_result(sum[0]).unwrap();
        model.node_mut(sum[0].node).unwrap().rt_info.disable_constant_folding();
        assert_eq!(fold(&mut model), 0);
        assert!(!model.node(sum[0].node).unwrap().is_garbage());
    }

    #[test]
    fn shape_only_inputs() {
        let mut model = Function::new("m");
        let x = model.add_parameter("x", ElementType::F32, PartialShape::from_static(&[2, 3])).unwrap();
        let shape = model.wire_node("shape", ShapeOf::default(), &[x]).unwrap();
        let flat = model.add_const("flat", tensor1(&[-1i64])).unwrap();
        let reshaped = model.wire_node("reshape", Reshape::new(false), &[x, flat]).unwrap();
        model.add_result(reshaped[0]).unwrap();
        model.add_result(shape[0]).unwrap();
        assert_eq!(fold(&mut model), 1);
        let shape = model.result_outlets()[1];
        assert_eq!(model.outlet_desc(shape).unwrap().konst.as_deref(), Some(&tensor1(&[2i64, 3])));
        assert!(model.node(reshaped[0].node).unwrap().op_is::<Reshape>());
    }
}
