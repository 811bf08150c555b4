use crate::internal::*;
use graft_data::graft_ndarray::{concatenate, ArrayViewD, Axis};

/// Join tensors along an existing axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct Concat {
    pub axis: i64,
}

impl Concat {
    fn eval_t<T: Datum>(&self, axis: usize, inputs: &[Arc<Tensor>]) -> GraftResult<Tensor> {
        let views = inputs.iter().map(|t| t.to_array_view::<T>()).collect::<GraftResult<Vec<ArrayViewD<T>>>>()?;
        Ok(concatenate(Axis(axis), &views)?.into())
    }
}

impl Operation for Concat {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        node_check!(ctx, !ctx.inputs().is_empty(), "At least one argument required");
        let mut et = ElementType::Dynamic;
        let mut rank: Option<usize> = None;
        for input in ctx.inputs() {
            let Some(merged) = ElementType::merge(et, input.element_type) else {
                return Err(ctx.failure(format!("Mixed element types {} and {}", et, input.element_type)));
            };
            et = merged;
            if let Some(r) = input.shape.rank_length() {
                node_check!(ctx, rank.is_none_or(|rank| rank == r), "Mixed input ranks");
                rank = Some(r);
            }
        }
        let Some(rank) = rank else {
            ctx.set_output_type(0, et, PartialShape::dynamic());
            return Ok(());
        };
        let Some(axis) = super::super::normalize_axis(self.axis, rank) else {
            return Err(ctx.failure(format!("Concatenation axis {} out of range for rank {}", self.axis, rank)));
        };
        let mut dims: TVec<Dimension> = tvec!(Dimension::dynamic(); rank);
        let mut length = Dimension::new(0);
        for input in ctx.inputs() {
            match input.shape.dims() {
                Some(input_dims) => {
                    for (ix, d) in input_dims.iter().enumerate() {
                        if ix == axis {
                            continue;
                        }
                        let Some(merged) = Dimension::merge(&dims[ix], d) else {
                            return Err(ctx.failure(format!(
                                "Argument shapes are inconsistent on axis {}: {} vs {}",
                                ix, dims[ix], d
                            )));
                        };
                        dims[ix] = merged;
                    }
                    length = length + input_dims[axis].clone();
                }
                None => length = length + Dimension::dynamic(),
            }
        }
        dims[axis] = length;
        ctx.set_output_type(0, et, dims.into());
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        ensure!(!inputs.is_empty(), "Concat needs at least one input");
        let rank = inputs[0].rank();
        let axis = super::super::normalize_axis(self.axis, rank)
            .with_context(|| format!("Axis {} out of range for rank {}", self.axis, rank))?;
        let output = dispatch_datum!(Self::eval_t(inputs[0].element_type())(self, axis, &inputs))?;
        Ok(tvec!(output.into_arc_tensor()))
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("axis", &AttributeValue::I64(self.axis))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn infer_and_eval() {
        let mut model = Function::new("concat");
        let a = model
            .add_parameter("a", ElementType::F32, PartialShape::new([2.into(), Dimension::dynamic()]))
            .unwrap();
        let b = model.add_parameter("b", ElementType::F32, PartialShape::from_static(&[3, 4])).unwrap();
        let c = model.wire_node("c", Concat::new(0), &[a, b]).unwrap()[0];
        assert_eq!(model.outlet_desc(c).unwrap().shape, PartialShape::from_static(&[5, 4]));
        let bad = model.add_parameter("bad", ElementType::F32, PartialShape::from_static(&[3, 5])).unwrap();
        assert!(model.wire_node("c2", Concat::new(0), &[b, bad]).is_err());
        assert!(model.wire_node("c3", Concat::new(2), &[a, b]).is_err());

        let out = Concat::new(-1)
            .eval(tvec!(rctensor2(&[[1i32], [2]]), rctensor2(&[[3i32, 4], [5, 6]])))
            .unwrap();
        assert_eq!(*out[0], tensor2(&[[1i32, 3, 4], [2, 5, 6]]));
    }
}
