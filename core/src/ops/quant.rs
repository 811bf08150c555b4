//! Fake quantization: snap values on a uniform grid, staying in floating
//! point.
use crate::internal::*;
use graft_data::graft_ndarray::{ArrayD, IxDyn};

/// Inputs are the data `X`, then the input range `input_low`, `input_high`
/// and the output range `output_low`, `output_high`, all broadcastable to
/// `X`.
///
/// Values at or below the input range low end map to `output_low`, values
/// above its high end map to `output_high`. Others are rounded (half to
/// even) to one of `levels` steps, then rescaled to the output range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct FakeQuantize {
    pub levels: usize,
    pub auto_broadcast: AutoBroadcast,
}

impl FakeQuantize {
    pub fn quantize(&self, x: f64, il: f64, ih: f64, ol: f64, oh: f64) -> f64 {
        if x <= il.min(ih) {
            ol
        } else if x > il.max(ih) {
            oh
        } else {
            let steps = (self.levels - 1) as f64;
            ((x - il) / (ih - il) * steps).round_ties_even() / steps * (oh - ol) + ol
        }
    }

    fn eval_t<T: Datum>(&self, inputs: &[Arc<Tensor>]) -> GraftResult<Tensor> {
        let x = inputs[0].to_array_view::<T>()?;
        let shape = x.shape().to_vec();
        let params = inputs[1..]
            .iter()
            .map(|t| t.to_array_view::<T>())
            .collect::<GraftResult<Vec<_>>>()?;
        let params = params
            .iter()
            .map(|p| p.broadcast(&*shape).with_context(|| format!("Broadcasting {:?} to {:?}", p.shape(), shape)))
            .collect::<GraftResult<Vec<_>>>()?;
        let values = x
            .indexed_iter()
            .map(|(coords, v)| {
                let p = |ix: usize| params[ix][&coords].to_f64();
                T::from_f64(self.quantize(v.to_f64(), p(0), p(1), p(2), p(3)))
            })
            .collect::<Vec<T>>();
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?.into())
    }
}

impl Operation for FakeQuantize {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(5, 5)?;
        node_check!(ctx, self.levels > 1, "Levels must be greater than 1, got {}", self.levels);
        let mut et = ctx.input_type(0)?;
        node_check!(ctx, et.is_dynamic() || et.is_real(), "Data input must be floating point, got {}", et);
        let mut shape = ctx.input_shape(0)?.clone();
        for ix in 1..5 {
            let input = ctx.input(ix)?;
            let Some(merged) = ElementType::merge(et, input.element_type) else {
                return Err(ctx.failure(format!("Mixed element types: {} and {}", et, input.element_type)));
            };
            et = merged;
            let Some(merged) = self.auto_broadcast.merge(&shape, &input.shape) else {
                return Err(ctx.failure(format!("Input #{} shape {} does not fit {}", ix, input.shape, shape)));
            };
            shape = merged;
        }
        let output_shape = ctx.input_shape(0)?.clone();
        let output_type = ctx.input_type(0)?;
        ctx.set_output_type(0, output_type, output_shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        ensure!(inputs.len() == 5, "FakeQuantize expects 5 inputs, got {}", inputs.len());
        let output = dispatch_floatlike!(Self::eval_t(inputs[0].element_type())(self, &inputs))?;
        Ok(tvec!(output.into_arc_tensor()))
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("levels", &AttributeValue::I64(self.levels as i64))?;
        visitor.on_attribute("auto_broadcast", &self.auto_broadcast.as_attribute())
    }
}
