//! Local fusions, each a `MatcherPass`.
use crate::internal::*;
use crate::ops::array::Concat;
use crate::ops::matmul::MatMul;

use super::MatcherPass;

mod add_fake_quantize;
mod eliminate_convert;
mod mul_fake_quantize;

/// `FakeQuantize(x + c)` to `FakeQuantize(x)` with its input range shifted
/// by `-c`.
pub fn add_fake_quantize_fusion() -> MatcherPass {
    add_fake_quantize::matcher_pass()
}

/// `FakeQuantize(x * c)` to `FakeQuantize(x)` with its input range divided
/// by `c`, for positive `c`.
pub fn mul_fake_quantize_fusion() -> MatcherPass {
    mul_fake_quantize::matcher_pass()
}

/// Drop a `Convert` to the type its input already has.
pub fn eliminate_convert() -> MatcherPass {
    eliminate_convert::matcher_pass()
}

/// Bring the constant operand `k` of the elementwise node `op` feeding the
/// FakeQuantize `fq` to a shape its range inputs can absorb.
///
/// Single values pass through, as a one element tensor. Other constants
/// must vary along the batch axis only (`[N, 1, ...]`) or along the channel
/// axis only (`[1, C, 1, ...]`), and are prepended unit axes up to the rank
/// of the quantized data. Per channel constants are kept away from MatMul
/// producers, which may fuse them on their own, and from FakeQuantize with
/// Concat consumers, which expect per tensor ranges.
fn range_constant(model: &Function, k: &Tensor, op: usize, fq: usize) -> GraftResult<Option<Tensor>> {
    if k.len() == 1 {
        return Ok(Some(k.clone()));
    }
    if k.is_empty() {
        return Ok(None);
    }
    if k.is_uniform() {
        fn first<T: Datum>(t: &Tensor) -> GraftResult<Tensor> {
            Tensor::from_shape(&[1], &t.as_slice::<T>()?[..1])
        }
        return Ok(Some(dispatch_datum!(first(k.element_type())(k))?));
    }
    let (shape, size) = (k.shape(), k.len());
    let per_batch = shape[0] > 1 && shape[0] == size;
    let per_channel = shape.len() > 1 && shape[1] == size;
    if !per_batch && !per_channel {
        trace!("Constant of shape {shape:?} is neither per batch nor per channel");
        return Ok(None);
    }
    let producers = model.input_outlets(op)?;
    if producers.iter().map(|o| model.node(o.node)).collect::<GraftResult<TVec<_>>>()?.iter().any(|n| n.op_is::<MatMul>()) {
        return Ok(None);
    }
    let fq_node = model.node(fq)?;
    let consumers = fq_node.outputs.iter().flat_map(|o| o.successors.iter());
    if consumers.map(|s| model.node(s.node)).collect::<GraftResult<TVec<_>>>()?.iter().any(|n| n.op_is::<Concat>()) {
        return Ok(None);
    }
    let Some(rank) = model.outlet_desc(fq_node.inputs[0])?.shape.rank_length() else { return Ok(None) };
    if rank < k.rank() {
        return Ok(None);
    }
    Ok(Some(k.clone().broadcast_into_rank(rank)?))
}
