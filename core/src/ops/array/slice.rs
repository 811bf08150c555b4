use crate::internal::*;
use graft_data::graft_ndarray::Axis;

/// Strided slicing along a subset of axes.
///
/// Inputs: data, start, stop, step and an optional list of axes (defaults to
/// the leading `len(start)` axes). Negative start and stop count from the
/// end of the axis, and out of range bounds are clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Slice;

/// Start, stop and the number of selected elements along an axis of length
/// `dim`, after normalization and clamping.
fn clamp_bounds(dim: i64, start: i64, stop: i64, step: i64) -> (i64, i64, i64) {
    let start = if start < 0 { start.saturating_add(dim) } else { start };
    let stop = if stop < 0 { stop.saturating_add(dim) } else { stop };
    let start = start.clamp(0, dim);
    let stop = stop.clamp(-1, dim);
    if step < 0 {
        let start = start.min(dim - 1);
        (start, stop, (start - stop).max(0))
    } else {
        (start, stop, (stop - start).max(0))
    }
}

fn sliced_len(dim: i64, start: i64, stop: i64, step: i64) -> i64 {
    let (_, _, elements) = clamp_bounds(dim, start, stop, step);
    strided(elements, step)
}

fn strided(elements: i64, step: i64) -> i64 {
    (elements as u64).div_ceil(step.unsigned_abs()) as i64
}

/// Length of a sliced axis, keeping the tightest interval when the input
/// dimension is dynamic.
fn sliced_dim(dim: &Dimension, start: i64, stop: i64, step: i64) -> Dimension {
    if let Some(len) = dim.get_length() {
        return Dimension::new(sliced_len(len, start, stop, step));
    }
    let max = dim.max_length();
    if max.is_none() {
        if (step < 0 && start < 0 && stop > 0) || (step > 0 && stop < 0 && start > 0) {
            return Dimension::dynamic();
        } else if step < 0 && start > 0 && stop < 0 {
            return if start >= i32::MAX as i64 {
                Dimension::dynamic()
            } else {
                Dimension::interval(0, start + 1)
            };
        } else if step > 0 && stop > 0 && start < 0 {
            return if stop >= i32::MAX as i64 { Dimension::dynamic() } else { Dimension::interval(0, stop) };
        }
    }
    let low = sliced_len(dim.min_length(), start, stop, step);
    let high = sliced_len(max.unwrap_or(i64::MAX), start, stop, step);
    let (low, high) = (low.min(high), low.max(high));
    if max.is_none() && high > i32::MAX as i64 {
        Dimension::at_least(low)
    } else {
        Dimension::interval(low, high)
    }
}

/// Indices selected along an axis of length `dim`.
fn slice_indices(dim: usize, start: i64, stop: i64, step: i64) -> Vec<usize> {
    let (start, _, elements) = clamp_bounds(dim as i64, start, stop, step);
    (0..strided(elements, step)).map(|i| (start + i * step) as usize).collect()
}

impl Slice {
    /// Per axis (start, stop, step), or a failure message.
    fn bounds(
        rank: usize,
        starts: &[i64],
        stops: &[i64],
        steps: &[i64],
        axes: &[i64],
    ) -> Result<TVec<(usize, i64, i64, i64)>, String> {
        if stops.len() != starts.len() || steps.len() != starts.len() || axes.len() != starts.len() {
            return Err("start, stop, step and axes inputs need to have the same size".to_string());
        }
        let mut bounds: TVec<(usize, i64, i64, i64)> = tvec!();
        for (ix, &axis) in axes.iter().enumerate() {
            let Some(ax) = ops::normalize_axis(axis, rank) else {
                return Err(format!("Axis {axis} is out of range for data of rank {rank}"));
            };
            if bounds.iter().any(|b| b.0 == ax) {
                return Err(format!("Values in axes must be unique, got {axes:?}"));
            }
            if steps[ix] == 0 {
                return Err("Step can not be zero".to_string());
            }
            bounds.push((ax, starts[ix], stops[ix], steps[ix]));
        }
        Ok(bounds)
    }
}

impl Operation for Slice {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(4, 5)?;
        let data = ctx.input(0)?.clone();
        let rank = data.shape.rank_length();
        node_check!(ctx, rank != Some(0), "Slice data input can not be a scalar");
        let names = ["data", "start", "stop", "step", "axes"];
        let mut index_len = Dimension::dynamic();
        for ix in 1..ctx.inputs().len() {
            let et = ctx.input_type(ix)?;
            node_check!(ctx, et.is_dynamic() || et.is_integral_number(), "{} must be integral, got {}", names[ix], et);
            let shape = ctx.input_shape(ix)?.clone();
            node_check!(ctx, shape.rank().compatible(&Dimension::new(1)), "{} must be rank 1, got {}", names[ix], shape);
            if let (Some(rank), Some([len])) = (rank, shape.dims()) {
                node_check!(
                    ctx,
                    len.min_length() <= rank as i64,
                    "{} has more elements than data rank {}",
                    names[ix],
                    rank
                );
            }
            if let Some([len]) = shape.dims() {
                let Some(merged) = Dimension::merge(&index_len, len) else {
                    return Err(ctx.failure(format!("{} length {} does not match other inputs", names[ix], len)));
                };
                index_len = merged;
            }
            ctx.set_input_is_relevant_to_shape(ix, true);
        }
        let Some(rank) = rank else {
            ctx.set_output_type(0, data.element_type, data.shape);
            return Ok(());
        };
        let axes: Option<Vec<i64>> = if ctx.inputs().len() == 5 {
            ctx.input_value(4).map(|axes| axes.as_i64s())
        } else {
            ctx.input_shape(1)?
                .dims()
                .and_then(|d| d.first())
                .and_then(|d| d.get_length())
                .map(|len| (0..len).collect())
        };
        let values: Option<Vec<Vec<i64>>> = (1..4).map(|ix| ctx.input_value(ix).map(|t| t.as_i64s())).collect();
        let mut shape = data.shape.clone();
        match (axes, values) {
            (Some(axes), Some(values)) => {
                let bounds = match Slice::bounds(rank, &values[0], &values[1], &values[2], &axes) {
                    Ok(bounds) => bounds,
                    Err(msg) => return Err(ctx.failure(msg)),
                };
                for (ax, start, stop, step) in bounds {
                    shape[ax] = sliced_dim(&data.shape[ax], start, stop, step);
                }
            }
            (Some(axes), None) => {
                for axis in axes {
                    let Some(ax) = ops::normalize_axis(axis, rank) else {
                        return Err(ctx.failure(format!("Axis {axis} is out of range for data of rank {rank}")));
                    };
                    shape[ax] = upto(&data.shape[ax]);
                }
            }
            (None, _) => {
                for ax in 0..rank {
                    shape[ax] = upto(&data.shape[ax]);
                }
            }
        }
        ctx.set_output_type(0, data.element_type, shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        ensure!(inputs.len() == 4 || inputs.len() == 5, "Slice expects 4 or 5 inputs, got {}", inputs.len());
        let data = &inputs[0];
        let starts = inputs[1].as_i64s();
        let axes: Vec<i64> =
            if let Some(axes) = inputs.get(4) { axes.as_i64s() } else { (0..starts.len() as i64).collect() };
        let bounds = Slice::bounds(data.rank(), &starts, &inputs[2].as_i64s(), &inputs[3].as_i64s(), &axes)
            .map_err(|msg| format_err!(msg))?;
        fn eval_t<T: Datum>(data: &Tensor, bounds: &[(usize, i64, i64, i64)]) -> GraftResult<Tensor> {
            let mut array = data.to_array_view::<T>()?.to_owned();
            for &(axis, start, stop, step) in bounds {
                let indices = slice_indices(array.shape()[axis], start, stop, step);
                array = array.select(Axis(axis), &indices);
            }
            Ok(array.into())
        }
        let output = dispatch_datum!(eval_t(data.element_type())(data, &bounds))?;
        Ok(tvec!(output.into_arc_tensor()))
    }
}

/// Anything from 0 to the current upper bound.
fn upto(dim: &Dimension) -> Dimension {
    match dim.max_length() {
        Some(max) => Dimension::interval(0, max),
        None => Dimension::dynamic(),
    }
}
