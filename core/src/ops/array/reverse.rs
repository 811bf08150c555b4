use crate::internal::*;
use graft_data::graft_ndarray::Axis;
use std::collections::BTreeSet;
use std::fmt;

/// How the second input of `Reverse` designates the axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReverseMode {
    /// a list of axis indices
    #[default]
    Index,
    /// one boolean per data axis
    Mask,
}

impl fmt::Display for ReverseMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReverseMode::Index => write!(fmt, "index"),
            ReverseMode::Mask => write!(fmt, "mask"),
        }
    }
}

/// Reverse the order of elements along some axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, new)]
pub struct Reverse {
    pub mode: ReverseMode,
}

impl Reverse {
    /// Axes to reverse, each once and in increasing order, or a failure
    /// message.
    fn axes(&self, rank: usize, axes: &Tensor) -> Result<TVec<usize>, String> {
        match self.mode {
            ReverseMode::Index => {
                let mut result = BTreeSet::new();
                for axis in axes.as_i64s() {
                    if axis < 0 || axis as usize >= rank {
                        return Err(format!("Axis {axis} out of range for data of rank {rank}"));
                    }
                    result.insert(axis as usize);
                }
                Ok(result.into_iter().collect())
            }
            ReverseMode::Mask => {
                if axes.len() != rank {
                    return Err(format!("Mask has {} elements, data is of rank {}", axes.len(), rank));
                }
                Ok(axes.as_i64s().iter().enumerate().filter(|(_, m)| **m != 0).map(|(ix, _)| ix).collect())
            }
        }
    }
}

impl Operation for Reverse {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(2, 2)?;
        let axes_et = ctx.input_type(1)?;
        let axes_shape = ctx.input_shape(1)?.clone();
        match self.mode {
            ReverseMode::Index => node_check!(
                ctx,
                axes_et.is_dynamic() || axes_et.is_integral_number(),
                "In index mode, axes must be integral, got {}",
                axes_et
            ),
            ReverseMode::Mask => node_check!(
                ctx,
                axes_et.is_dynamic() || axes_et == ElementType::Boolean,
                "In mask mode, axes must be boolean, got {}",
                axes_et
            ),
        }
        node_check!(ctx, axes_shape.rank().compatible(&Dimension::new(1)), "Axes input must be rank 1, got {}", axes_shape);
        let data = ctx.input(0)?.clone();
        if let Some(rank) = data.shape.rank_length() {
            if let Some(len) = axes_shape.dims().and_then(|d| d.first()).and_then(|d| d.get_length()) {
                match self.mode {
                    ReverseMode::Index => node_check!(
                        ctx,
                        (len as usize) <= rank,
                        "{} axes given for data of rank {}",
                        len,
                        rank
                    ),
                    ReverseMode::Mask => node_check!(
                        ctx,
                        (len as usize) == rank,
                        "Mask has {} elements, data is of rank {}",
                        len,
                        rank
                    ),
                }
            }
            if let Some(axes) = ctx.input_value(1) {
                if let Err(msg) = self.axes(rank, axes) {
                    return Err(ctx.failure(msg));
                }
            }
        }
        ctx.set_output_type(0, data.element_type, data.shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let (data, axes) = args_2!(inputs);
        let axes = self.axes(data.rank(), &axes).map_err(|msg| format_err!(msg))?;
        if axes.is_empty() {
            return Ok(tvec!(data));
        }
        fn reverse<T: Datum>(data: &Tensor, axes: &[usize]) -> GraftResult<Tensor> {
            let mut view = data.to_array_view::<T>()?;
            for &axis in axes {
                view.invert_axis(Axis(axis));
            }
            Ok(view.as_standard_layout().into_owned().into())
        }
        let output = dispatch_datum!(reverse(data.element_type())(&data, &axes))?;
        Ok(tvec!(output.into_arc_tensor()))
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("mode", &AttributeValue::String(self.mode.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn data_4x3() -> Arc<Tensor> {
        Arc::new(tensor1(&(0..12).collect::<Vec<i32>>()).into_shape(&[4, 3]).unwrap())
    }

    fn eval(mode: ReverseMode, data: Arc<Tensor>, axes: Tensor) -> Tensor {
        let out = Reverse::new(mode).eval(tvec!(data, axes.into_arc_tensor())).unwrap();
        Arc::unwrap_or_clone(out[0].clone())
    }

    #[test]
    fn reverse_1d() {
        let data = rctensor1(&[0f32, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(
            eval(ReverseMode::Index, data.clone(), tensor1(&[0i64])),
            tensor1(&[7f32, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0])
        );
        assert_eq!(eval(ReverseMode::Index, data.clone(), tensor1::<i64>(&[])), *data);
    }

    #[test]
    fn reverse_2d() {
        let expected_0 = tensor2(&[[9i32, 10, 11], [6, 7, 8], [3, 4, 5], [0, 1, 2]]);
        let expected_1 = tensor2(&[[2i32, 1, 0], [5, 4, 3], [8, 7, 6], [11, 10, 9]]);
        let expected_01 = tensor2(&[[11i32, 10, 9], [8, 7, 6], [5, 4, 3], [2, 1, 0]]);
        assert_eq!(eval(ReverseMode::Index, data_4x3(), tensor1(&[0i64])), expected_0);
        assert_eq!(eval(ReverseMode::Index, data_4x3(), tensor1(&[1i64])), expected_1);
        assert_eq!(eval(ReverseMode::Mask, data_4x3(), tensor1(&[false, true])), expected_1);
        assert_eq!(eval(ReverseMode::Index, data_4x3(), tensor1(&[0i64, 1])), expected_01);
        assert_eq!(eval(ReverseMode::Mask, data_4x3(), tensor1(&[true, true])), expected_01);
    }

    fn wire(mode: ReverseMode, axes: OutletId, model: &mut Function) -> GraftResult<TVec<OutletId>> {
        let data = model.add_parameter("data", ElementType::F32, PartialShape::from_static(&[2, 2, 2]))?;
        model.wire_node("reverse", Reverse::new(mode), &[data, axes])
    }

    #[test]
    fn invalid_axes() {
        let mut model = Function::new("reverse");
        let rank_2 = model.add_parameter("axes", ElementType::I64, PartialShape::from_static(&[1, 1])).unwrap();
        assert!(wire(ReverseMode::Index, rank_2, &mut model).is_err());
        let short_mask = model.add_parameter("mask", ElementType::Boolean, PartialShape::from_static(&[2])).unwrap();
        assert!(wire(ReverseMode::Mask, short_mask, &mut model).is_err());
        let out_of_range = model.add_const("oor", tensor1(&[1i64, 10])).unwrap();
        assert!(wire(ReverseMode::Index, out_of_range, &mut model).is_err());
        let too_many = model.add_const("many", tensor1(&[0i64, 1, 2, 3])).unwrap();
        assert!(wire(ReverseMode::Index, too_many, &mut model).is_err());
        let float_axes = model.add_const("float", tensor1(&[0f32])).unwrap();
        assert!(wire(ReverseMode::Index, float_axes, &mut model).is_err());
        let negative = model.add_const("negative", tensor1(&[-1i64])).unwrap();
        assert!(wire(ReverseMode::Index, negative, &mut model).is_err());
        let ok = model.add_const("ok", tensor1(&[0i64, 2])).unwrap();
        assert!(wire(ReverseMode::Index, ok, &mut model).is_ok());
    }

    #[test]
    fn repeated_axis_reverses_once() {
        let data = rctensor1(&[0i32, 1, 2, 3]);
        assert_eq!(eval(ReverseMode::Index, data, tensor1(&[0i64, 0])), tensor1(&[3i32, 2, 1, 0]));
        let expected_0 = tensor2(&[[9i32, 10, 11], [6, 7, 8], [3, 4, 5], [0, 1, 2]]);
        assert_eq!(eval(ReverseMode::Index, data_4x3(), tensor1(&[0i64, 0])), expected_0);
    }

    #[test]
    fn repeated_axis_passes_validation() {
        let mut model = Function::new("reverse");
        let data = model.add_parameter("data", ElementType::I32, PartialShape::from_static(&[4, 3])).unwrap();
        let axes = model.add_const("axes", tensor1(&[0i64, 0])).unwrap();
        let rev = model.wire_node("reverse", Reverse::new(ReverseMode::Index), &[data, axes]).unwrap();
        model.add_result(rev[0]).unwrap();
        let out = SimplePlan::new(&model).unwrap().run(tvec!((*data_4x3()).clone())).unwrap();
        assert_eq!(*out[0], tensor2(&[[9i32, 10, 11], [6, 7, 8], [3, 4, 5], [0, 1, 2]]));
    }

    #[test]
    fn reverse_3d() {
        let data = Arc::new(tensor1(&(0..24).collect::<Vec<i32>>()).into_shape(&[2, 4, 3]).unwrap());
        let expect = |values: [i32; 24]| tensor1(&values).into_shape(&[2, 4, 3]).unwrap();
        let cases: [(&[i64], [bool; 3], [i32; 24]); 7] = [
            (&[0], [true, false, false], [12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]),
            (&[1], [false, true, false], [9, 10, 11, 6, 7, 8, 3, 4, 5, 0, 1, 2, 21, 22, 23, 18, 19, 20, 15, 16, 17, 12, 13, 14]),
            (&[2], [false, false, true], [2, 1, 0, 5, 4, 3, 8, 7, 6, 11, 10, 9, 14, 13, 12, 17, 16, 15, 20, 19, 18, 23, 22, 21]),
            (&[0, 1], [true, true, false], [21, 22, 23, 18, 19, 20, 15, 16, 17, 12, 13, 14, 9, 10, 11, 6, 7, 8, 3, 4, 5, 0, 1, 2]),
            (&[0, 2], [true, false, true], [14, 13, 12, 17, 16, 15, 20, 19, 18, 23, 22, 21, 2, 1, 0, 5, 4, 3, 8, 7, 6, 11, 10, 9]),
            (&[1, 2], [false, true, true], [11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 23, 22, 21, 20, 19, 18, 17, 16, 15, 14, 13, 12]),
            (&[0, 1, 2], [true, true, true], [23, 22, 21, 20, 19, 18, 17, 16, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0]),
        ];
        for (axes, mask, expected) in cases {
            assert_eq!(eval(ReverseMode::Index, data.clone(), tensor1(axes)), expect(expected), "axes {axes:?}");
            assert_eq!(eval(ReverseMode::Mask, data.clone(), tensor1(&mask)), expect(expected), "mask {mask:?}");
        }
    }
}
