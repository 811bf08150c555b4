use crate::internal::*;

/// Reshape the data input to the shape given by the second input.
///
/// In the target shape, `-1` (at most once) stands for whatever dimension
/// keeps the element count, and, if `special_zero` is set, `0` copies the
/// input dimension at the same position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, new)]
pub struct Reshape {
    pub special_zero: bool,
}

impl Reshape {
    /// Output shape for a known pattern, or a failure message.
    pub fn output_shape(&self, input: &PartialShape, pattern: &[i64]) -> Result<PartialShape, String> {
        let mut dims: TVec<Dimension> = tvec!();
        let mut inferred = None;
        for (ix, &p) in pattern.iter().enumerate() {
            match p {
                -1 if inferred.is_some() => return Err("More than one dimension is -1".to_string()),
                -1 => {
                    inferred = Some(ix);
                    dims.push(Dimension::dynamic());
                }
                0 if self.special_zero => match input.rank_length() {
                    Some(rank) if ix < rank => dims.push(input[ix].clone()),
                    Some(rank) => return Err(format!("Zero at position {ix} beyond input rank {rank}")),
                    None => dims.push(Dimension::dynamic()),
                },
                p if p < -1 => return Err(format!("Dimension size {p} is not valid")),
                p => dims.push(Dimension::new(p)),
            }
        }
        let volume = input.volume();
        match inferred {
            Some(ix) => {
                let known: Dimension = dims.iter().enumerate().filter(|(i, _)| *i != ix).map(|(_, d)| d.clone()).product();
                if let (Some(total), Some(known)) = (volume.get_length(), known.get_length()) {
                    if known == 0 || total % known != 0 {
                        return Err(format!("Can not infer -1: {total} elements into {known} sized blocks"));
                    }
                    dims[ix] = Dimension::new(total / known);
                } else {
                    dims[ix] = volume / known;
                }
            }
            None => {
                let output: Dimension = dims.iter().cloned().product();
                if let (Some(a), Some(b)) = (volume.get_length(), output.get_length()) {
                    if a != b {
                        return Err(format!("Requested output shape has {b} elements, input has {a}"));
                    }
                }
            }
        }
        Ok(dims.into())
    }
}

impl Operation for Reshape {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(2, 2)?;
        let et = ctx.input_type(1)?;
        node_check!(ctx, et.is_dynamic() || et.is_integral_number(), "Pattern must be integral, got {}", et);
        let pattern_shape = ctx.input_shape(1)?.clone();
        node_check!(
            ctx,
            pattern_shape.rank().compatible(&1.into()) || pattern_shape.rank().compatible(&0.into()),
            "Pattern must be of rank 0 or 1, got {}",
            pattern_shape
        );
        ctx.set_input_is_relevant_to_shape(1, true);
        let input = ctx.input(0)?.clone();
        let shape = match ctx.input_value(1) {
            Some(pattern) => match self.output_shape(&input.shape, &pattern.as_i64s()) {
                Ok(shape) => shape,
                Err(msg) => return Err(ctx.failure(msg)),
            },
            None => match pattern_shape.dims() {
                Some([len]) if len.is_static() => PartialShape::dynamic_of_rank(len.to_usize()?),
                Some([]) => PartialShape::dynamic_of_rank(1),
                _ => PartialShape::dynamic(),
            },
        };
        ctx.set_output_type(0, input.element_type, shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let (data, pattern) = args_2!(inputs);
        let shape = self
            .output_shape(&PartialShape::from_static(data.shape()), &pattern.as_i64s())
            .map_err(|msg| format_err!(msg))?
            .to_shape()?;
        let output = Arc::unwrap_or_clone(data).into_shape(&shape)?;
        Ok(tvec!(output.into_arc_tensor()))
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("special_zero", &AttributeValue::Bool(self.special_zero))
    }
}
