use crate::internal::*;
use graft_data::graft_ndarray::{ArrayD, Axis, IxDyn};

/// Numpy-style matrix product, with optional transposition of the two
/// innermost axes of each operand. Rank 1 operands are promoted to matrices
/// and the promoted axis is removed from the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, new)]
pub struct MatMul {
    pub transpose_a: bool,
    pub transpose_b: bool,
}

impl MatMul {
    /// Output shape, or None when operands are incompatible.
    fn output_shape(&self, a: &PartialShape, b: &PartialShape) -> Option<PartialShape> {
        let (Some(a), Some(b)) = (a.dims(), b.dims()) else {
            return Some(PartialShape::dynamic());
        };
        if a.is_empty() || b.is_empty() {
            return None;
        }
        let mut a: TVec<Dimension> = a.into();
        let mut b: TVec<Dimension> = b.into();
        let (a_vec, b_vec) = (a.len() == 1, b.len() == 1);
        if a_vec {
            a.insert(0, 1.into());
        } else if self.transpose_a {
            let r = a.len();
            a.swap(r - 2, r - 1);
        }
        if b_vec {
            b.push(1.into());
        } else if self.transpose_b {
            let r = b.len();
            b.swap(r - 2, r - 1);
        }
        let (ra, rb) = (a.len(), b.len());
        Dimension::merge(&a[ra - 1], &b[rb - 2])?;
        let batch = PartialShape::broadcast_merge(
            &PartialShape::new(a[..ra - 2].iter().cloned()),
            &PartialShape::new(b[..rb - 2].iter().cloned()),
        )?;
        let mut dims: TVec<Dimension> = batch.dims()?.into();
        if !a_vec {
            dims.push(a[ra - 2].clone());
        }
        if !b_vec {
            dims.push(b[rb - 1].clone());
        }
        Some(dims.into())
    }

    fn eval_t<T: Arith>(&self, a: &Tensor, b: &Tensor) -> GraftResult<Tensor> {
        let mut a = a.to_array_view::<T>()?;
        let mut b = b.to_array_view::<T>()?;
        let (a_vec, b_vec) = (a.ndim() == 1, b.ndim() == 1);
        if a_vec {
            a.insert_axis_inplace(Axis(0));
        } else if self.transpose_a {
            a.swap_axes(a.ndim() - 2, a.ndim() - 1);
        }
        if b_vec {
            b.insert_axis_inplace(Axis(1));
        } else if self.transpose_b {
            b.swap_axes(b.ndim() - 2, b.ndim() - 1);
        }
        let (ra, rb) = (a.ndim(), b.ndim());
        let (m, k, n) = (a.shape()[ra - 2], a.shape()[ra - 1], b.shape()[rb - 1]);
        ensure!(k == b.shape()[rb - 2], "Inner dimension mismatch: {:?} x {:?}", a.shape(), b.shape());
        let batch = super::broadcast_shape(&[&a.shape()[..ra - 2], &b.shape()[..rb - 2]])?;
        let shape_a: TVec<usize> = batch.iter().copied().chain([m, k]).collect();
        let shape_b: TVec<usize> = batch.iter().copied().chain([k, n]).collect();
        let a = a.broadcast(&*shape_a).context("Broadcasting batch axes")?;
        let b = b.broadcast(&*shape_b).context("Broadcasting batch axes")?;
        let shape_c: TVec<usize> = batch.iter().copied().chain([m, n]).collect();
        let mut c = ArrayD::<T>::default(IxDyn(&shape_c));
        let rank = shape_c.len();
        for (coords, v) in c.indexed_iter_mut() {
            let mut ia: TVec<usize> = (0..rank).map(|ix| coords[ix]).collect();
            let mut ib = ia.clone();
            let mut acc = T::zero();
            for kk in 0..k {
                ia[rank - 1] = kk;
                ib[rank - 2] = kk;
                acc = acc.add(a[&*ia].mul(b[&*ib]));
            }
            *v = acc;
        }
        if b_vec {
            c.index_axis_inplace(Axis(rank - 1), 0);
        }
        if a_vec {
            c.index_axis_inplace(Axis(c.ndim() - 1 - usize::from(!b_vec)), 0);
        }
        Ok(c.as_standard_layout().into_owned().into())
    }
}

impl Operation for MatMul {
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        ctx.check_arity(2, 2)?;
        let (a, b) = (ctx.input(0)?, ctx.input(1)?);
        let Some(et) = ElementType::merge(a.element_type, b.element_type) else {
            return Err(ctx.failure(format!("Mixed element types {} and {}", a.element_type, b.element_type)));
        };
        let Some(shape) = self.output_shape(&a.shape, &b.shape) else {
            return Err(ctx.failure(format!("Incompatible matrix product operands {} x {}", a.shape, b.shape)));
        };
        ctx.set_output_type(0, et, shape);
        Ok(())
    }

    fn has_evaluate(&self) -> bool {
        true
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let (a, b) = args_2!(inputs);
        ensure!(a.element_type() == b.element_type(), "Mixed element types");
        let output = dispatch_numbers!(Self::eval_t(a.element_type())(self, &a, &b))?;
        Ok(tvec!(output.into_arc_tensor()))
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        visitor.on_attribute("transpose_a", &AttributeValue::Bool(self.transpose_a))?;
        visitor.on_attribute("transpose_b", &AttributeValue::Bool(self.transpose_b))
    }
}
