//! Element-wise arithmetic between two tensors, with broadcasting.
use crate::internal::*;
use graft_data::graft_ndarray::{ArrayD, IxDyn};

/// Shared inference of binary element-wise ops: same element type (not
/// boolean), shapes merged according to `auto_broadcast`.
pub fn infer_binary(ctx: &mut InferenceContext, auto_broadcast: AutoBroadcast) -> GraftResult<()> {
    ctx.check_arity(2, 2)?;
    let (a, b) = (ctx.input(0)?, ctx.input(1)?);
    let Some(et) = ElementType::merge(a.element_type, b.element_type) else {
        return Err(ctx.failure(format!(
            "Arguments do not have the same element type ({} vs {})",
            a.element_type, b.element_type
        )));
    };
    node_check!(ctx, et != ElementType::Boolean, "Arguments can not have boolean element type");
    let Some(shape) = auto_broadcast.merge(&a.shape, &b.shape) else {
        return Err(ctx.failure(format!("Argument shapes are inconsistent: {} vs {}", a.shape, b.shape)));
    };
    ctx.set_output_type(0, et, shape);
    Ok(())
}

/// Apply `f` element-wise on `a` and `b` after broadcasting. `f` returning
/// None aborts the computation.
pub fn eval_binary<T: Arith>(
    a: &Tensor,
    b: &Tensor,
    auto_broadcast: AutoBroadcast,
    f: impl Fn(T, T) -> Option<T>,
) -> GraftResult<Tensor> {
    let shape = match auto_broadcast {
        AutoBroadcast::None => {
            ensure!(a.shape() == b.shape(), "Shape mismatch {:?} vs {:?}", a.shape(), b.shape());
            a.shape().into()
        }
        AutoBroadcast::Numpy => super::broadcast_shape(&[a.shape(), b.shape()])?,
    };
    let a = a.to_array_view::<T>()?;
    let b = b.to_array_view::<T>()?;
    let a = a.broadcast(&*shape).context("Broadcasting first argument")?;
    let b = b.broadcast(&*shape).context("Broadcasting second argument")?;
    let values = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f(*x, *y))
        .collect::<Option<Vec<T>>>()
        .context("Arithmetic error")?;
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?.into())
}

macro_rules! bin_op {
    ($(#[$meta: meta])* $Op: ident, |$a: ident, $b: ident| $compute: expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, new)]
        pub struct $Op {
            pub auto_broadcast: AutoBroadcast,
        }

        impl $Op {
            pub fn compute<T: Arith>($a: T, $b: T) -> Option<T> {
                $compute
            }
        }

        impl Operation for $Op {
            fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
                infer_binary(ctx, self.auto_broadcast)
            }

            fn has_evaluate(&self) -> bool {
                true
            }

            fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
                let (a, b) = args_2!(inputs);
                fn eval_t<T: Arith>(a: &Tensor, b: &Tensor, ab: AutoBroadcast) -> GraftResult<Tensor> {
                    eval_binary::<T>(a, b, ab, $Op::compute::<T>)
                }
                let output = dispatch_numbers!(eval_t(a.element_type())(&a, &b, self.auto_broadcast))
                    .with_context(|| format!("Evaluating {}", stringify!($Op)))?;
                Ok(tvec!(output.into_arc_tensor()))
            }

            fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
                visitor.on_attribute("auto_broadcast", &self.auto_broadcast.as_attribute())
            }
        }
    };
}

bin_op!(Add, |a, b| Some(a.add(b)));
bin_op!(Subtract, |a, b| Some(a.sub(b)));
bin_op!(Multiply, |a, b| Some(a.mul(b)));
bin_op!(
    /// Integer division truncates, and fails on a zero divisor.
    Divide,
    |a, b| a.div(b)
);
bin_op!(Maximum, |a, b| Some(a.maxi(b)));
bin_op!(Minimum, |a, b| Some(a.mini(b)));
