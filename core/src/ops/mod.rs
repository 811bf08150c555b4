//! Ops
//!
//! The op set is closed: `Op` is an enum over every supported operation,
//! and `Operation` the single dispatch point for inference, evaluation and
//! attribute visiting.
use crate::internal::*;
use std::fmt;

pub mod array;
pub mod binary;
pub mod cast;
pub mod cond;
pub mod konst;
pub mod matmul;
pub mod memory;
pub mod quant;
pub mod sink;
pub mod source;
pub mod unary;

/// Behaviour shared by every operation.
pub trait Operation: fmt::Debug + Send + Sync {
    fn nb_outputs(&self) -> usize {
        1
    }

    /// Check the input descriptors and compute the output ones.
    ///
    /// Must be deterministic, and must not change anything but `ctx`.
    fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()>;

    fn has_evaluate(&self) -> bool {
        false
    }

    /// Reference evaluation on host tensors.
    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        let _ = inputs;
        bail!("No reference evaluation for {:?}", self)
    }

    /// False for ops reading or writing state outside of their inputs and
    /// outputs.
    fn is_stateless(&self) -> bool {
        true
    }

    fn can_constant_fold(&self) -> bool {
        self.has_evaluate() && self.is_stateless()
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        let _ = visitor;
        Ok(())
    }
}

/// Conversion between an op type and its `Op` variant.
pub trait OpVariant: Sized + Into<Op> {
    const KIND: OpKind;
    fn from_op(op: &Op) -> Option<&Self>;
    fn from_op_mut(op: &mut Op) -> Option<&mut Self>;
}

macro_rules! op_set {
    ($($variant: ident($ty: ty) = $type_name: literal in $opset: literal),* $(,)?) => {
        #[derive(Clone, Debug)]
        pub enum Op {
            $($variant($ty)),*
        }

        /// Operation identity: a type name within an opset.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OpKind {
            $($variant),*
        }

        impl OpKind {
            pub const ALL: &'static [OpKind] = &[$(OpKind::$variant),*];

            pub fn type_name(&self) -> &'static str {
                match self {
                    $(OpKind::$variant => $type_name),*
                }
            }

            pub fn opset(&self) -> &'static str {
                match self {
                    $(OpKind::$variant => $opset),*
                }
            }
        }

        impl Op {
            pub fn kind(&self) -> OpKind {
                match self {
                    $(Op::$variant(_) => OpKind::$variant),*
                }
            }

            pub fn operation(&self) -> &dyn Operation {
                match self {
                    $(Op::$variant(op) => op as &dyn Operation),*
                }
            }
        }

        $(
            impl OpVariant for $ty {
                const KIND: OpKind = OpKind::$variant;

                fn from_op(op: &Op) -> Option<&Self> {
                    if let Op::$variant(it) = op { Some(it) } else { None }
                }

                fn from_op_mut(op: &mut Op) -> Option<&mut Self> {
                    if let Op::$variant(it) = op { Some(it) } else { None }
                }
            }

            impl From<$ty> for Op {
                fn from(it: $ty) -> Op {
                    Op::$variant(it)
                }
            }
        )*
    };
}

op_set!(
    Parameter(source::Parameter) = "Parameter" in "opset1",
    Constant(konst::Constant) = "Constant" in "opset1",
    Result(sink::Result) = "Result" in "opset1",
    Add(binary::Add) = "Add" in "opset1",
    Subtract(binary::Subtract) = "Subtract" in "opset1",
    Multiply(binary::Multiply) = "Multiply" in "opset1",
    Divide(binary::Divide) = "Divide" in "opset1",
    Maximum(binary::Maximum) = "Maximum" in "opset1",
    Minimum(binary::Minimum) = "Minimum" in "opset1",
    Relu(unary::Relu) = "Relu" in "opset1",
    Convert(cast::Convert) = "Convert" in "opset1",
    Reshape(array::Reshape) = "Reshape" in "opset1",
    ShapeOf(array::ShapeOf) = "ShapeOf" in "opset3",
    Concat(array::Concat) = "Concat" in "opset1",
    Slice(array::Slice) = "Slice" in "opset8",
    Reverse(array::Reverse) = "Reverse" in "opset1",
    FakeQuantize(quant::FakeQuantize) = "FakeQuantize" in "opset1",
    MatMul(matmul::MatMul) = "MatMul" in "opset1",
    ReadValue(memory::ReadValue) = "ReadValue" in "opset6",
    Assign(memory::Assign) = "Assign" in "opset6",
    If(cond::If) = "If" in "opset8",
);

impl Op {
    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    pub fn nb_outputs(&self) -> usize {
        self.operation().nb_outputs()
    }

    pub fn validate_and_infer_types(&self, ctx: &mut InferenceContext) -> GraftResult<()> {
        self.operation().validate_and_infer_types(ctx)
    }

    pub fn has_evaluate(&self) -> bool {
        self.operation().has_evaluate()
    }

    pub fn eval(&self, inputs: TVec<Arc<Tensor>>) -> GraftResult<TVec<Arc<Tensor>>> {
        self.operation().eval(inputs)
    }

    pub fn is_stateless(&self) -> bool {
        self.operation().is_stateless()
    }

    pub fn can_constant_fold(&self) -> bool {
        self.operation().can_constant_fold()
    }

    pub fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
        self.operation().visit_attributes(visitor)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.type_name())
    }
}

/// How element-wise operations align the shapes of their inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AutoBroadcast {
    /// shapes must match exactly
    None,
    /// numpy rules: right aligned, 1 stretches
    #[default]
    Numpy,
}

impl AutoBroadcast {
    /// Merge `b` into `a`, None if the shapes can not be aligned.
    pub fn merge(&self, a: &PartialShape, b: &PartialShape) -> Option<PartialShape> {
        match self {
            AutoBroadcast::None => PartialShape::merge(a, b),
            AutoBroadcast::Numpy => PartialShape::broadcast_merge(a, b),
        }
    }

    pub fn as_attribute(&self) -> AttributeValue {
        AttributeValue::String(self.to_string())
    }
}

impl fmt::Display for AutoBroadcast {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AutoBroadcast::None => write!(fmt, "none"),
            AutoBroadcast::Numpy => write!(fmt, "numpy"),
        }
    }
}

/// Broadcast every input to the numpy-broadcast shape of all of them.
pub(crate) fn broadcast_shape(shapes: &[&[usize]]) -> GraftResult<TVec<usize>> {
    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut shape: TVec<usize> = tvec!(1; rank);
    for s in shapes {
        for (ix, &d) in s.iter().enumerate() {
            let target = &mut shape[rank - s.len() + ix];
            if *target == 1 {
                *target = d;
            } else if d != 1 && d != *target {
                bail!("Can not broadcast shapes {:?}", shapes);
            }
        }
    }
    Ok(shape)
}

/// Normalize a possibly negative axis against `rank`.
pub(crate) fn normalize_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = rank as i64;
    let axis = if axis < 0 { axis + rank } else { axis };
    (0..rank).contains(&axis).then_some(axis as usize)
}
