//! `Tensor`, concrete dense values flowing through a graph.
use crate::datum::{Datum, ElementType};
use crate::TVec;
use anyhow::{bail, Context};
use half::f16;
use ndarray::prelude::*;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

pub mod litteral;

/// Storage of a `Tensor`, one variant per static element type.
#[derive(Clone, PartialEq)]
pub enum TensorData {
    Boolean(ArrayD<bool>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    F16(ArrayD<f16>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

macro_rules! with_array {
    ($data: expr, $it: ident => $body: expr) => {
        match $data {
            TensorData::Boolean($it) => $body,
            TensorData::I8($it) => $body,
            TensorData::I16($it) => $body,
            TensorData::I32($it) => $body,
            TensorData::I64($it) => $body,
            TensorData::U8($it) => $body,
            TensorData::U16($it) => $body,
            TensorData::U32($it) => $body,
            TensorData::U64($it) => $body,
            TensorData::F16($it) => $body,
            TensorData::F32($it) => $body,
            TensorData::F64($it) => $body,
        }
    };
}

/// A dense tensor of one of the static element types.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    data: TensorData,
}

impl Tensor {
    /// Build a tensor from a shape and a flat, row-major, buffer.
    pub fn from_shape<T: Datum>(shape: &[usize], data: &[T]) -> anyhow::Result<Tensor> {
        let array = ArrayD::from_shape_vec(shape, data.to_vec())
            .with_context(|| format!("Building a {shape:?} tensor from {} values", data.len()))?;
        Ok(array.into())
    }

    pub fn zero<T: Datum>(shape: &[usize]) -> Tensor {
        ArrayD::<T>::default(shape).into()
    }

    pub fn zero_dt(et: ElementType, shape: &[usize]) -> anyhow::Result<Tensor> {
        fn zero<T: Datum>(shape: &[usize]) -> anyhow::Result<Tensor> {
            Ok(Tensor::zero::<T>(shape))
        }
        dispatch_datum!(zero(et)(shape))
    }

    pub fn element_type(&self) -> ElementType {
        with_array!(&self.data, it => element_type_of(it))
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(&self.data, it => it.shape())
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_array<T: Datum>(self) -> anyhow::Result<ArrayD<T>> {
        let et = self.element_type();
        let mut data = self.data;
        match T::view_mut(&mut data) {
            Some(array) => Ok(std::mem::take(array)),
            None => bail!("Tensor is {}, accessed as {}", et, T::element_type()),
        }
    }

    pub fn to_array_view<T: Datum>(&self) -> anyhow::Result<ArrayViewD<'_, T>> {
        T::view(&self.data).map(|a| a.view()).with_context(|| {
            format!("Tensor is {}, accessed as {}", self.element_type(), T::element_type())
        })
    }

    pub fn to_array_view_mut<T: Datum>(&mut self) -> anyhow::Result<ArrayViewMutD<'_, T>> {
        let et = self.element_type();
        T::view_mut(&mut self.data)
            .map(|a| a.view_mut())
            .with_context(|| format!("Tensor is {}, accessed as {}", et, T::element_type()))
    }

    pub fn as_slice<T: Datum>(&self) -> anyhow::Result<&[T]> {
        let view = T::view(&self.data).with_context(|| {
            format!("Tensor is {}, accessed as {}", self.element_type(), T::element_type())
        })?;
        view.as_slice().context("Tensor is not in standard layout")
    }

    pub fn to_scalar<T: Datum>(&self) -> anyhow::Result<T> {
        if self.len() != 1 {
            bail!("to_scalar called on a tensor of shape {:?}", self.shape());
        }
        Ok(self.as_slice::<T>()?[0])
    }

    /// Flat values, converted to i64.
    pub fn as_i64s(&self) -> Vec<i64> {
        with_array!(&self.data, it => it.iter().map(|x| x.to_i64()).collect())
    }

    /// Flat values, converted to f64.
    pub fn as_f64s(&self) -> Vec<f64> {
        with_array!(&self.data, it => it.iter().map(|x| x.to_f64()).collect())
    }

    pub fn cast_to<T: Datum>(&self) -> anyhow::Result<Cow<'_, Tensor>> {
        self.cast_to_dt(T::element_type())
    }

    pub fn cast_to_dt(&self, et: ElementType) -> anyhow::Result<Cow<'_, Tensor>> {
        if self.element_type() == et {
            return Ok(Cow::Borrowed(self));
        }
        fn cast<D: Datum>(t: &Tensor) -> anyhow::Result<Tensor> {
            Ok(with_array!(&t.data, it => Tensor::from(it.mapv(D::cast_from))))
        }
        Ok(Cow::Owned(dispatch_datum!(cast(et)(self))?))
    }

    /// True if every element has the same value.
    pub fn is_uniform(&self) -> bool {
        with_array!(&self.data, it => {
            let mut values = it.iter();
            match values.next() {
                Some(first) => values.all(|x| x == first),
                None => true,
            }
        })
    }

    /// Reshape, keeping the elements in row-major order.
    pub fn into_shape(self, shape: &[usize]) -> anyhow::Result<Tensor> {
        if self.len() != shape.iter().product::<usize>() {
            bail!("Can not reshape {:?} to {:?}", self.shape(), shape);
        }
        Ok(with_array!(self.data, it => {
            let flat: Vec<_> = it.iter().copied().collect();
            Tensor::from(ArrayD::from_shape_vec(shape, flat)?)
        }))
    }

    /// Prepend axes of length 1 until reaching `rank`.
    pub fn broadcast_into_rank(self, rank: usize) -> anyhow::Result<Tensor> {
        if self.rank() > rank {
            bail!("Tensor of rank {} can not be broadcast to rank {}", self.rank(), rank);
        }
        let mut shape: TVec<usize> = std::iter::repeat_n(1, rank - self.rank()).collect();
        shape.extend(self.shape().iter().copied());
        self.into_shape(&shape)
    }

    /// Element-wise comparison, with a tolerance on float types.
    pub fn close_enough(&self, other: &Tensor, approx: bool) -> anyhow::Result<()> {
        if self.shape() != other.shape() {
            bail!("Shape mismatch {:?} != {:?}", self.shape(), other.shape());
        }
        if self.element_type() != other.element_type() {
            bail!("Type mismatch {} != {}", self.element_type(), other.element_type());
        }
        if approx && self.element_type().is_real() {
            let (a, b) = (self.as_f64s(), other.as_f64s());
            for (ix, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                if (x - y).abs() > 1e-4 + 1e-4 * y.abs() {
                    bail!("Mismatch at {ix}: {x} != {y}");
                }
            }
            Ok(())
        } else if self != other {
            bail!("Mismatch: {:?} != {:?}", self, other)
        } else {
            Ok(())
        }
    }

    pub fn dump(&self, force_full: bool) -> String {
        let values = with_array!(&self.data, it => {
            if force_full || it.len() <= 12 {
                it.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(", ")
            } else {
                let head = it.iter().take(12).map(|x| x.to_string()).collect::<Vec<_>>();
                format!("{}, ...", head.join(", "))
            }
        });
        let shape = self.shape().iter().map(|d| d.to_string()).collect::<Vec<_>>();
        format!("{},{} {}", shape.join(","), self.element_type(), values)
    }
}

fn element_type_of<T: Datum>(_: &ArrayD<T>) -> ElementType {
    T::element_type()
}

impl fmt::Debug for Tensor {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.dump(false))
    }
}

impl<T: Datum> From<ArrayD<T>> for Tensor {
    fn from(array: ArrayD<T>) -> Tensor {
        Tensor { data: T::wrap(array) }
    }
}

impl<T: Datum> From<T> for Tensor {
    fn from(scalar: T) -> Tensor {
        ArrayD::from_elem(IxDyn(&[]), scalar).into()
    }
}

pub trait IntoTensor: Sized {
    fn into_tensor(self) -> Tensor;
}

pub trait IntoArcTensor: Sized {
    fn into_arc_tensor(self) -> Arc<Tensor>;
}

impl<D: ::ndarray::Dimension, T: Datum> IntoTensor for Array<T, D> {
    fn into_tensor(self) -> Tensor {
        Tensor::from(self.into_dyn())
    }
}

impl IntoTensor for Tensor {
    fn into_tensor(self) -> Tensor {
        self
    }
}

impl<T: IntoTensor> IntoArcTensor for T {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self.into_tensor())
    }
}

impl IntoArcTensor for Arc<Tensor> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        self
    }
}
