//! Element types and the `Datum` trait tying them to Rust scalar types.
use crate::tensor::TensorData;
use half::f16;
use ndarray::ArrayD;
use std::fmt;

/// Scalar kind of the elements of a tensor.
///
/// `Dynamic` is the "not known yet" sentinel used during shape and type
/// inference. It merges with any other element type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub enum ElementType {
    #[default]
    Dynamic,
    Boolean,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
}

impl ElementType {
    pub const ALL_STATIC: [ElementType; 12] = [
        ElementType::Boolean,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
        ElementType::F16,
        ElementType::F32,
        ElementType::F64,
    ];

    pub fn bitwidth(&self) -> usize {
        use ElementType::*;
        match self {
            Dynamic => 0,
            Boolean | I8 | U8 => 8,
            I16 | U16 | F16 => 16,
            I32 | U32 | F32 => 32,
            I64 | U64 | F64 => 64,
        }
    }

    pub fn size_of(&self) -> usize {
        self.bitwidth() / 8
    }

    pub fn is_static(&self) -> bool {
        *self != ElementType::Dynamic
    }

    pub fn is_dynamic(&self) -> bool {
        *self == ElementType::Dynamic
    }

    pub fn is_real(&self) -> bool {
        matches!(self, ElementType::F16 | ElementType::F32 | ElementType::F64)
    }

    /// Integral types, booleans included.
    pub fn is_integral(&self) -> bool {
        self.is_static() && !self.is_real()
    }

    pub fn is_integral_number(&self) -> bool {
        self.is_integral() && *self != ElementType::Boolean
    }

    pub fn is_signed(&self) -> bool {
        use ElementType::*;
        matches!(self, I8 | I16 | I32 | I64 | F16 | F32 | F64)
    }

    pub fn compatible(&self, other: &ElementType) -> bool {
        self.is_dynamic() || other.is_dynamic() || self == other
    }

    /// Most specific element type compatible with both, or None if they
    /// provably differ.
    pub fn merge(a: ElementType, b: ElementType) -> Option<ElementType> {
        if a.is_dynamic() {
            Some(b)
        } else if b.is_dynamic() || a == b {
            Some(a)
        } else {
            None
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use ElementType::*;
        let s = match self {
            Dynamic => "dynamic",
            Boolean => "boolean",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            F16 => "f16",
            F32 => "f32",
            F64 => "f64",
        };
        write!(fmt, "{s}")
    }
}

impl std::str::FromStr for ElementType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<ElementType> {
        if s == "dynamic" || s == "undefined" {
            return Ok(ElementType::Dynamic);
        }
        ElementType::ALL_STATIC
            .iter()
            .copied()
            .find(|et| et.to_string() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown element type {s}"))
    }
}

/// A Rust scalar type that can be stored in a `Tensor`.
pub trait Datum:
    Clone + Copy + Send + Sync + fmt::Debug + fmt::Display + Default + PartialEq + PartialOrd + 'static
{
    fn name() -> &'static str;
    fn element_type() -> ElementType;

    fn wrap(array: ArrayD<Self>) -> TensorData;
    fn view(data: &TensorData) -> Option<&ArrayD<Self>>;
    fn view_mut(data: &mut TensorData) -> Option<&mut ArrayD<Self>>;

    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
    fn to_i64(self) -> i64;
    fn from_i64(v: i64) -> Self;

    /// Conversion used by `Convert` and `Tensor::cast_to`. Integer to integer
    /// goes through i64, everything else through f64.
    fn cast_from<T: Datum>(v: T) -> Self {
        if Self::element_type().is_integral() && T::element_type().is_integral() {
            Self::from_i64(v.to_i64())
        } else {
            Self::from_f64(v.to_f64())
        }
    }
}

/// Arithmetic used by the reference evaluation of elementwise ops.
///
/// Integers wrap on overflow and refuse division by zero.
pub trait Arith: Datum {
    fn zero() -> Self;
    fn one() -> Self;
    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
    fn mul(self, other: Self) -> Self;
    fn div(self, other: Self) -> Option<Self>;
    fn round_half_even(self) -> Self;
    fn maxi(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }
    fn mini(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }
}

macro_rules! datum {
    ($t:ty, $v:ident) => {
        impl Datum for $t {
            fn name() -> &'static str {
                stringify!($t)
            }

            fn element_type() -> ElementType {
                ElementType::$v
            }

            fn wrap(array: ArrayD<Self>) -> TensorData {
                TensorData::$v(array)
            }

            fn view(data: &TensorData) -> Option<&ArrayD<Self>> {
                if let TensorData::$v(it) = data { Some(it) } else { None }
            }

            fn view_mut(data: &mut TensorData) -> Option<&mut ArrayD<Self>> {
                if let TensorData::$v(it) = data { Some(it) } else { None }
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $t
            }

            fn to_i64(self) -> i64 {
                self as i64
            }

            fn from_i64(v: i64) -> Self {
                v as $t
            }
        }
    };
}

datum!(i8, I8);
datum!(i16, I16);
datum!(i32, I32);
datum!(i64, I64);
datum!(u8, U8);
datum!(u16, U16);
datum!(u32, U32);
datum!(u64, U64);
datum!(f32, F32);
datum!(f64, F64);

impl Datum for bool {
    fn name() -> &'static str {
        "bool"
    }

    fn element_type() -> ElementType {
        ElementType::Boolean
    }

    fn wrap(array: ArrayD<Self>) -> TensorData {
        TensorData::Boolean(array)
    }

    fn view(data: &TensorData) -> Option<&ArrayD<Self>> {
        if let TensorData::Boolean(it) = data { Some(it) } else { None }
    }

    fn view_mut(data: &mut TensorData) -> Option<&mut ArrayD<Self>> {
        if let TensorData::Boolean(it) = data { Some(it) } else { None }
    }

    fn to_f64(self) -> f64 {
        self as u8 as f64
    }

    fn from_f64(v: f64) -> Self {
        v != 0.0
    }

    fn to_i64(self) -> i64 {
        self as i64
    }

    fn from_i64(v: i64) -> Self {
        v != 0
    }
}

impl Datum for f16 {
    fn name() -> &'static str {
        "f16"
    }

    fn element_type() -> ElementType {
        ElementType::F16
    }

    fn wrap(array: ArrayD<Self>) -> TensorData {
        TensorData::F16(array)
    }

    fn view(data: &TensorData) -> Option<&ArrayD<Self>> {
        if let TensorData::F16(it) = data { Some(it) } else { None }
    }

    fn view_mut(data: &mut TensorData) -> Option<&mut ArrayD<Self>> {
        if let TensorData::F16(it) = data { Some(it) } else { None }
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }

    fn to_i64(self) -> i64 {
        f16::to_f64(self) as i64
    }

    fn from_i64(v: i64) -> Self {
        f16::from_f64(v as f64)
    }
}

macro_rules! arith_int {
    ($($t:ty),*) => { $(
        impl Arith for $t {
            fn zero() -> Self { num_traits::Zero::zero() }
            fn one() -> Self { num_traits::One::one() }
            fn add(self, other: Self) -> Self { self.wrapping_add(other) }
            fn sub(self, other: Self) -> Self { self.wrapping_sub(other) }
            fn mul(self, other: Self) -> Self { self.wrapping_mul(other) }
            fn div(self, other: Self) -> Option<Self> { self.checked_div(other) }
            fn round_half_even(self) -> Self { self }
        }
    )* }
}

arith_int!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! arith_float {
    ($($t:ty),*) => { $(
        impl Arith for $t {
            fn zero() -> Self { num_traits::Zero::zero() }
            fn one() -> Self { num_traits::One::one() }
            fn add(self, other: Self) -> Self { self + other }
            fn sub(self, other: Self) -> Self { self - other }
            fn mul(self, other: Self) -> Self { self * other }
            fn div(self, other: Self) -> Option<Self> { Some(self / other) }
            fn round_half_even(self) -> Self { self.round_ties_even() }
        }
    )* }
}

arith_float!(f32, f64);

impl Arith for f16 {
    fn zero() -> Self {
        num_traits::Zero::zero()
    }
    fn one() -> Self {
        num_traits::One::one()
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn sub(self, other: Self) -> Self {
        self - other
    }
    fn mul(self, other: Self) -> Self {
        self * other
    }
    fn div(self, other: Self) -> Option<Self> {
        Some(self / other)
    }
    fn round_half_even(self) -> Self {
        f16::from_f32(self.to_f32().round_ties_even())
    }
}
