//! Op attributes, exposed to serializers and dumps through a visitor.
use crate::internal::*;
use graft_data::itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute of an operation, or a runtime info value.
#[derive(Clone, Debug)]
pub enum AttributeValue {
    Bool(bool),
    String(String),
    I64(i64),
    F64(f64),
    VecI64(Vec<i64>),
    VecF64(Vec<f64>),
    VecString(Vec<String>),
    ElementType(ElementType),
    Shape(PartialShape),
    /// A nested body, as held by control flow ops.
    Function(Arc<Function>),
    /// Raw tensor content, as held by `Constant`.
    Buffer(Arc<Tensor>),
}

impl AttributeValue {
    pub fn as_i64(&self) -> Option<i64> {
        if let AttributeValue::I64(v) = self { Some(*v) } else { None }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let AttributeValue::String(s) = self { Some(s) } else { None }
    }

    pub fn as_function(&self) -> Option<&Arc<Function>> {
        if let AttributeValue::Function(f) = self { Some(f) } else { None }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &AttributeValue) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (String(a), String(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (F64(a), F64(b)) => a == b,
            (VecI64(a), VecI64(b)) => a == b,
            (VecF64(a), VecF64(b)) => a == b,
            (VecString(a), VecString(b)) => a == b,
            (ElementType(a), ElementType(b)) => a == b,
            (Shape(a), Shape(b)) => a == b,
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            (Buffer(a), Buffer(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        use AttributeValue::*;
        match self {
            Bool(b) => write!(fmt, "{b}"),
            String(s) => write!(fmt, "{s:?}"),
            I64(v) => write!(fmt, "{v}"),
            F64(v) => write!(fmt, "{v}"),
            VecI64(v) => write!(fmt, "[{}]", v.iter().join(",")),
            VecF64(v) => write!(fmt, "[{}]", v.iter().join(",")),
            VecString(v) => write!(fmt, "[{}]", v.iter().map(|s| format!("{s:?}")).join(",")),
            ElementType(et) => write!(fmt, "{et}"),
            Shape(s) => write!(fmt, "{s}"),
            Function(f) => write!(fmt, "<function {} ({} nodes)>", f.name, f.nodes().len()),
            Buffer(t) => write!(fmt, "{}", t.dump(false)),
        }
    }
}

/// Receives the attributes of an operation, one at a time, in declaration
/// order.
pub trait AttributeVisitor {
    fn on_attribute(&mut self, name: &str, value: &AttributeValue) -> GraftResult<()>;
}

/// Walk every attribute of `op`.
pub fn visit_attributes(op: &Op, visitor: &mut dyn AttributeVisitor) -> GraftResult<()> {
    op.visit_attributes(visitor)
}

/// Renders attributes to strings, for graph dumps.
#[derive(Clone, Debug, Default)]
pub struct AttributeDump {
    pub values: BTreeMap<String, String>,
}

impl AttributeVisitor for AttributeDump {
    fn on_attribute(&mut self, name: &str, value: &AttributeValue) -> GraftResult<()> {
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

impl fmt::Display for AttributeDump {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.values.iter().map(|(k, v)| format!("{k}={v}")).join(" "))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::array::Slice;
    use crate::ops::quant::FakeQuantize;

    #[derive(Default)]
    struct Collect(Vec<(String, AttributeValue)>);

    impl AttributeVisitor for Collect {
        fn on_attribute(&mut self, name: &str, value: &AttributeValue) -> GraftResult<()> {
            self.0.push((name.to_string(), value.clone()));
            Ok(())
        }
    }

    #[test]
    fn fake_quantize_attributes() {
        let op: Op = FakeQuantize::new(255, AutoBroadcast::Numpy).into();
        let mut collect = Collect::default();
        visit_attributes(&op, &mut collect).unwrap();
        assert_eq!(collect.0[0], ("levels".to_string(), AttributeValue::I64(255)));
        assert_eq!(collect.0[1], ("auto_broadcast".to_string(), AttributeValue::String("numpy".into())));
    }

    #[test]
    fn dump() {
        let mut dump = AttributeDump::default();
        visit_attributes(&Slice.into(), &mut dump).unwrap();
        assert!(dump.values.is_empty());
        let mut dump = AttributeDump::default();
        visit_attributes(&FakeQuantize::new(3, AutoBroadcast::None).into(), &mut dump).unwrap();
        assert_eq!(dump.to_string(), "auto_broadcast=\"none\" levels=3");
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = Arc::new(Function::new("body"));
        let g = Arc::new(Function::new("body"));
        assert_eq!(AttributeValue::Function(f.clone()), AttributeValue::Function(f.clone()));
        assert_ne!(AttributeValue::Function(f), AttributeValue::Function(g));
    }
}
