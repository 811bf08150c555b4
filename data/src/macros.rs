#[macro_export]
macro_rules! tvec {
    // count helper: transform any expression into 1
    (@one $x:expr) => (1usize);
    ($elem:expr; $n:expr) => ({
        $crate::TVec::from_elem($elem, $n)
    });
    ($($x:expr),*$(,)*) => ({
        let count = 0usize $(+ tvec!(@one $x))*;
        #[allow(unused_mut)]
        let mut vec = $crate::TVec::new();
        if count <= vec.inline_size() {
            $(vec.push($x);)*
            vec
        } else {
            $crate::TVec::from_vec(vec![$($x,)*])
        }
    });
}

#[macro_export]
macro_rules! dispatch_datum {
    ($($path:ident)::* ($dt:expr) ($($args:expr),*)) => { {
        use $crate::prelude::ElementType;
        match $dt {
            ElementType::Boolean => $($path)::*::<bool>($($args),*),
            ElementType::U8   => $($path)::*::<u8>($($args),*),
            ElementType::U16  => $($path)::*::<u16>($($args),*),
            ElementType::U32  => $($path)::*::<u32>($($args),*),
            ElementType::U64  => $($path)::*::<u64>($($args),*),
            ElementType::I8   => $($path)::*::<i8>($($args),*),
            ElementType::I16  => $($path)::*::<i16>($($args),*),
            ElementType::I32  => $($path)::*::<i32>($($args),*),
            ElementType::I64  => $($path)::*::<i64>($($args),*),
            ElementType::F16  => $($path)::*::<$crate::prelude::f16>($($args),*),
            ElementType::F32  => $($path)::*::<f32>($($args),*),
            ElementType::F64  => $($path)::*::<f64>($($args),*),
            ElementType::Dynamic => $crate::anyhow::bail!("No concrete type for dynamic element type"),
        }
    } }
}

/// Like `dispatch_datum!`, but restricted to types supporting `Arith`
/// (everything but booleans).
#[macro_export]
macro_rules! dispatch_numbers {
    ($($path:ident)::* ($dt:expr) ($($args:expr),*)) => { {
        use $crate::prelude::ElementType;
        match $dt {
            ElementType::U8   => $($path)::*::<u8>($($args),*),
            ElementType::U16  => $($path)::*::<u16>($($args),*),
            ElementType::U32  => $($path)::*::<u32>($($args),*),
            ElementType::U64  => $($path)::*::<u64>($($args),*),
            ElementType::I8   => $($path)::*::<i8>($($args),*),
            ElementType::I16  => $($path)::*::<i16>($($args),*),
            ElementType::I32  => $($path)::*::<i32>($($args),*),
            ElementType::I64  => $($path)::*::<i64>($($args),*),
            ElementType::F16  => $($path)::*::<$crate::prelude::f16>($($args),*),
            ElementType::F32  => $($path)::*::<f32>($($args),*),
            ElementType::F64  => $($path)::*::<f64>($($args),*),
            _ => $crate::anyhow::bail!("{:?} is not a number type", $dt)
        }
    } }
}

#[macro_export]
macro_rules! dispatch_floatlike {
    ($($path:ident)::* ($dt:expr) ($($args:expr),*)) => { {
        use $crate::prelude::ElementType;
        match $dt {
            ElementType::F16  => $($path)::*::<$crate::prelude::f16>($($args),*),
            ElementType::F32  => $($path)::*::<f32>($($args),*),
            ElementType::F64  => $($path)::*::<f64>($($args),*),
            _ => $crate::anyhow::bail!("{:?} is not float-like", $dt)
        }
    } }
}
