//! The Value/Union type: a tagged scalar or array used
//! by the assembler to represent literals, symbol bindings, and the results
//! of expression evaluation. Each element kind carries its own wrapping
//! width for arithmetic.

extern crate alloc;

mod elem;
mod error;
mod ops;

pub use elem::{Elem, ElemKind};
pub use error::ValueError;

use alloc::vec::Vec;

/// An assembler atom: either invalid (unassigned), a single typed scalar, or
/// an ordered array of same-kind elements. A string literal is
/// functionally identical to an array of bytes, represented as
/// `Array { kind: ElemKind::Byte, is_string: true, .. }`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// No value has been assigned yet (e.g. an undeclared symbol).
    Invalid,
    /// A single typed scalar.
    Scalar(Elem),
    /// An ordered sequence of same-kind elements.
    Array {
        /// Element width/interpretation shared by every entry.
        kind: ElemKind,
        /// Whether this array originated from a string literal.
        is_string: bool,
        /// The elements, in order.
        elems: Vec<Elem>,
    },
}

impl Default for Value {
    fn default() -> Self {
        Value::Invalid
    }
}

impl Value {
    /// Construct a scalar value.
    pub fn scalar(elem: Elem) -> Self {
        Value::Scalar(elem)
    }

    /// Construct a `Long` scalar — the most common literal kind.
    pub fn long(v: u32) -> Self {
        Value::Scalar(Elem::Long(v))
    }

    /// Construct a cog/hub address pair, as produced when a label is bound
    /// during assembler pass 1.
    pub fn addr(cog: u32, hub: u32, hubmode: bool) -> Self {
        Value::Scalar(Elem::Addr { cog, hub, hubmode })
    }

    /// Construct a byte-array string value.
    pub fn string(bytes: Vec<u8>) -> Self {
        Value::Array {
            kind: ElemKind::Byte,
            is_string: true,
            elems: bytes.into_iter().map(Elem::Byte).collect(),
        }
    }

    /// The element kind of this value, if it has one (Invalid has none).
    pub fn kind(&self) -> Option<ElemKind> {
        match self {
            Value::Invalid => None,
            Value::Scalar(e) => Some(e.kind()),
            Value::Array { kind, .. } => Some(*kind),
        }
    }

    /// True if this value is an array (or string) rather than a scalar.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array { .. })
    }

    /// True if this value originated from a string literal.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::Array { is_string: true, .. })
    }

    /// Interpret this value as a single 32-bit word the way the assembler
    /// does when emitting an operand or an opcode field: scalars convert
    /// directly, single-element arrays unwrap, anything else is an error.
    pub fn as_u32(&self) -> Result<u32, ValueError> {
        match self {
            Value::Invalid => Ok(0),
            Value::Scalar(e) => Ok(e.as_u32()),
            Value::Array { elems, .. } if elems.len() == 1 => Ok(elems[0].as_u32()),
            Value::Array { .. } => Err(ValueError::InvalidOperand),
        }
    }

    /// Size in bytes: for arrays, the sum of each element's width; for a
    /// scalar, that element's width; `Invalid` has size zero.
    pub fn size_bytes(&self) -> usize {
        match self {
            Value::Invalid => 0,
            Value::Scalar(e) => e.kind().width_bytes(),
            Value::Array { elems, .. } => elems.iter().map(|e| e.kind().width_bytes()).sum(),
        }
    }

    /// `get_addr()`: for an `Addr` value, picks the cog or hub form
    /// depending on the `hubmode` bit. Non-address scalars
    /// return their plain 32-bit value; arrays are an error.
    pub fn get_addr(&self) -> Result<u32, ValueError> {
        match self {
            Value::Scalar(Elem::Addr { cog, hub, hubmode }) => {
                Ok(if *hubmode { *hub } else { *cog })
            }
            Value::Scalar(e) => Ok(e.as_u32()),
            Value::Invalid => Ok(0),
            Value::Array { .. } => Err(ValueError::InvalidOperand),
        }
    }

    /// Append `other` to this value: appending a scalar makes the result
    /// an array of that scalar's element width; appending an array is
    /// element-wise.
    pub fn concat(&self, other: &Value) -> Result<Value, ValueError> {
        ops::concat(self, other)
    }

    /// Pack this value (scalar or array) into a byte sequence at the given
    /// target element width. When `expand` is true, wider elements are
    /// serialized little-endian into the target width; when false, only
    /// the low byte/word/long of each element is taken.
    pub fn pack(&self, target: ElemKind, expand: bool) -> Result<Vec<u8>, ValueError> {
        ops::pack(self, target, expand)
    }
}

pub use ops::{decode_onehot, encode_msb, ones_count, reverse, seuss_forward, seuss_reverse};
pub use ops::{binary, unary, BinOp, UnOp};

#[cfg(all(test, feature = "std"))]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn long_arithmetic_closed_under_width(a: u32, b: u32) -> bool {
        let lhs = Value::long(a);
        let rhs = Value::long(b);
        let sum = binary(BinOp::Add, &lhs, &rhs).unwrap();
        let back = binary(BinOp::Sub, &sum, &rhs).unwrap();
        back.as_u32().unwrap() == a
    }

    #[quickcheck]
    fn get_addr_picks_hubmode_form(cog: u32, hub: u32) -> bool {
        Value::addr(cog, hub, false).get_addr().unwrap() == cog
            && Value::addr(cog, hub, true).get_addr().unwrap() == hub
    }
}
