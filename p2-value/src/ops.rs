//! Arithmetic, logic, bit-manipulation and concatenation/packing
//! operations for [`Value`](crate::Value).

use alloc::vec::Vec;

use crate::{Elem, ElemKind, Value, ValueError};

/// Binary operators recognized by the expression evaluator. Result width/type is always that of the left-hand operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// `~`: complement all bits to the operand's width.
    Not,
    /// `-`: negate modulo the operand's width.
    Neg,
    /// `>|`: bit-encode, the 0-based index of the highest set bit.
    Encode,
    /// `|<`: bit-decode, `1 << val`.
    Decode,
    /// Population count.
    Ones,
}

fn mask_for(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Evaluate a binary operator on two scalar values, per the left operand's
/// element type. Arrays are rejected with `InvalidOperand` except as the
/// right operand of concatenation (see [`concat`]).
pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let lk = lhs.kind().ok_or(ValueError::InvalidOperand)?;
    let l = scalar_of(lhs)?;
    let r = scalar_of(rhs)?;

    if lk == ElemKind::Real {
        return real_binary(op, l.as_f64(), r.as_f64()).map(|v| Value::Scalar(Elem::Real(v)));
    }

    let bits = lk.width_bits();
    let mask = mask_for(bits);
    let a = l.as_u64() & mask;
    let b = r.as_u64() & mask;

    let result = match op {
        BinOp::Add => a.wrapping_add(b) & mask,
        BinOp::Sub => a.wrapping_sub(b) & mask,
        BinOp::Mul => a.wrapping_mul(b) & mask,
        BinOp::Div => {
            if b == 0 {
                a
            } else {
                a / b
            }
        }
        BinOp::Mod => {
            if b == 0 {
                a
            } else {
                a % b
            }
        }
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl => (a.wrapping_shl(b as u32)) & mask,
        BinOp::Shr => a.wrapping_shr(b as u32) & mask,
        BinOp::Eq => (a == b) as u64,
        BinOp::Ne => (a != b) as u64,
        BinOp::Lt => (a < b) as u64,
        BinOp::Le => (a <= b) as u64,
        BinOp::Gt => (a > b) as u64,
        BinOp::Ge => (a >= b) as u64,
        BinOp::LogAnd => ((a != 0) && (b != 0)) as u64,
        BinOp::LogOr => ((a != 0) || (b != 0)) as u64,
    };

    Ok(Value::Scalar(Elem::from_u64(lk, result)))
}

fn real_binary(op: BinOp, a: f64, b: f64) -> Result<f64, ValueError> {
    const FUZZY_ZERO: f64 = 1.0e-12;
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b.abs() < FUZZY_ZERO {
                a
            } else {
                a / b
            }
        }
        BinOp::Mod => {
            if b.abs() < FUZZY_ZERO {
                a
            } else {
                a % b
            }
        }
        BinOp::Eq => ((a - b).abs() < FUZZY_ZERO) as u8 as f64,
        BinOp::Ne => ((a - b).abs() >= FUZZY_ZERO) as u8 as f64,
        BinOp::Lt => (a < b) as u8 as f64,
        BinOp::Le => (a <= b) as u8 as f64,
        BinOp::Gt => (a > b) as u8 as f64,
        BinOp::Ge => (a >= b) as u8 as f64,
        BinOp::LogAnd => ((a != 0.0) && (b != 0.0)) as u8 as f64,
        BinOp::LogOr => ((a != 0.0) || (b != 0.0)) as u8 as f64,
        BinOp::And | BinOp::Or | BinOp::Xor | BinOp::Shl | BinOp::Shr => {
            return Err(ValueError::InvalidOperand)
        }
    };
    Ok(result)
}

/// Evaluate a unary operator on a scalar value.
pub fn unary(op: UnOp, val: &Value) -> Result<Value, ValueError> {
    let kind = val.kind().ok_or(ValueError::InvalidOperand)?;

    if let Value::Array {
        is_string: true,
        elems,
        ..
    } = val
    {
        if op == UnOp::Neg {
            return Ok(negate_string(elems));
        }
    }

    let elem = scalar_of(val)?;

    match op {
        UnOp::Not => {
            if kind == ElemKind::Real {
                return Err(ValueError::InvalidOperand);
            }
            let mask = mask_for(kind.width_bits());
            Ok(Value::Scalar(Elem::from_u64(kind, !elem.as_u64() & mask)))
        }
        UnOp::Neg => {
            if kind == ElemKind::Real {
                return Ok(Value::Scalar(Elem::Real(-elem.as_f64())));
            }
            let mask = mask_for(kind.width_bits());
            Ok(Value::Scalar(Elem::from_u64(
                kind,
                elem.as_u64().wrapping_neg() & mask,
            )))
        }
        UnOp::Encode => Ok(Value::Scalar(Elem::from_u64(
            kind,
            encode_msb(elem.as_u64()) as u64,
        ))),
        UnOp::Decode => Ok(Value::Scalar(Elem::from_u64(
            kind,
            decode_onehot(elem.as_u32() & 63),
        ))),
        UnOp::Ones => Ok(Value::Scalar(Elem::from_u64(
            kind,
            ones_count(elem.as_u64()) as u64,
        ))),
    }
}

fn negate_string(elems: &[Elem]) -> Value {
    let mut bytes: Vec<u8> = elems.iter().map(|e| !e.as_u32() as u8).collect();
    for b in bytes.iter_mut().rev() {
        let (next, carry) = b.overflowing_add(1);
        *b = next;
        if !carry {
            break;
        }
    }
    Value::string(bytes)
}

fn scalar_of(val: &Value) -> Result<Elem, ValueError> {
    match val {
        Value::Invalid => Ok(Elem::Long(0)),
        Value::Scalar(e) => Ok(*e),
        Value::Array { elems, .. } if elems.len() == 1 => Ok(elems[0]),
        Value::Array { .. } => Err(ValueError::InvalidOperand),
    }
}

/// Reverse the low `bits` bits of `val`. Grounded in
/// `P2Util::reverse`'s divide-and-conquer bit-swap, generalized to an
/// arbitrary bit count via a right-shift after a full 64-bit reversal.
pub fn reverse(val: u64, bits: u32) -> u64 {
    let mut v = val;
    v = ((v & 0xaaaaaaaaaaaaaaaa) >> 1) | ((v & 0x5555555555555555) << 1);
    v = ((v & 0xcccccccccccccccc) >> 2) | ((v & 0x3333333333333333) << 2);
    v = ((v & 0xf0f0f0f0f0f0f0f0) >> 4) | ((v & 0x0f0f0f0f0f0f0f0f) << 4);
    v = ((v & 0xff00ff00ff00ff00) >> 8) | ((v & 0x00ff00ff00ff00ff) << 8);
    v = ((v & 0xffff0000ffff0000) >> 16) | ((v & 0x0000ffff0000ffff) << 16);
    v = (v >> 32) | (v << 32);
    if bits >= 64 {
        v
    } else {
        v >> (64 - bits)
    }
}

/// `decode(x) = 1 << x`. Zero-based: `decode(0) == 1`.
pub fn decode_onehot(x: u32) -> u64 {
    if x >= 64 {
        0
    } else {
        1u64 << x
    }
}

/// Zero-based index of the highest set bit, or 0 for an input of 0.
///
/// The spec's prose describes a 1-based index, but the closure property
/// `encode(decode(x)) == x` for `decode(x) = 1 << x` only holds with a
/// 0-based definition, so that is what this implements; see DESIGN.md.
pub fn encode_msb(val: u64) -> u32 {
    if val == 0 {
        0
    } else {
        63 - val.leading_zeros()
    }
}

/// Population count.
pub fn ones_count(val: u64) -> u32 {
    val.count_ones()
}

const SEUSS_BITS: [u8; 32] = [
    11, 5, 18, 24, 27, 19, 20, 30, 28, 26, 21, 25, 3, 8, 7, 23, 13, 12, 16, 2, 15, 1, 9, 31, 0, 29,
    17, 10, 14, 4, 6, 22,
];

/// Forward seuss bit-scramble (the `SEUSSF` instruction's function),
/// grounded in `P2Util::seuss(val, true)`.
pub fn seuss_forward(val: u32) -> u32 {
    let mut result = 0x354dae51u32;
    for (i, &b) in SEUSS_BITS.iter().enumerate() {
        if val & (1u32 << i) != 0 {
            result ^= 1u32 << b;
        }
    }
    result
}

/// Reverse seuss bit-scramble (the `SEUSSR` instruction's function),
/// grounded in `P2Util::seuss(val, false)`. Mutually inverse with
/// [`seuss_forward`].
pub fn seuss_reverse(val: u32) -> u32 {
    let mut result = 0xeb55032du32;
    for (i, &b) in SEUSS_BITS.iter().enumerate() {
        if val & (1u32 << b) != 0 {
            result ^= 1u32 << i;
        }
    }
    result
}

/// Concatenate `other` onto `self`: appending a scalar
/// produces a one-element-longer array at that scalar's width; appending
/// an array is element-wise.
pub fn concat(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let mut elems = match lhs {
        Value::Invalid => Vec::new(),
        Value::Scalar(e) => alloc::vec![*e],
        Value::Array { elems, .. } => elems.clone(),
    };
    let kind = lhs.kind().or_else(|| rhs.kind());
    let is_string = lhs.is_string() && rhs.is_string();

    match rhs {
        Value::Invalid => {}
        Value::Scalar(e) => elems.push(*e),
        Value::Array { elems: more, .. } => elems.extend_from_slice(more),
    }

    match kind {
        None => Ok(Value::Invalid),
        Some(kind) => Ok(Value::Array {
            kind,
            is_string,
            elems,
        }),
    }
}

/// Pack a value into raw bytes at `target` element width.
///
/// `expand = true`: a source element wider than `target` is serialized
/// little-endian into successive `target`-width chunks (so a `Quad`
/// packed to bytes yields 8 bytes); one narrower than `target` is
/// zero-extended into a single chunk. `expand = false`: every source
/// element contributes exactly one `target`-width chunk, its low bytes
/// only, discarding anything beyond `target`'s width.
pub fn pack(val: &Value, target: ElemKind, expand: bool) -> Result<Vec<u8>, ValueError> {
    let elems: Vec<Elem> = match val {
        Value::Invalid => Vec::new(),
        Value::Scalar(e) => alloc::vec![*e],
        Value::Array { elems, .. } => elems.clone(),
    };

    let target_width = target.width_bytes();
    let mut out = Vec::with_capacity(elems.len() * target_width);

    for e in elems {
        let raw = e.as_u64();
        let src_width = e.kind().width_bytes();
        let chunks = if expand && src_width > target_width {
            src_width / target_width
        } else {
            1
        };
        for chunk in 0..chunks {
            for i in 0..target_width {
                let byte_index = chunk * target_width + i;
                let byte = if byte_index < 8 {
                    ((raw >> (8 * byte_index)) & 0xFF) as u8
                } else {
                    0
                };
                out.push(byte);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        for x in 0..64u32 {
            assert_eq!(encode_msb(decode_onehot(x)), x);
        }
    }

    #[test]
    fn encode_zero_is_zero() {
        assert_eq!(encode_msb(0), 0);
    }

    #[test]
    fn reverse_byte() {
        assert_eq!(reverse(0b1000_0000, 8), 0b0000_0001);
        assert_eq!(reverse(0b0000_0001, 8), 0b1000_0000);
    }

    #[test]
    fn seuss_is_involution_pair() {
        for x in [0u32, 1, 0xDEAD_BEEF, 0xFFFF_FFFF, 0x1234_5678] {
            assert_eq!(seuss_reverse(seuss_forward(x)), x);
        }
    }

    #[test]
    fn add_wraps_at_declared_width() {
        let a = Value::Scalar(Elem::Long(0xFFFF_FFFF));
        let b = Value::Scalar(Elem::Long(1));
        let r = binary(BinOp::Add, &a, &b).unwrap();
        assert_eq!(r.as_u32().unwrap(), 0);
    }

    #[test]
    fn divide_by_zero_returns_lhs() {
        let a = Value::Scalar(Elem::Long(42));
        let zero = Value::Scalar(Elem::Long(0));
        let r = binary(BinOp::Div, &a, &zero).unwrap();
        assert_eq!(r.as_u32().unwrap(), 42);
    }

    #[test]
    fn byte_width_wraps_result() {
        let a = Value::Scalar(Elem::Byte(0xF0));
        let b = Value::Scalar(Elem::Byte(0x20));
        let r = binary(BinOp::Add, &a, &b).unwrap();
        assert_eq!(r.as_u32().unwrap(), 0x10);
    }

    #[test]
    fn concat_scalar_onto_scalar_makes_array() {
        let a = Value::Scalar(Elem::Byte(1));
        let b = Value::Scalar(Elem::Byte(2));
        let r = concat(&a, &b).unwrap();
        assert!(r.is_array());
        assert_eq!(r.size_bytes(), 2);
    }

    #[test]
    fn pack_truncates_without_expand() {
        let v = Value::Array {
            kind: ElemKind::Long,
            is_string: false,
            elems: alloc::vec![Elem::Long(0x1122_3344), Elem::Long(0xAABB_CCDD)],
        };
        let bytes = pack(&v, ElemKind::Byte, false).unwrap();
        assert_eq!(bytes, alloc::vec![0x44, 0xDD]);
    }

    #[test]
    fn pack_expands_wide_elements() {
        let v = Value::Scalar(Elem::Long(0x1122_3344));
        let bytes = pack(&v, ElemKind::Byte, true).unwrap();
        assert_eq!(bytes, alloc::vec![0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn negate_string_is_twos_complement() {
        // Big-endian bigint value 1 (0x0001); its two's complement over 16
        // bits is 0xFFFF, i.e. -1.
        let v = Value::string(alloc::vec![0x00, 0x01]);
        let r = unary(UnOp::Neg, &v).unwrap();
        match r {
            Value::Array { elems, .. } => {
                assert_eq!(
                    elems.iter().map(|e| e.as_u32() as u8).collect::<Vec<_>>(),
                    alloc::vec![0xFF, 0xFF]
                );
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn negate_zero_string_is_zero() {
        let v = Value::string(alloc::vec![0x00, 0x00]);
        let r = unary(UnOp::Neg, &v).unwrap();
        match r {
            Value::Array { elems, .. } => {
                assert_eq!(
                    elems.iter().map(|e| e.as_u32() as u8).collect::<Vec<_>>(),
                    alloc::vec![0x00, 0x00]
                );
            }
            _ => panic!("expected array"),
        }
    }
}
