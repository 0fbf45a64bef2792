/// The element kind of a Value, fixing wrap-around width and numeric
/// interpretation for arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElemKind {
    /// A single-bit boolean, treated as width-8 for wrap purposes.
    Bool,
    /// 8-bit unsigned.
    Byte,
    /// 16-bit unsigned.
    Word,
    /// 32-bit unsigned.
    Long,
    /// 64-bit unsigned.
    Quad,
    /// IEEE-754 double.
    Real,
    /// A cog/hub address pair; arithmetic demotes to the selected 32-bit
    /// form (see `Value::get_addr`).
    Addr,
}

impl ElemKind {
    /// Size of one element of this kind, in bytes.
    pub const fn width_bytes(self) -> usize {
        match self {
            ElemKind::Bool | ElemKind::Byte => 1,
            ElemKind::Word => 2,
            ElemKind::Long | ElemKind::Addr => 4,
            ElemKind::Quad | ElemKind::Real => 8,
        }
    }

    /// Size of one element of this kind, in bits, used for wrap-around
    /// arithmetic (2^8/2^16/2^32/2^64).
    pub const fn width_bits(self) -> u32 {
        (self.width_bytes() as u32) * 8
    }
}

/// A single typed scalar element.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Elem {
    /// Boolean.
    Bool(bool),
    /// 8-bit unsigned.
    Byte(u8),
    /// 16-bit unsigned.
    Word(u16),
    /// 32-bit unsigned.
    Long(u32),
    /// 64-bit unsigned.
    Quad(u64),
    /// IEEE-754 double.
    Real(f64),
    /// A cog-relative / hub-absolute address pair.
    Addr {
        /// Cog-relative form.
        cog: u32,
        /// Hub-absolute form.
        hub: u32,
        /// Which form `get_addr()` should prefer.
        hubmode: bool,
    },
}

impl Elem {
    /// The kind tag for this element.
    pub const fn kind(self) -> ElemKind {
        match self {
            Elem::Bool(_) => ElemKind::Bool,
            Elem::Byte(_) => ElemKind::Byte,
            Elem::Word(_) => ElemKind::Word,
            Elem::Long(_) => ElemKind::Long,
            Elem::Quad(_) => ElemKind::Quad,
            Elem::Real(_) => ElemKind::Real,
            Elem::Addr { .. } => ElemKind::Addr,
        }
    }

    /// Widen to a plain `u64` for generic wrapping arithmetic. `Real`
    /// reinterprets its bit pattern only when explicitly requested by the
    /// caller (arithmetic on reals goes through `as_f64`/`from_f64`
    /// instead); here it is truncated to its integer value for the rare
    /// case an integer op is applied to a Real (InvalidOperand in
    /// practice, guarded by `ops.rs`).
    pub fn as_u64(self) -> u64 {
        match self {
            Elem::Bool(b) => b as u64,
            Elem::Byte(v) => v as u64,
            Elem::Word(v) => v as u64,
            Elem::Long(v) => v as u64,
            Elem::Quad(v) => v,
            Elem::Real(v) => v as u64,
            Elem::Addr { hub, cog, hubmode } => (if hubmode { hub } else { cog }) as u64,
        }
    }

    /// Widen to `u32`, truncating wider kinds.
    pub fn as_u32(self) -> u32 {
        self.as_u64() as u32
    }

    /// Interpret as `f64` (for `Real`; other kinds convert numerically).
    pub fn as_f64(self) -> f64 {
        match self {
            Elem::Real(v) => v,
            other => other.as_u64() as f64,
        }
    }

    /// Construct an element of `kind` from a raw `u64`, wrapping/truncating
    /// to that kind's width.
    pub fn from_u64(kind: ElemKind, value: u64) -> Elem {
        match kind {
            ElemKind::Bool => Elem::Bool(value & 1 != 0),
            ElemKind::Byte => Elem::Byte(value as u8),
            ElemKind::Word => Elem::Word(value as u16),
            ElemKind::Long => Elem::Long(value as u32),
            ElemKind::Quad => Elem::Quad(value),
            ElemKind::Real => Elem::Real(value as f64),
            ElemKind::Addr => Elem::Addr {
                cog: value as u32,
                hub: value as u32,
                hubmode: false,
            },
        }
    }

    /// Construct an element of `kind` from an `f64`.
    pub fn from_f64(kind: ElemKind, value: f64) -> Elem {
        if kind == ElemKind::Real {
            Elem::Real(value)
        } else {
            Elem::from_u64(kind, value as u64)
        }
    }
}
