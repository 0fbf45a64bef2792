use alloc::string::{String, ToString};

/// Error kinds the assembler can attach to a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AsmErrorKind {
    /// Unterminated string, unbalanced curly braces at end of input,
    /// invalid digit in a numeric literal.
    #[error("lex error")]
    LexError,
    /// Unexpected token kind in operand position; mnemonic followed by
    /// wrong operand shape; duplicate suffix; condition applied to a
    /// pseudo-op.
    #[error("syntax error")]
    SyntaxError,
    /// Pass-2 reference to an undefined symbol.
    #[error("unknown symbol")]
    UnknownSymbol,
    /// Second definition of a non-local symbol in the same scope.
    #[error("redefined symbol")]
    RedefinedSymbol,
    /// Immediate value exceeds 32 bits (after AUGS), or 9 bits for
    /// instructions that forbid AUGS.
    #[error("immediate out of range")]
    ImmediateOutOfRange,
    /// Origin advance past 1 MiB; `FIT` failed; relative branch offset
    /// beyond +/-2^19.
    #[error("address out of range")]
    AddressOutOfRange,
    /// Arithmetic operation undefined for a value type.
    #[error("invalid operand")]
    InvalidOperand,
    /// `FILE` pseudo-op references a missing blob.
    #[error("I/O error")]
    IoError,
    /// Only for explicit `//`/`\` in assignment expressions; silently
    /// returns the left operand elsewhere.
    #[error("divide by zero")]
    DivideByZero,
}

/// An error attached to one source line: the
/// assembler recovers at line boundaries and continues, accumulating these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {kind}: {message}")]
pub struct AsmError {
    /// The error category.
    pub kind: AsmErrorKind,
    /// 1-based source line number.
    pub line: u32,
    /// A human-readable detail message.
    pub message: String,
}

impl AsmError {
    /// Construct an error attached to `line`.
    pub fn new(kind: AsmErrorKind, line: u32, message: impl Into<String>) -> Self {
        AsmError { kind, line, message: message.into() }
    }
}

impl From<p2_value::ValueError> for AsmErrorKind {
    fn from(_: p2_value::ValueError) -> Self {
        AsmErrorKind::InvalidOperand
    }
}

pub(crate) fn err(kind: AsmErrorKind, line: u32, message: impl ToString) -> AsmError {
    AsmError::new(kind, line, message.to_string())
}
