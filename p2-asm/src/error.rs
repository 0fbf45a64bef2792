/// Errors raised while building an [`crate::Instruction`] from assembler
/// operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A 9-bit `dst`/`src` field (or its augmented 23-bit extension) does
    /// not fit the operand's declared range.
    #[error("immediate value out of range for this field")]
    ImmediateOutOfRange,
    /// The resolved address does not fit the destination space (e.g. a
    /// COG-mode branch target beyond 512 longs).
    #[error("address out of range for this addressing mode")]
    AddressOutOfRange,
    /// The operand shape doesn't match what this mnemonic accepts (e.g.
    /// an immediate where only a register is legal).
    #[error("operand is not valid for this instruction")]
    InvalidOperand,
}
