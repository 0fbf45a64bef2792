/// Errors raised by Value/Union operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The operation is undefined for the operand's element type (e.g.
    /// bit-reverse on a `Real`), or an array was used where a scalar was
    /// required.
    #[error("operation is not defined for this value's element type")]
    InvalidOperand,
}
