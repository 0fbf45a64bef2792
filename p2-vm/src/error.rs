//! Errors raised by the hub/cog boot path.
//!
//! `step()` itself never fails — invalid opcodes, unaligned hub writes,
//! and similar conditions that would be errors in the assembler are
//! benign no-ops in the emulator. The only fallible surface is loading
//! an image that doesn't fit hub memory.

/// Errors raised while loading a binary image or booting a cog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// The image passed to [`crate::Hub::load`] is larger than hub
    /// memory.
    #[error("image of {size} bytes does not fit in {}-byte hub memory", p2_types::HUB_MEM_BYTES)]
    ImageTooLarge {
        /// The image's size in bytes.
        size: usize,
    },
    /// [`crate::Hub::coginit`] was asked to start a specific cog index
    /// that doesn't exist.
    #[error("cog index {index} is out of range for a {count}-cog hub")]
    CogIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The hub's configured cog count.
        count: usize,
    },
    /// `coginit` was asked to pick the lowest free cog but every cog is
    /// already running.
    #[error("no free cog is available to start")]
    NoFreeCog,
}
