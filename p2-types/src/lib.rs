//! Shared numeric primitives for the Propeller2 toolchain.
//!
//! The P2 is a 32-bit machine end to end: registers, hub addresses, and
//! instruction words are all `u32`. This crate exists so that the
//! assembler, disassembler and emulator crates agree on one definition of
//! "word" rather than each rolling their own alias.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod addr;
mod bits;
mod fmt;

pub use addr::{CogAddr, HubAddr};
pub use bits::{reverse_bits, rotate_left32, rotate_right32, sign_extend};
pub use fmt::{format_grouped, NumberBase};

/// A single Propeller2 machine word: registers, hub memory cells (as u32
/// views), and instruction encodings are all this width.
pub type Word = u32;

/// Number of cogs a real P2 silicon instance supports (8 on P2X8C4M64P,
/// headroom to 16 reserved in the ID field). The hub is built generically
/// over a cog count in `[1, MAX_COGS]`.
pub const MAX_COGS: usize = 16;

/// Size of hub RAM in bytes (1 MiB).
pub const HUB_MEM_BYTES: usize = 1 << 20;

/// Size of COG or LUT RAM in longs.
pub const COG_RAM_LONGS: usize = 512;
