//! A cycle-accurate, multi-core Propeller2 emulator: given an assembled
//! hub-memory image, runs it across up to [`p2_types::MAX_COGS`] cogs
//! and exposes the debug-introspection surface `p2-disasm`'s callers
//! need to cross-check execution against disassembly.
//!
//! [`hub::HubShared`] is the mutable substrate every running
//! [`cog::Cog`] reads and writes, while [`hub::Hub`] owns both it and
//! the cog array, applying each step's lifecycle command (start/stop
//! another cog, mirror a LUT write) only once that step's own borrow
//! has ended.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

#[doc(hidden)]
pub extern crate alloc;

extern crate core;

pub mod cog;
mod consts;
mod error;
pub mod hub;

pub use cog::{Cog, CogCommand, StepOutcome};
pub use consts::{
    COG_STACK_DEPTH, COG_STACK_MASK, CORDIC_QUEUE_DEPTH, HUB_EXEC_BASE, LUT_BASE, ROM_MONITOR_PC,
};
pub use error::VmError;
pub use hub::{Hub, HubShared};
