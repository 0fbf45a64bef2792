//! Emulator parameters.

/// Number of general-purpose call-stack slots per cog (`CALL`/`CALLD`/
/// `CALLA`/`CALLB` push here; `K` below indexes into it modularly).
pub const COG_STACK_DEPTH: usize = 8;

/// `K`, the cog's call-stack pointer, wraps modulo this.
pub const COG_STACK_MASK: u8 = 0b111;

/// Boundary, in cog-address units, between COG RAM (`0x000..LUT_BASE`)
/// and LUT RAM (`LUT_BASE..HUB_EXEC_BASE`).
pub const LUT_BASE: u32 = 0x200;

/// Boundary, in cog-address units, above which `pc` addresses hub
/// memory directly (hub-exec mode).
pub const HUB_EXEC_BASE: u32 = 0x400;

/// Depth of the CORDIC result queue:
/// operations posted beyond this many outstanding results block the
/// pipeline's issuing cog, modeled here as a plain ring buffer bound.
pub const CORDIC_QUEUE_DEPTH: usize = 16;

/// The ROM-monitor boot address used by `Hub::boot` for cog 0's default
/// entry point.
pub const ROM_MONITOR_PC: u32 = 0xFC000;

/// Fixed cycle cost for a no-op / unimplemented opcode slot and for any
/// instruction skipped by its condition code or a `SKIP`/`SKIPF` bit.
pub const COND_FAIL_CYCLES: u32 = 2;

/// Cycle cost for a plain register-to-register ALU instruction that
/// doesn't touch the hub or CORDIC pipeline.
pub const ALU_CYCLES: u32 = 2;
