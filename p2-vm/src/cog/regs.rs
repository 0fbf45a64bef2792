//! Addresses of the cog's hardwired special-purpose registers, mirrored
//! from `p2-assembler`'s `SPECIAL_REGS` table so the emulator and the
//! assembler agree on where `PTRA`, `DIRA`, and friends live in the
//! 512-long register file.

/// `IJMP3`: interrupt-3 vector.
pub const IJMP3: u16 = 0x1F0;
/// `IRET3`: interrupt-3 return state.
pub const IRET3: u16 = 0x1F1;
/// `IJMP2`: interrupt-2 vector.
pub const IJMP2: u16 = 0x1F2;
/// `IRET2`: interrupt-2 return state.
pub const IRET2: u16 = 0x1F3;
/// `IJMP1`: interrupt-1 vector.
pub const IJMP1: u16 = 0x1F4;
/// `IRET1`: interrupt-1 return state.
pub const IRET1: u16 = 0x1F5;
/// `PA`: general-purpose pattern-match scratch register.
pub const PA: u16 = 0x1F6;
/// `PB`: general-purpose pattern-match scratch register.
pub const PB: u16 = 0x1F7;
/// `PTRA`: hub pointer A, 20-bit.
pub const PTRA: u16 = 0x1F8;
/// `PTRB`: hub pointer B, 20-bit.
pub const PTRB: u16 = 0x1F9;
/// `DIRA`: pin direction, pins 0-31.
pub const DIRA: u16 = 0x1FA;
/// `DIRB`: pin direction, pins 32-63.
pub const DIRB: u16 = 0x1FB;
/// `OUTA`: pin output level, pins 0-31.
pub const OUTA: u16 = 0x1FC;
/// `OUTB`: pin output level, pins 32-63.
pub const OUTB: u16 = 0x1FD;
/// `INA`: pin input level, pins 0-31 (read-only).
pub const INA: u16 = 0x1FE;
/// `INB`: pin input level, pins 32-63 (read-only).
pub const INB: u16 = 0x1FF;

/// `true` for the six registers backed by hub pin state (`DIRA/DIRB/
/// OUTA/OUTB/INA/INB`) rather than by a `cog_ram` cell.
pub const fn is_pin_register(addr: u16) -> bool {
    matches!(addr, DIRA | DIRB | OUTA | OUTB | INA | INB)
}
