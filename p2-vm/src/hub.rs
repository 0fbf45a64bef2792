//! The hub: shared memory, pin ports, the
//! free-running counter, locks, the PRNG, and cog lifecycle/scheduling.
//!
//! [`HubShared`] separates the owned subsystem state a running cog
//! needs to read and write from [`Hub`]'s array of cogs, so a running
//! cog can be handed a mutable view of everything except itself.

use alloc::vec;
use alloc::vec::Vec;

use p2_types::HUB_MEM_BYTES;

use crate::cog::{Cog, CogCommand};
use crate::consts::ROM_MONITOR_PC;
use crate::error::VmError;
use crate::hub::prng::Xoroshiro128Plus;

pub mod prng;

/// Everything a running cog needs to touch on the hub *except* the cog
/// array itself: memory, pin state, the counter, locks, and the PRNG.
/// Kept as its own type so [`Cog::step`] can borrow it mutably while
/// [`Hub`] still owns the `cogs: Vec<Cog>` that contains the very cog
/// doing the borrowing.
pub struct HubShared {
    mem: Vec<u8>,
    /// Current observed pin level, ports A (bits 0-31) and B (bits 32-63).
    pin: u64,
    /// Pin direction: 1 = driven output, 0 = input.
    dir: u64,
    /// Last written output level, independent of whether a pin is
    /// currently configured as input.
    out: u64,
    /// Free-running counter; also the round-robin scheduling tick.
    counter: u64,
    /// 16 one-bit locks.
    locks: u16,
    /// Prior owner bit recorded by the most recent `LOCKREL`, per cog.
    rng: Xoroshiro128Plus,
    ncogs: usize,
    running: usize,
}

impl HubShared {
    fn new(ncogs: usize) -> Self {
        HubShared {
            mem: vec![0u8; HUB_MEM_BYTES],
            pin: 0,
            dir: 0,
            out: 0,
            counter: 0,
            locks: 0,
            rng: Xoroshiro128Plus::default(),
            ncogs,
            running: 0,
        }
    }

    /// Read one byte.
    pub fn read_byte(&self, addr: u32) -> u8 {
        self.mem[addr as usize & (HUB_MEM_BYTES - 1)]
    }

    /// Write one byte.
    pub fn write_byte(&mut self, addr: u32, value: u8) {
        self.mem[addr as usize & (HUB_MEM_BYTES - 1)] = value;
    }

    /// Read a little-endian word.
    pub fn read_word(&self, addr: u32) -> u16 {
        let a = addr as usize & (HUB_MEM_BYTES - 1);
        u16::from_le_bytes([self.mem[a], self.mem[(a + 1) & (HUB_MEM_BYTES - 1)]])
    }

    /// Write a little-endian word.
    pub fn write_word(&mut self, addr: u32, value: u16) {
        let bytes = value.to_le_bytes();
        let a = addr as usize & (HUB_MEM_BYTES - 1);
        self.mem[a] = bytes[0];
        self.mem[(a + 1) & (HUB_MEM_BYTES - 1)] = bytes[1];
    }

    /// Read a little-endian long.
    pub fn read_long(&self, addr: u32) -> u32 {
        let a = addr as usize & (HUB_MEM_BYTES - 1);
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.mem[(a + i) & (HUB_MEM_BYTES - 1)];
        }
        u32::from_le_bytes(bytes)
    }

    /// Write a little-endian long.
    pub fn write_long(&mut self, addr: u32, value: u32) {
        let bytes = value.to_le_bytes();
        let a = addr as usize & (HUB_MEM_BYTES - 1);
        for (i, b) in bytes.iter().enumerate() {
            self.mem[(a + i) & (HUB_MEM_BYTES - 1)] = *b;
        }
    }

    /// Current 64-pin port state (`PA` low 32, `PB` high 32).
    pub fn pin(&self) -> u64 {
        self.pin
    }

    /// `PA`: the low 32 pins.
    pub fn rd_pa(&self) -> u32 {
        self.pin as u32
    }

    /// `PB`: the high 32 pins.
    pub fn rd_pb(&self) -> u32 {
        (self.pin >> 32) as u32
    }

    /// Current `DIR` mask.
    pub fn dir(&self) -> u64 {
        self.dir
    }

    /// Current `OUT` mask.
    pub fn out(&self) -> u64 {
        self.out
    }

    /// Set a single pin's direction bit; if switched to output, the pin
    /// immediately takes on its last-written `OUT` level.
    pub fn wr_dir(&mut self, pin: u32, bit: bool) {
        let mask = 1u64 << (pin & 63);
        if bit {
            self.dir |= mask;
            self.pin = (self.pin & !mask) | (self.out & mask);
        } else {
            self.dir &= !mask;
        }
    }

    /// Set a single pin's output level; drives the observed pin level
    /// only if that pin is currently configured as output.
    pub fn wr_out(&mut self, pin: u32, bit: bool) {
        let mask = 1u64 << (pin & 63);
        if bit {
            self.out |= mask;
        } else {
            self.out &= !mask;
        }
        if self.dir & mask != 0 {
            self.pin = (self.pin & !mask) | (if bit { mask } else { 0 });
        }
    }

    /// Drive an externally-sourced level onto an input pin (a test
    /// harness's stand-in for real-world stimulus); has no effect on a
    /// pin currently configured as output.
    pub fn set_external_input(&mut self, pin: u32, bit: bool) {
        let mask = 1u64 << (pin & 63);
        if self.dir & mask == 0 {
            self.pin = (self.pin & !mask) | (if bit { mask } else { 0 });
        }
    }

    /// The free-running counter (compared against each cog's `CT1..3`).
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// `hubslots()`: the number of currently-running cogs contending for
    /// a hub access this tick. Zero models
    /// "single-slot mode", in which [`crate::cog::memory::hub_cycles`]
    /// charges a flat cost instead of arbitration delay.
    pub fn hubslots(&self) -> u32 {
        self.running as u32
    }

    /// `cogindex()`: the cog owning the current hub-clock slot.
    pub fn cogindex(&self) -> u32 {
        (self.counter % self.ncogs as u64) as u32
    }

    /// `LOCKNEW`: claim the lowest clear lock bit, or `None` if all 16
    /// are held.
    pub fn lock_new(&mut self) -> Option<u8> {
        for i in 0..16u8 {
            if self.locks & (1 << i) == 0 {
                self.locks |= 1 << i;
                return Some(i);
            }
        }
        None
    }

    /// `LOCKRET`: clear a held lock.
    pub fn lock_ret(&mut self, index: u8) {
        self.locks &= !(1u16 << (index & 0xF));
    }

    /// `LOCKTRY`: test-and-set; returns whether the lock was free (and
    /// thus now claimed by the caller).
    pub fn lock_try(&mut self, index: u8) -> bool {
        let mask = 1u16 << (index & 0xF);
        let was_free = self.locks & mask == 0;
        self.locks |= mask;
        was_free
    }

    /// `LOCKREL`: release a lock, reporting whether it had been held.
    pub fn lock_rel(&mut self, index: u8) -> bool {
        let mask = 1u16 << (index & 0xF);
        let was_held = self.locks & mask != 0;
        self.locks &= !mask;
        was_held
    }

    /// `lockstate(i)`: the raw bit.
    pub fn lockstate(&self, index: u8) -> bool {
        self.locks & (1u16 << (index & 0xF)) != 0
    }

    /// Advance the xoroshiro128+ generator one step (`XORO32`).
    pub fn random_next(&mut self) -> u64 {
        self.rng.next()
    }

    /// `random(i)`: bit `i` of the most recent PRNG output.
    pub fn random(&self, i: u32) -> bool {
        self.rng.bit(i)
    }

    /// Override the PRNG's internal state; the default seed is `(1, 0)`.
    pub fn seed(&mut self, s0: u64, s1: u64) {
        self.rng.seed(s0, s1);
    }
}

/// The hub: owns all cogs and the memory/pin/lock/PRNG state they share.
pub struct Hub {
    shared: HubShared,
    cogs: Vec<Cog>,
    /// This cog's LUT-sharing partner, if any.
    lut_partner: Vec<Option<u8>>,
}

impl Hub {
    /// Construct a hub with `ncogs` idle cogs (none running until
    /// [`Hub::boot`] or [`Hub::coginit`] starts one).
    pub fn new(ncogs: usize) -> Self {
        let cogs = (0..ncogs).map(|i| Cog::new(i as u8)).collect();
        Hub {
            shared: HubShared::new(ncogs),
            cogs,
            lut_partner: vec![None; ncogs],
        }
    }

    /// Read-only view of the shared hub state.
    pub fn shared(&self) -> &HubShared {
        &self.shared
    }

    /// Mutable view of the shared hub state (pin injection, PRNG
    /// overrides, direct memory pokes for test setup).
    pub fn shared_mut(&mut self) -> &mut HubShared {
        &mut self.shared
    }

    /// Read-only access to a cog's state.
    pub fn cog(&self, index: usize) -> Option<&Cog> {
        self.cogs.get(index)
    }

    /// `hub.rd_mem(addr)`.
    pub fn rd_mem(&self, addr: u32) -> u8 {
        self.shared.read_byte(addr)
    }

    /// `hub.rd_PA()`.
    pub fn rd_pa(&self) -> u32 {
        self.shared.rd_pa()
    }

    /// `hub.rd_PB()`.
    pub fn rd_pb(&self) -> u32 {
        self.shared.rd_pb()
    }

    /// Enable LUT-RAM mirroring between an adjacent odd/even cog pair
    ///: writes to either cog's LUT RAM are mirrored to
    /// the other.
    pub fn pair_lut(&mut self, a: u8, b: u8) {
        if let Some(slot) = self.lut_partner.get_mut(a as usize) {
            *slot = Some(b);
        }
        if let Some(slot) = self.lut_partner.get_mut(b as usize) {
            *slot = Some(a);
        }
    }

    /// `hub.load(image)`: write `image` into hub memory at offset 0.
    pub fn load(&mut self, image: &[u8]) -> Result<(), VmError> {
        if image.len() > HUB_MEM_BYTES {
            return Err(VmError::ImageTooLarge { size: image.len() });
        }
        self.shared.mem[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Begin hub-mode execution of cog 0 at the ROM-monitor entry point.
    pub fn boot(&mut self) {
        self.cogs[0].start(ROM_MONITOR_PC, 0, 0);
        self.shared.running = self.cogs.iter().filter(|c| c.is_running()).count();
    }

    /// `coginit(id, addr, setq_param)`: mirrors the `COGINIT` instruction
    ///. `id = None` picks the lowest free cog ("`id` has
    /// its MSB set"); `id = Some(n)` starts that specific cog. The new
    /// cog's `pc` is `addr & 0xFFFFC`; `PTRB = addr`; `PTRA = setq_param`.
    pub fn coginit(&mut self, id: Option<usize>, addr: u32, setq_param: u32) -> Result<usize, VmError> {
        let index = match id {
            Some(i) => {
                if i >= self.cogs.len() {
                    return Err(VmError::CogIndexOutOfRange { index: i, count: self.cogs.len() });
                }
                i
            }
            None => self
                .cogs
                .iter()
                .position(|c| !c.is_running())
                .ok_or(VmError::NoFreeCog)?,
        };
        self.cogs[index].start(addr & 0xF_FFFC, addr, setq_param);
        self.shared.running = self.cogs.iter().filter(|c| c.is_running()).count();
        Ok(index)
    }

    fn apply_command(&mut self, from: u8, command: CogCommand) {
        match command {
            CogCommand::Start { cog, addr, setq } => {
                let _ = self.coginit(cog.map(|c| c as usize), addr, setq);
            }
            CogCommand::Stop { cog } => {
                if let Some(c) = self.cogs.get_mut(cog as usize) {
                    c.stop();
                }
                self.shared.running = self.cogs.iter().filter(|c| c.is_running()).count();
            }
            CogCommand::MirrorLut { addr, value } => {
                if let Some(partner) = self.lut_partner[from as usize] {
                    if let Some(c) = self.cogs.get_mut(partner as usize) {
                        c.poke_lut(addr, value);
                    }
                }
            }
        }
    }

    /// Run until at least `cycles` hub-clock ticks have been spent,
    /// driving exactly one cog's `step()` per tick in round-robin order
    ///. Returns the number of cycles actually consumed
    /// (at least `cycles`, since the last step's cost isn't split).
    pub fn run(&mut self, cycles: u32) -> u32 {
        tracing::trace!(cycles, "hub run starting");
        let mut spent = 0u32;
        while spent < cycles {
            spent += self.step_one();
        }
        tracing::trace!(spent, "hub run finished");
        spent
    }

    /// Advance exactly one hub-clock tick: dispatch the owning cog's
    /// `step()` (if it is running), apply any lifecycle command it
    /// returned, and advance the counter.
    pub fn step_one(&mut self) -> u32 {
        let ncogs = self.cogs.len();
        let index = (self.shared.counter % ncogs as u64) as usize;
        let cycles = if self.cogs[index].is_running() {
            let outcome = self.cogs[index].step(&mut self.shared);
            if let Some(command) = outcome.command {
                self.apply_command(index as u8, command);
            }
            outcome.cycles
        } else {
            1
        };
        self.shared.counter = self.shared.counter.wrapping_add(1);
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_oversized_image() {
        let mut hub = Hub::new(8);
        let big = vec![0u8; HUB_MEM_BYTES + 1];
        assert!(matches!(hub.load(&big), Err(VmError::ImageTooLarge { .. })));
    }

    #[test]
    fn boot_starts_cog_zero_at_rom_monitor() {
        let mut hub = Hub::new(8);
        hub.boot();
        assert!(hub.cog(0).unwrap().is_running());
        assert_eq!(hub.cog(0).unwrap().pc(), ROM_MONITOR_PC);
    }

    #[test]
    fn coginit_picks_lowest_free_cog() {
        let mut hub = Hub::new(4);
        hub.coginit(Some(0), 0x1000, 0).unwrap();
        let picked = hub.coginit(None, 0x2000, 0).unwrap();
        assert_eq!(picked, 1);
    }

    #[test]
    fn coginit_rejects_out_of_range_index() {
        let mut hub = Hub::new(4);
        assert!(matches!(
            hub.coginit(Some(9), 0, 0),
            Err(VmError::CogIndexOutOfRange { index: 9, count: 4 })
        ));
    }

    #[test]
    fn lock_new_claims_lowest_clear_bit() {
        let mut hub = Hub::new(1);
        assert_eq!(hub.shared_mut().lock_new(), Some(0));
        assert_eq!(hub.shared_mut().lock_new(), Some(1));
        hub.shared_mut().lock_ret(0);
        assert_eq!(hub.shared_mut().lock_new(), Some(0));
    }

    #[test]
    fn wr_out_drives_pin_only_when_output() {
        let mut hub = Hub::new(1);
        hub.shared_mut().wr_out(5, true);
        assert_eq!(hub.rd_pa() & (1 << 5), 0);
        hub.shared_mut().wr_dir(5, true);
        hub.shared_mut().wr_out(5, true);
        assert_ne!(hub.rd_pa() & (1 << 5), 0);
    }

    #[test]
    fn hub_mem_round_trips_a_long() {
        let mut hub = Hub::new(1);
        hub.shared_mut().write_long(8, 0x1234_5678);
        assert_eq!(hub.shared().read_long(8), 0x1234_5678);
    }
}
