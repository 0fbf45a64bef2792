//! Event-flag and interrupt-promotion bookkeeping, evaluated once per
//! `step()` before fetch and consumed by
//! `Cog::step`'s dispatch of `ALLOWI`/`STALLI` and the implicit
//! `CALLD`-to-vector on promotion.

bitflags::bitflags! {
    /// Event flags the cog tracks each step.
    #[derive(Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CogFlags: u16 {
        /// `CT1` counter match.
        const CT1 = 1 << 0;
        /// `CT2` counter match.
        const CT2 = 1 << 1;
        /// `CT3` counter match.
        const CT3 = 1 << 2;
        /// Selectable event 1 (pin edge, by convention `pin.num`'s edge).
        const SE1 = 1 << 3;
        /// Selectable event 2.
        const SE2 = 1 << 4;
        /// Selectable event 3.
        const SE3 = 1 << 5;
        /// Selectable event 4.
        const SE4 = 1 << 6;
        /// Pattern (`PAT`) match against the hub pin state.
        const PAT = 1 << 7;
        /// FIFO block-write-complete.
        const FBW = 1 << 8;
        /// Transmit-ready.
        const XMT = 1 << 9;
        /// Smart-pin "in" finished.
        const XFI = 1 << 10;
        /// Smart-pin "out" ready.
        const XRO = 1 << 11;
        /// Smart-pin "out" ready, long.
        const XRL = 1 << 12;
        /// `ATN`: another cog posted an attention event.
        const ATN = 1 << 13;
        /// CORDIC queue empty (`QMT`: "queue empty").
        const QMT = 1 << 14;
        /// Global interrupt summary bit.
        const INT = 1 << 15;
    }
}

/// Pattern-match event configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatWatch {
    /// Match mode: 0 = PA equals, 1 = PA differs, 2 = PB equals, 3 = PB
    /// differs (mirrors `SETPAT`'s mode field).
    pub mode: u8,
    /// Bits of the port considered.
    pub mask: u32,
    /// Value to compare against.
    pub match_value: u32,
}

impl PatWatch {
    fn evaluate(&self, pa: u32, pb: u32) -> bool {
        let (port, want_equal) = match self.mode & 3 {
            0 => (pa, true),
            1 => (pa, false),
            2 => (pb, true),
            _ => (pb, false),
        };
        let hit = (port & self.mask) == (self.match_value & self.mask);
        hit == want_equal
    }
}

/// Pin-edge watch configuration. `prev` is internal
/// bookkeeping (the last sampled level) needed to detect an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinWatch {
    /// 0 = rising, 1 = falling, 2 = either, 3 = disabled.
    pub mode: u8,
    /// Reserved for a future multi-pin mask; currently unused beyond `num`.
    pub mask: u32,
    /// True once an edge matching `mode` has been observed.
    pub edge: bool,
    /// Which of the 64 hub pins this watch samples.
    pub num: u8,
    prev: bool,
}

impl PinWatch {
    fn sample(&mut self, pin_state: u64) -> bool {
        let level = (pin_state >> (self.num & 63)) & 1 != 0;
        let rose = level && !self.prev;
        let fell = !level && self.prev;
        self.prev = level;
        match self.mode & 3 {
            0 => rose,
            1 => fell,
            2 => rose || fell,
            _ => false,
        }
    }
}

/// One interrupt level's pending/active state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntLevel {
    /// Event-flag bits that source this level (a `CogFlags` bitmask).
    pub source: u16,
    /// Set once this level has promoted and its vector hasn't returned.
    pub active: bool,
}

/// The three interrupt levels plus the global disable gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterruptState {
    /// Set by `STALLI`, cleared by `ALLOWI`.
    pub disabled: bool,
    /// `INT1`, `INT2`, `INT3`, highest priority first.
    pub levels: [IntLevel; 3],
}

/// Update `CT1`/`CT2`/`CT3` match flags against the hub's free-running
/// counter.
pub fn update_counters(flags: &mut CogFlags, ct1: u32, ct2: u32, ct3: u32, hub_counter: u64) {
    let now = hub_counter as u32;
    flags.set(CogFlags::CT1, now == ct1);
    flags.set(CogFlags::CT2, now == ct2);
    flags.set(CogFlags::CT3, now == ct3);
}

/// Update the `PAT` flag from the hub's current pin state.
pub fn update_pattern(flags: &mut CogFlags, pat: &PatWatch, pin_state: u64) {
    let pa = pin_state as u32;
    let pb = (pin_state >> 32) as u32;
    flags.set(CogFlags::PAT, pat.evaluate(pa, pb));
}

/// Update the generic pin-edge flag (`SE1`) from the hub's current pin
/// state.
pub fn update_pin_edge(flags: &mut CogFlags, pin: &mut PinWatch, pin_state: u64) {
    let hit = pin.sample(pin_state);
    pin.edge = hit;
    flags.set(CogFlags::SE1, hit);
}

/// Evaluate interrupt promotion: the highest-priority level whose source
/// mask intersects the current flags and which isn't already active
/// promotes, unless a higher level is already active or interrupts are
/// globally disabled. Returns the promoted level index (0-2), if any.
pub fn promote(state: &mut InterruptState, flags: CogFlags) -> Option<usize> {
    if state.disabled {
        return None;
    }
    for i in 0..3 {
        if state.levels[i].active {
            return None;
        }
        if flags.bits() & state.levels[i].source != 0 {
            state.levels[i].active = true;
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ct1_flag_set_on_exact_match() {
        let mut flags = CogFlags::empty();
        update_counters(&mut flags, 100, 0, 0, 100);
        assert!(flags.contains(CogFlags::CT1));
        update_counters(&mut flags, 100, 0, 0, 101);
        assert!(!flags.contains(CogFlags::CT1));
    }

    #[test]
    fn pin_edge_detects_rising_only() {
        let mut watch = PinWatch { mode: 0, mask: 0, edge: false, num: 3, prev: false };
        let mut flags = CogFlags::empty();
        update_pin_edge(&mut flags, &mut watch, 0);
        assert!(!flags.contains(CogFlags::SE1));
        update_pin_edge(&mut flags, &mut watch, 1 << 3);
        assert!(flags.contains(CogFlags::SE1));
        update_pin_edge(&mut flags, &mut watch, 1 << 3);
        assert!(!flags.contains(CogFlags::SE1));
    }

    #[test]
    fn higher_level_blocks_lower_from_promoting() {
        let mut state = InterruptState {
            disabled: false,
            levels: [
                IntLevel { source: CogFlags::CT1.bits(), active: true },
                IntLevel { source: CogFlags::CT2.bits(), active: false },
                IntLevel::default(),
            ],
        };
        let flags = CogFlags::CT2;
        assert_eq!(promote(&mut state, flags), None);
    }

    #[test]
    fn lowest_unblocked_level_promotes() {
        let mut state = InterruptState::default();
        state.levels[1].source = CogFlags::CT2.bits();
        let promoted = promote(&mut state, CogFlags::CT2);
        assert_eq!(promoted, Some(1));
        assert!(state.levels[1].active);
    }

    #[test]
    fn globally_disabled_never_promotes() {
        let mut state = InterruptState { disabled: true, ..Default::default() };
        state.levels[0].source = CogFlags::CT1.bits();
        assert_eq!(promote(&mut state, CogFlags::CT1), None);
    }
}
