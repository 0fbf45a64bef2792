//! A single cog: register file, flags, event/interrupt state, and
//! the `step()` method that drives one instruction through its
//! seven-stage dispatch order.
//!
//! `pc` is a longword index shared across cog RAM (0..512), LUT RAM
//! (512..1024), and hub memory beyond that (hub byte address =
//! `pc * 4`), which is why [`crate::consts::LUT_BASE`] and
//! [`crate::consts::HUB_EXEC_BASE`] are longword, not byte, offsets.
//! `RDxxx`/`WRxxx` operands, by contrast, are hub *byte* addresses, per
//! [`memory::hub_cycles`]'s `addr / 4`.

pub mod alu;
pub mod cordic;
pub mod flow;
pub mod interrupt;
pub mod memory;
pub mod regs;

use p2_asm::{decode_any, Condition, DecodedWord, Instruction, Mnemonic};
use p2_types::COG_RAM_LONGS;

use crate::consts::{ALU_CYCLES, COND_FAIL_CYCLES, HUB_EXEC_BASE, LUT_BASE};
use crate::hub::HubShared;
use cordic::CordicQueue;
use interrupt::{CogFlags, InterruptState, PatWatch, PinWatch};
use memory::Width;

/// What a hub needs to do after a cog's `step()` returns, applied once
/// the cog's own mutable borrow has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CogCommand {
    /// `COGINIT`: start a cog. `cog = None` means "lowest free".
    Start { cog: Option<u8>, addr: u32, setq: u32 },
    /// `COGSTOP`: stop a cog.
    Stop { cog: u8 },
    /// Mirror a LUT-RAM write to this cog's paired partner.
    MirrorLut { addr: u16, value: u32 },
}

/// The result of one `Cog::step()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Hub-clock cycles this step consumed.
    pub cycles: u32,
    /// A lifecycle action for the owning [`crate::hub::Hub`] to apply.
    pub command: Option<CogCommand>,
}

fn no_command(cycles: u32) -> StepOutcome {
    StepOutcome { cycles, command: None }
}

/// One cog's complete architectural state.
pub struct Cog {
    id: u8,
    running: bool,
    pc: u32,
    cog_ram: [u32; COG_RAM_LONGS],
    lut_ram: [u32; COG_RAM_LONGS],
    c: bool,
    z: bool,
    stack: [u32; 8],
    k: u8,
    flags: CogFlags,
    ct1: u32,
    ct2: u32,
    ct3: u32,
    pat: PatWatch,
    pin: PinWatch,
    int: InterruptState,
    cordic: CordicQueue,
    aug_s: Option<u32>,
    aug_d: Option<u32>,
    rep_block: Option<u32>,
    rep_offset: u32,
    rep_times: u32,
    rep_infinite: bool,
    skip: u32,
    skipf: u32,
    setq: Option<u32>,
    hubset: u32,
    last_ir: u32,
}

impl Cog {
    /// A freshly-reset, non-running cog.
    pub fn new(id: u8) -> Self {
        Cog {
            id,
            running: false,
            pc: 0,
            cog_ram: [0; COG_RAM_LONGS],
            lut_ram: [0; COG_RAM_LONGS],
            c: false,
            z: false,
            stack: [0; 8],
            k: 0,
            flags: CogFlags::empty(),
            ct1: 0,
            ct2: 0,
            ct3: 0,
            pat: PatWatch::default(),
            pin: PinWatch::default(),
            int: InterruptState::default(),
            cordic: CordicQueue::default(),
            aug_s: None,
            aug_d: None,
            rep_block: None,
            rep_offset: 0,
            rep_times: 0,
            rep_infinite: false,
            skip: 0,
            skipf: 0,
            setq: None,
            hubset: 0,
            last_ir: 0,
        }
    }

    /// `coginit`: begin execution at `pc`, with `PTRB`/`PTRA` preloaded
    ///. Clears per-run execution state but leaves `cog_ram`
    /// and `lut_ram` contents alone (starting a cog never wipes its RAM
    /// on real silicon).
    pub fn start(&mut self, pc: u32, ptrb: u32, ptra: u32) {
        self.pc = pc;
        self.cog_ram[regs::PTRB as usize] = ptrb;
        self.cog_ram[regs::PTRA as usize] = ptra;
        self.c = false;
        self.z = false;
        self.k = 0;
        self.flags = CogFlags::empty();
        self.int = InterruptState::default();
        self.aug_s = None;
        self.aug_d = None;
        self.rep_block = None;
        self.rep_offset = 0;
        self.skip = 0;
        self.skipf = 0;
        self.setq = None;
        self.running = true;
    }

    /// `COGSTOP`'s target-side effect.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether this cog is currently executing.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// `rd_pc()`: current program counter (longword-addressed).
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// `rd_c()`.
    pub fn rd_c(&self) -> bool {
        self.c
    }

    /// `rd_z()`.
    pub fn rd_z(&self) -> bool {
        self.z
    }

    /// `rd_flags()`: the event-flag bitmask.
    pub fn rd_flags(&self) -> CogFlags {
        self.flags
    }

    /// `rd_IR()`: the most recently fetched instruction word.
    pub fn rd_ir(&self) -> u32 {
        self.last_ir
    }

    /// `rd_cog(addr)`: peek a cog-RAM longword.
    pub fn rd_cog(&self, addr: u16) -> u32 {
        self.cog_ram[addr as usize & 0x1FF]
    }

    /// `rd_lut(addr)`: peek a LUT-RAM longword.
    pub fn rd_lut(&self, addr: u16) -> u32 {
        self.lut_ram[addr as usize & 0x1FF]
    }

    /// `rd_D_aug()`: the pending `AUGD` payload, if any.
    pub fn rd_d_aug(&self) -> Option<u32> {
        self.aug_d
    }

    /// `rd_S_aug()`: the pending `AUGS` payload, if any.
    pub fn rd_s_aug(&self) -> Option<u32> {
        self.aug_s
    }

    /// Direct LUT-RAM poke used by the hub to apply a partner cog's
    /// mirrored write.
    pub fn poke_lut(&mut self, addr: u16, value: u32) {
        self.lut_ram[addr as usize & 0x1FF] = value;
    }

    fn read_reg(&self, addr: u16, shared: &HubShared) -> u32 {
        match addr {
            regs::INA => shared.rd_pa(),
            regs::INB => shared.rd_pb(),
            regs::OUTA => shared.out() as u32,
            regs::OUTB => (shared.out() >> 32) as u32,
            regs::DIRA => shared.dir() as u32,
            regs::DIRB => (shared.dir() >> 32) as u32,
            _ => self.cog_ram[addr as usize & 0x1FF],
        }
    }

    fn write_reg(&mut self, addr: u16, value: u32, shared: &mut HubShared) {
        match addr {
            regs::INA | regs::INB => {}
            regs::OUTA => {
                for i in 0..32u32 {
                    shared.wr_out(i, (value >> i) & 1 != 0);
                }
            }
            regs::OUTB => {
                for i in 0..32u32 {
                    shared.wr_out(32 + i, (value >> i) & 1 != 0);
                }
            }
            regs::DIRA => {
                for i in 0..32u32 {
                    shared.wr_dir(i, (value >> i) & 1 != 0);
                }
            }
            regs::DIRB => {
                for i in 0..32u32 {
                    shared.wr_dir(32 + i, (value >> i) & 1 != 0);
                }
            }
            _ => self.cog_ram[addr as usize & 0x1FF] = value,
        }
    }

    fn operand_s(&mut self, ins: &Instruction) -> u32 {
        if ins.im {
            match self.aug_s.take() {
                Some(hi) => (hi << 9) | ins.src as u32,
                None => ins.src as u32,
            }
        } else {
            0
        }
    }

    fn read_s(&mut self, ins: &Instruction, shared: &HubShared) -> u32 {
        if ins.im {
            self.operand_s(ins)
        } else {
            self.read_reg(ins.src, shared)
        }
    }

    fn addr20(&mut self, ins: &Instruction) -> u32 {
        match self.aug_s.take() {
            Some(hi) => (hi << 9) | ins.src as u32,
            None => ((ins.dst as u32) << 9) | ins.src as u32,
        }
    }

    fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(1);
    }

    fn fetch_one(&self, shared: &HubShared) -> u32 {
        if self.pc < COG_RAM_LONGS as u32 {
            self.cog_ram[self.pc as usize]
        } else if self.pc < HUB_EXEC_BASE {
            self.lut_ram[(self.pc - LUT_BASE) as usize]
        } else {
            shared.read_long(self.pc.wrapping_mul(4))
        }
    }

    fn enter_interrupt(&mut self, level: usize) -> StepOutcome {
        let (ijmp, iret) = match level {
            0 => (regs::IJMP1, regs::IRET1),
            1 => (regs::IJMP2, regs::IRET2),
            _ => (regs::IJMP3, regs::IRET3),
        };
        let packed = (self.pc & 0xF_FFFF) | ((self.c as u32) << 20) | ((self.z as u32) << 21);
        self.cog_ram[iret as usize & 0x1FF] = packed;
        self.pc = self.cog_ram[ijmp as usize & 0x1FF];
        no_command(ALU_CYCLES)
    }

    /// Advance this cog by exactly one instruction (or one leapt-over
    /// `skipf` slot, or one interrupt-vector entry) through the
    /// seven-step dispatch order.
    pub fn step(&mut self, shared: &mut HubShared) -> StepOutcome {
        // 1. Interrupt/event flag update.
        interrupt::update_counters(&mut self.flags, self.ct1, self.ct2, self.ct3, shared.counter());
        interrupt::update_pattern(&mut self.flags, &self.pat, shared.pin());
        interrupt::update_pin_edge(&mut self.flags, &mut self.pin, shared.pin());
        self.flags.set(CogFlags::QMT, self.cordic.is_empty());

        if let Some(level) = interrupt::promote(&mut self.int, self.flags) {
            return self.enter_interrupt(level);
        }

        // 2. Fetch, leaping over any instruction `skipf`'s low bit marks.
        let mut guard = 0;
        while self.skipf & 1 != 0 && guard < 32 {
            self.skipf >>= 1;
            self.advance_pc();
            guard += 1;
        }
        let word = self.fetch_one(shared);
        self.last_ir = word;
        self.advance_pc();

        match decode_any(word) {
            DecodedWord::Augment { cond, dest, payload } => {
                if cond.holds(self.c, self.z) {
                    if dest {
                        self.aug_d = Some(payload);
                    } else {
                        self.aug_s = Some(payload);
                    }
                }
                no_command(ALU_CYCLES)
            }
            DecodedWord::Instr(ins) => self.execute(ins, shared),
        }
    }

    fn execute(&mut self, ins: Instruction, shared: &mut HubShared) -> StepOutcome {
        // 3. Condition and skip.
        if !ins.cond.holds(self.c, self.z) {
            return no_command(COND_FAIL_CYCLES);
        }
        let skip_bit = self.skip & 1 != 0;
        self.skip >>= 1;
        if skip_bit {
            return no_command(COND_FAIL_CYCLES);
        }

        let pc_before_dispatch = self.pc;
        let outcome = self.dispatch(ins, shared);

        // `_RET_` (cond nibble 0): execute always, then return — pop the
        // call stack into `pc` — if the instruction itself didn't already
        // branch. Any instruction may carry this condition, not just the
        // `RET` mnemonic; a branch is detected by `pc` having moved off
        // the straight-line address already set by the fetch step.
        if ins.cond == Condition::Ret && self.pc == pc_before_dispatch {
            self.pc = flow::pop(&mut self.stack, &mut self.k);
        }

        // 7. REP bookkeeping.
        if ins.inst != Mnemonic::REP {
            if let Some(block) = self.rep_block {
                self.rep_offset += 1;
                if self.rep_offset >= block {
                    self.rep_offset = 0;
                    let keep_going = if self.rep_infinite {
                        true
                    } else {
                        self.rep_times = self.rep_times.saturating_sub(1);
                        self.rep_times > 0
                    };
                    if keep_going {
                        self.pc = self.pc.wrapping_sub(block);
                    } else {
                        self.rep_block = None;
                    }
                }
            }
        }

        outcome
    }

    fn apply_alu(&mut self, ins: &Instruction, r: alu::AluResult) {
        if r.writes_d {
            let d = ins.dst;
            self.write_reg_self(d, r.result);
        }
        if ins.wc {
            if let Some(c) = r.c {
                self.c = c;
            }
        }
        if ins.wz {
            if let Some(z) = r.z {
                self.z = z;
            }
        }
    }

    fn write_reg_self(&mut self, addr: u16, value: u32) {
        self.cog_ram[addr as usize & 0x1FF] = value;
    }

    fn dispatch(&mut self, ins: Instruction, shared: &mut HubShared) -> StepOutcome {
        match ins.inst {
            Mnemonic::WRBYTE | Mnemonic::WRWORD | Mnemonic::WRLONG => {
                self.dispatch_hub_write(ins, shared)
            }
            Mnemonic::RDBYTE | Mnemonic::RDWORD | Mnemonic::RDLONG => {
                self.dispatch_hub_read(ins, shared)
            }
            Mnemonic::RDLUT => {
                let index = if ins.im { self.operand_s(&ins) } else { ins.src as u32 };
                let value = self.lut_ram[index as usize & 0x1FF];
                let d_val = value;
                self.write_reg(ins.dst, d_val, shared);
                if ins.wz {
                    self.z = d_val == 0;
                }
                no_command(ALU_CYCLES)
            }
            Mnemonic::JMP => {
                let target = flow::branch_target(
                    self.pc,
                    ins.im,
                    ins.src,
                    self.aug_s.take(),
                    self.read_reg(ins.src, shared),
                );
                self.pc = target;
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALL | Mnemonic::CALLA | Mnemonic::CALLB => {
                flow::push(&mut self.stack, &mut self.k, self.pc);
                let target = flow::branch_target(
                    self.pc,
                    ins.im,
                    ins.src,
                    self.aug_s.take(),
                    self.read_reg(ins.src, shared),
                );
                self.pc = target;
                no_command(ALU_CYCLES)
            }
            Mnemonic::RET => {
                self.pc = flow::pop(&mut self.stack, &mut self.k);
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALLD => {
                self.write_reg(ins.dst, self.pc, shared);
                let target = flow::branch_target(
                    self.pc,
                    ins.im,
                    ins.src,
                    self.aug_s.take(),
                    self.read_reg(ins.src, shared),
                );
                self.pc = target;
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALLP => {
                flow::push(&mut self.stack, &mut self.k, self.pc);
                let target = flow::branch_target(
                    self.pc,
                    ins.im,
                    ins.src,
                    self.aug_s.take(),
                    self.read_reg(ins.src, shared),
                );
                self.pc = target;
                no_command(ALU_CYCLES)
            }
            Mnemonic::DJNZ => {
                let d_val = self.read_reg(ins.dst, shared);
                let nv = d_val.wrapping_sub(1);
                self.write_reg(ins.dst, nv, shared);
                if ins.wz {
                    self.z = nv == 0;
                }
                if nv != 0 {
                    let target = flow::branch_target(
                        self.pc,
                        ins.im,
                        ins.src,
                        self.aug_s.take(),
                        self.read_reg(ins.src, shared),
                    );
                    self.pc = target;
                } else {
                    self.aug_s = None;
                }
                no_command(ALU_CYCLES)
            }
            Mnemonic::TJZ => {
                let d_val = self.read_reg(ins.dst, shared);
                if ins.wz {
                    self.z = d_val == 0;
                }
                if d_val == 0 {
                    let target = flow::branch_target(
                        self.pc,
                        ins.im,
                        ins.src,
                        self.aug_s.take(),
                        self.read_reg(ins.src, shared),
                    );
                    self.pc = target;
                } else {
                    self.aug_s = None;
                }
                no_command(ALU_CYCLES)
            }
            Mnemonic::JMP_ABS => {
                self.pc = self.addr20(&ins);
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALL_ABS | Mnemonic::CALLA_ABS | Mnemonic::CALLB_ABS => {
                flow::push(&mut self.stack, &mut self.k, self.pc);
                self.pc = self.addr20(&ins);
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALLD_PA_ABS => {
                let ret = self.pc;
                self.cog_ram[regs::PA as usize] = ret;
                self.pc = self.addr20(&ins);
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALLD_PB_ABS => {
                let ret = self.pc;
                self.cog_ram[regs::PB as usize] = ret;
                self.pc = self.addr20(&ins);
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALLD_PTRA_ABS => {
                let ret = self.pc;
                self.cog_ram[regs::PTRA as usize] = ret;
                self.pc = self.addr20(&ins);
                no_command(ALU_CYCLES)
            }
            Mnemonic::CALLD_PTRB_ABS => {
                let ret = self.pc;
                self.cog_ram[regs::PTRB as usize] = ret;
                self.pc = self.addr20(&ins);
                no_command(ALU_CYCLES)
            }
            Mnemonic::LOC_PA => {
                let v = self.addr20(&ins);
                self.cog_ram[regs::PA as usize] = v;
                no_command(ALU_CYCLES)
            }
            Mnemonic::LOC_PB => {
                let v = self.addr20(&ins);
                self.cog_ram[regs::PB as usize] = v;
                no_command(ALU_CYCLES)
            }
            Mnemonic::LOC_PTRA => {
                let v = self.addr20(&ins);
                self.cog_ram[regs::PTRA as usize] = v;
                no_command(ALU_CYCLES)
            }
            Mnemonic::LOC_PTRB => {
                let v = self.addr20(&ins);
                self.cog_ram[regs::PTRB as usize] = v;
                no_command(ALU_CYCLES)
            }
            Mnemonic::REP => {
                let d_val = self.read_reg(ins.dst, shared);
                let s_val = self.read_s(&ins, shared);
                self.rep_block = Some(d_val);
                self.rep_offset = 0;
                if s_val == 0 {
                    self.rep_infinite = true;
                    self.rep_times = 0;
                } else {
                    self.rep_infinite = false;
                    self.rep_times = s_val;
                }
                no_command(ALU_CYCLES)
            }
            Mnemonic::WAITX => {
                let cycles = self.read_s(&ins, shared).max(1);
                no_command(cycles)
            }
            Mnemonic::GETCT => {
                let v = shared.counter() as u32;
                self.write_reg(ins.dst, v, shared);
                no_command(ALU_CYCLES)
            }
            Mnemonic::WAITCT1 => {
                let now = shared.counter() as u32;
                let cycles = self.ct1.wrapping_sub(now).max(1);
                no_command(cycles)
            }
            Mnemonic::ALLOWI => {
                self.int.disabled = false;
                no_command(ALU_CYCLES)
            }
            Mnemonic::STALLI => {
                self.int.disabled = true;
                no_command(ALU_CYCLES)
            }
            Mnemonic::COGID => {
                let v = self.id as u32;
                self.write_reg(ins.dst, v, shared);
                if ins.wc {
                    self.c = true;
                }
                no_command(ALU_CYCLES)
            }
            Mnemonic::COGSTOP => {
                let d_val = self.read_reg(ins.dst, shared);
                let target = d_val as u8 & 0xF;
                if target == self.id {
                    self.running = false;
                }
                StepOutcome { cycles: ALU_CYCLES, command: Some(CogCommand::Stop { cog: target }) }
            }
            Mnemonic::COGINIT => {
                let d_val = self.read_reg(ins.dst, shared);
                let addr = self.read_s(&ins, shared);
                let setq = self.setq.take().unwrap_or(0);
                let cog = if d_val & 0x10 != 0 { None } else { Some((d_val & 0xF) as u8) };
                StepOutcome {
                    cycles: ALU_CYCLES,
                    command: Some(CogCommand::Start { cog, addr, setq }),
                }
            }
            Mnemonic::LOCK => self.dispatch_lock(ins, shared),
            Mnemonic::GETQX => {
                let (x, c) = match self.cordic.peek() {
                    Some((x, _)) => (x, false),
                    None => (0, true),
                };
                self.write_reg(ins.dst, x, shared);
                if ins.wc {
                    self.c = c;
                }
                no_command(ALU_CYCLES)
            }
            Mnemonic::GETQY => {
                let (y, c) = match self.cordic.peek() {
                    Some((_, y)) => (y, false),
                    None => (0, true),
                };
                self.cordic.advance();
                self.write_reg(ins.dst, y, shared);
                if ins.wc {
                    self.c = c;
                }
                no_command(ALU_CYCLES)
            }
            Mnemonic::QMUL => {
                let d_val = self.read_reg(ins.dst, shared);
                let s_val = self.read_s(&ins, shared);
                let (x, y) = cordic::qmul(d_val, s_val);
                self.cordic.post(x, y);
                no_command(ALU_CYCLES)
            }
            Mnemonic::QDIV => {
                let d_val = self.read_reg(ins.dst, shared);
                let s_val = self.read_s(&ins, shared);
                let (x, y) = cordic::qdiv(d_val, s_val);
                self.cordic.post(x, y);
                no_command(ALU_CYCLES)
            }
            Mnemonic::QSQRT => {
                let d_val = self.read_reg(ins.dst, shared);
                let s_val = self.read_s(&ins, shared);
                let (x, y) = cordic::qsqrt(d_val, s_val);
                self.cordic.post(x, y);
                no_command(ALU_CYCLES)
            }
            Mnemonic::HUBSET => {
                self.hubset = self.read_s(&ins, shared);
                no_command(ALU_CYCLES)
            }
            Mnemonic::XORO32 => {
                if ins.im {
                    let seed = self.operand_s(&ins) as u64;
                    shared.seed(seed, 0);
                }
                let v = shared.random_next() as u32;
                self.write_reg(ins.dst, v, shared);
                no_command(ALU_CYCLES)
            }
            Mnemonic::SETQ => {
                let v = self.read_s(&ins, shared);
                self.setq = Some(v);
                no_command(ALU_CYCLES)
            }
            Mnemonic::TESTP => {
                let d_val = self.read_reg(ins.dst, shared);
                let bit = (shared.pin() >> (d_val as u32 & 63)) & 1 != 0;
                if ins.wc {
                    self.c = bit;
                }
                if ins.wz {
                    self.z = bit;
                }
                no_command(ALU_CYCLES)
            }
            _ => {
                let d_val = self.read_reg(ins.dst, shared);
                let s_val = self.read_s(&ins, shared);
                let r = alu::eval(ins.inst, d_val, s_val, self.c, self.z);
                self.apply_alu(&ins, r);
                no_command(ALU_CYCLES)
            }
        }
    }

    fn dispatch_hub_write(&mut self, ins: Instruction, shared: &mut HubShared) -> StepOutcome {
        let width = match ins.inst {
            Mnemonic::WRBYTE => Width::Byte,
            Mnemonic::WRWORD => Width::Word,
            _ => Width::Long,
        };
        let value = self.read_reg(ins.dst, shared);
        let addr = self.resolve_hub_addr(&ins, width);
        match width {
            Width::Byte => shared.write_byte(addr, value as u8),
            Width::Word => shared.write_word(addr, value as u16),
            Width::Long => shared.write_long(addr, value),
        }
        let cycles = memory::hub_cycles(self.id, addr, shared.hubslots(), shared.cogindex());
        no_command(cycles)
    }

    fn dispatch_hub_read(&mut self, ins: Instruction, shared: &mut HubShared) -> StepOutcome {
        let width = match ins.inst {
            Mnemonic::RDBYTE => Width::Byte,
            Mnemonic::RDWORD => Width::Word,
            _ => Width::Long,
        };
        let addr = self.resolve_hub_addr(&ins, width);
        let value = match width {
            Width::Byte => shared.read_byte(addr) as u32,
            Width::Word => shared.read_word(addr) as u32,
            Width::Long => shared.read_long(addr),
        };
        self.write_reg(ins.dst, value, shared);
        if ins.wz {
            self.z = value == 0;
        }
        if ins.wc {
            self.c = false;
        }
        let cycles = memory::hub_cycles(self.id, addr, shared.hubslots(), shared.cogindex());
        no_command(cycles)
    }

    fn resolve_hub_addr(&mut self, ins: &Instruction, width: Width) -> u32 {
        if ins.im {
            self.operand_s(ins)
        } else {
            let resolved = memory::resolve(&self.cog_ram, ins.src, width);
            if let Some((reg, val)) = resolved.writeback {
                self.cog_ram[reg as usize & 0x1FF] = val;
            }
            resolved.addr
        }
    }

    fn dispatch_lock(&mut self, ins: Instruction, shared: &mut HubShared) -> StepOutcome {
        let d_val = self.read_reg(ins.dst, shared);
        let sub = ins.src & 0x3;
        match sub {
            0 => {
                let idx = shared.lock_new();
                let val = idx.map(|i| i as u32).unwrap_or(0xFFFF_FFFF);
                self.write_reg(ins.dst, val, shared);
                if ins.wc {
                    self.c = idx.is_none();
                }
            }
            1 => shared.lock_ret(d_val as u8 & 0xF),
            2 => {
                let got = shared.lock_try(d_val as u8 & 0xF);
                if ins.wc {
                    self.c = got;
                }
            }
            _ => {
                let was = shared.lock_rel(d_val as u8 & 0xF);
                if ins.wc {
                    self.c = was;
                }
            }
        }
        no_command(ALU_CYCLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_immediate_advances_pc_and_writes_d() {
        let mut cog = Cog::new(0);
        let ins = Instruction {
            cond: p2_asm::Condition::Always,
            inst: Mnemonic::ADD,
            wc: false,
            wz: true,
            im: true,
            dst: 0,
            src: 5,
        };
        cog.cog_ram[0] = ins.encode();
        cog.start(0, 0, 0);
        let mut hub = crate::hub::Hub::new(1);
        let outcome = cog.step(hub.shared_mut());
        assert_eq!(cog.rd_cog(0), 5);
        assert_eq!(cog.pc(), 1);
        assert!(outcome.command.is_none());
    }

    #[test]
    fn skip_low_bit_suppresses_one_instruction() {
        let mut cog = Cog::new(0);
        let nop = Instruction {
            cond: p2_asm::Condition::Always,
            inst: Mnemonic::ADD,
            wc: false,
            wz: false,
            im: true,
            dst: 1,
            src: 9,
        };
        cog.cog_ram[0] = nop.encode();
        cog.start(0, 0, 0);
        cog.skip = 0b1;
        let mut hub = crate::hub::Hub::new(1);
        cog.step(hub.shared_mut());
        assert_eq!(cog.rd_cog(1), 0);
    }

    #[test]
    fn augs_latches_for_next_immediate_only() {
        let mut cog = Cog::new(0);
        let word = p2_asm::encode_augment(p2_asm::Condition::Always, false, 0x2);
        cog.cog_ram[0] = word;
        let add = Instruction {
            cond: p2_asm::Condition::Always,
            inst: Mnemonic::ADD,
            wc: false,
            wz: false,
            im: true,
            dst: 1,
            src: 1,
        };
        cog.cog_ram[1] = add.encode();
        cog.start(0, 0, 0);
        let mut hub = crate::hub::Hub::new(1);
        cog.step(hub.shared_mut());
        assert!(cog.rd_s_aug().is_some());
        cog.step(hub.shared_mut());
        assert_eq!(cog.rd_cog(1), (0x2 << 9) | 1);
        assert!(cog.rd_s_aug().is_none());
    }

    #[test]
    fn ret_condition_returns_after_a_non_branching_instruction() {
        let mut cog = Cog::new(0);
        let ins = Instruction {
            cond: Condition::Ret,
            inst: Mnemonic::ADD,
            wc: false,
            wz: false,
            im: true,
            dst: 0,
            src: 1,
        };
        cog.cog_ram[5] = ins.encode();
        cog.start(5, 0, 0);
        flow::push(&mut cog.stack, &mut cog.k, 0x123);
        let mut hub = crate::hub::Hub::new(1);
        cog.step(hub.shared_mut());
        assert_eq!(cog.rd_cog(0), 1);
        assert_eq!(cog.pc(), 0x123);
    }

    #[test]
    fn ret_condition_does_not_override_an_actual_branch() {
        let mut cog = Cog::new(0);
        let jmp = Instruction {
            cond: Condition::Ret,
            inst: Mnemonic::JMP,
            wc: false,
            wz: false,
            im: true,
            dst: 0,
            src: 0x010,
        };
        cog.cog_ram[0] = jmp.encode();
        cog.start(0, 0, 0);
        flow::push(&mut cog.stack, &mut cog.k, 0x123);
        let mut hub = crate::hub::Hub::new(1);
        cog.step(hub.shared_mut());
        assert_ne!(cog.pc(), 0x123);
    }
}
