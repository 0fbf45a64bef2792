//! Disassembler for the Propeller2 instruction word:
//! given a 32-bit opcode and the program counter it was fetched from,
//! produce mnemonic text suitable for re-assembly and a short human
//! description. Stateless except for the one-shot `AUGS`/`AUGD` latch
//! that a caller feeding a straight-line instruction stream carries
//! across calls, mirroring the cog's own augmentation latch.
//!
//! Uses a coarse, table-driven `OperandShape` dispatch rather than one
//! routine per mnemonic, the same generalization `p2-asm::Mnemonic`
//! already makes for the encoder.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

use alloc::format;
use alloc::string::String;

use p2_asm::{decode_any, Condition, DecodedWord, Instruction, Mnemonic, OperandShape};
use p2_types::Word;

/// The cog's named special-purpose registers (`p2_cogreg_e`), the
/// disassembler's mirror of `p2-assembler`'s `SPECIAL_REGS` table: an
/// address in this range is printed by name rather than as a bare hex
/// literal.
const SPECIAL_REGS: &[(u16, &str)] = &[
    (0x1F0, "IJMP3"),
    (0x1F1, "IRET3"),
    (0x1F2, "IJMP2"),
    (0x1F3, "IRET2"),
    (0x1F4, "IJMP1"),
    (0x1F5, "IRET1"),
    (0x1F6, "PA"),
    (0x1F7, "PB"),
    (0x1F8, "PTRA"),
    (0x1F9, "PTRB"),
    (0x1FA, "DIRA"),
    (0x1FB, "DIRB"),
    (0x1FC, "OUTA"),
    (0x1FD, "OUTB"),
    (0x1FE, "INA"),
    (0x1FF, "INB"),
];

fn register_name(addr: u16) -> String {
    if let Some((_, name)) = SPECIAL_REGS.iter().find(|(a, _)| *a == addr) {
        return String::from(*name);
    }
    format!("${:03X}", addr)
}

/// Hub-memory and LUT access mnemonics whose `S` field may carry the
/// `1SUPIIIII` indirect-pointer encoding instead of a plain register or immediate.
fn takes_pointer_src(m: Mnemonic) -> bool {
    matches!(
        m,
        Mnemonic::RDBYTE
            | Mnemonic::RDWORD
            | Mnemonic::RDLONG
            | Mnemonic::WRBYTE
            | Mnemonic::WRWORD
            | Mnemonic::WRLONG
            | Mnemonic::RDLUT
    )
}

/// Decode the `1SUPIIIII` indirect-pointer field, returning the rendered
/// operand text if `src`'s top bit marks it as a pointer form. `None` means `src` is a plain register index.
fn format_pointer(src: u16) -> Option<String> {
    if src & 0x100 == 0 {
        return None;
    }
    let base = if src & 0x080 != 0 { "PTRB" } else { "PTRA" };
    let update = src & 0x040 != 0;
    let pre = src & 0x020 != 0;
    let raw = (src & 0x1F) as u32;
    let offset = p2_types::sign_extend(raw, 5);

    if !update {
        return Some(if offset == 0 {
            String::from(base)
        } else {
            format!("{base}[{offset}]")
        });
    }
    Some(match (pre, offset) {
        (true, 1) => format!("++{base}"),
        (false, 1) => format!("{base}++"),
        (true, -1) => format!("--{base}"),
        (false, -1) => format!("{base}--"),
        (true, n) => format!("++{base}[{n}]"),
        (false, n) => format!("{base}++[{n}]"),
    })
}

fn format_reg_operand(mnemonic: Mnemonic, is_src: bool, im: bool, field: u16, aug: Option<u32>) -> String {
    if is_src && im {
        let value = match aug {
            Some(hi) => (hi << 9) | field as u32,
            None => field as u32,
        };
        let prefix = if aug.is_some() { "##" } else { "#" };
        return format!("{prefix}{}", p2_types::format_grouped(value as u64, 32, p2_types::NumberBase::Hex));
    }
    if is_src && takes_pointer_src(mnemonic) {
        if let Some(ptr) = format_pointer(field) {
            return ptr;
        }
    }
    register_name(field)
}

fn suffix_text(wc: bool, wz: bool) -> &'static str {
    match (wc, wz) {
        (true, true) => " WCZ",
        (true, false) => " WC",
        (false, true) => " WZ",
        (false, false) => "",
    }
}

fn cond_prefix(cond: Condition) -> String {
    match cond.mnemonic() {
        Some(m) => format!("{m} "),
        None => String::new(),
    }
}

/// Render the operand list for an ordinary (non-augmented) instruction
/// word, per its [`OperandShape`].
fn format_operands(ins: Instruction, aug: Option<u32>) -> String {
    match ins.inst.shape() {
        OperandShape::None => String::new(),
        OperandShape::Addr20 => {
            let addr = ((ins.dst as u32) << 9) | ins.src as u32;
            format!(" {}", p2_types::format_grouped(addr as u64, 20, p2_types::NumberBase::Hex))
        }
        OperandShape::Imm23 => {
            // Never reached: AUGS/AUGD words are intercepted by
            // `decode_any` before `format_operands` runs.
            String::new()
        }
        OperandShape::DstSrc => {
            if is_source_only(ins.inst) {
                format!(" {}", format_reg_operand(ins.inst, true, ins.im, ins.src, aug))
            } else if ins.dst == ins.src && !ins.im {
                // A bare `D` shorthand (e.g. `NOT x`) encodes S == D; the
                // assembler's `encode_dst_src` does exactly this when only
                // one operand is written, so mirror it on the way back out.
                format!(" {}", register_name(ins.dst))
            } else {
                let s = format_reg_operand(ins.inst, true, ins.im, ins.src, aug);
                format!(" {},{s}", register_name(ins.dst))
            }
        }
    }
}

fn is_source_only(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::JMP | Mnemonic::CALL | Mnemonic::CALLA | Mnemonic::CALLB)
}

/// True for the mnemonics whose `S` field, when not immediate, is
/// relative to the instruction following it rather than an absolute
/// target.
fn is_relative_branch(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::JMP | Mnemonic::CALL | Mnemonic::CALLA | Mnemonic::CALLB | Mnemonic::DJNZ | Mnemonic::TJZ)
}

/// Resolve a relative-branch immediate back to an absolute hex literal,
/// the form the assembler's `JMP #A` syntax re-derives an offset from.
fn resolve_relative(ins: Instruction, next_pc: u32, aug: Option<u32>) -> Option<String> {
    if !ins.im || !is_relative_branch(ins.inst) {
        return None;
    }
    let raw = match aug {
        Some(hi) => (hi << 9) | ins.src as u32,
        None => p2_types::sign_extend(ins.src as u32, 9) as u32,
    };
    let target = next_pc.wrapping_add(raw);
    let prefix = if aug.is_some() { "##" } else { "#" };
    Some(format!(" {prefix}{}", p2_types::format_grouped(target as u64, 20, p2_types::NumberBase::Hex)))
}

/// One disassembled line: the mnemonic text and the PC it was fetched
/// from. `text` alone is enough to feed back into the assembler and
/// recover the identical opcode, modulo
/// symbolic register names this stateless view has no way to recover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmLine {
    /// The program counter (cog/lut long index, or hub byte address in
    /// hub-exec mode) this word was fetched from.
    pub pc: u32,
    /// The raw 32-bit word.
    pub word: Word,
    /// Re-assemblable mnemonic text.
    pub text: String,
}

/// Disassemble a single, non-augmented instruction word. Most callers
/// driving a real instruction stream should use [`Disassembler`]
/// instead, since a preceding `AUGS`/`AUGD` changes this word's `S`/`D`
/// rendering.
pub fn disassemble(pc: u32, word: Word) -> DisasmLine {
    Disassembler::new().feed(pc, word)
}

/// A stateful disassembler carrying the one-shot `AUGS`/`AUGD` latch
/// across a straight-line instruction stream, the same
/// latch shape the cog itself keeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disassembler {
    aug_s: Option<u32>,
    aug_d: Option<u32>,
}

impl Disassembler {
    /// A fresh disassembler with no pending augmentation.
    pub fn new() -> Self {
        Disassembler { aug_s: None, aug_d: None }
    }

    /// Feed the next word of a stream. If `word` is an `AUGS`/`AUGD`
    /// prefix, its payload is latched and the returned line documents the
    /// prefix itself; the *following* call to `feed` consumes the latch.
    pub fn feed(&mut self, pc: u32, word: Word) -> DisasmLine {
        match decode_any(word) {
            DecodedWord::Augment { cond, dest, payload } => {
                if dest {
                    self.aug_d = Some(payload);
                } else {
                    self.aug_s = Some(payload);
                }
                let mnemonic = if dest { "AUGD" } else { "AUGS" };
                let text = format!(
                    "{}{mnemonic} #{}",
                    cond_prefix(cond),
                    p2_types::format_grouped((payload as u64) << 9, 32, p2_types::NumberBase::Hex)
                );
                DisasmLine { pc, word, text }
            }
            DecodedWord::Instr(ins) => {
                let aug_s = self.aug_s.take();
                let _aug_d = self.aug_d.take();
                let step = if pc < 0x400 { 1 } else { 4 };
                let next_pc = pc.wrapping_add(step);

                let operand_text = resolve_relative(ins, next_pc, aug_s)
                    .unwrap_or_else(|| format_operands(ins, aug_s));
                let text =
                    format!("{}{}{}{}", cond_prefix(ins.cond), ins.inst, operand_text, suffix_text(ins.wc, ins.wz));
                DisasmLine { pc, word, text }
            }
        }
    }

    /// Human description: a plain-English gloss of what the instruction
    /// does, independent of its re-assemblable `text`.
    pub fn describe(&self, ins: &Instruction) -> String {
        let cond = match ins.cond.mnemonic() {
            Some(m) => format!(" when {m}"),
            None => String::new(),
        };
        format!("{} D=${:03X} S=${:03X}{cond}", ins.inst, ins.dst, ins.src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p2_asm::encode_augment;

    #[test]
    fn plain_add_round_trips_through_shape() {
        let ins = Instruction { cond: Condition::Always, inst: Mnemonic::ADD, wc: true, wz: false, im: true, dst: 1, src: 1 };
        let line = disassemble(0, ins.encode());
        assert!(line.text.starts_with("ADD $001,#"));
        assert!(line.text.ends_with(" WC"));
    }

    #[test]
    fn no_condition_prints_no_prefix() {
        let ins = Instruction { cond: Condition::Always, inst: Mnemonic::MOV, wc: false, wz: false, im: false, dst: 2, src: 3 };
        let line = disassemble(0, ins.encode());
        assert_eq!(line.text, "MOV $002,$003");
    }

    #[test]
    fn conditional_prefix_is_rendered() {
        let ins = Instruction { cond: Condition::C, inst: Mnemonic::JMP, wc: false, wz: false, im: true, dst: 0, src: 0x1FE };
        let line = disassemble(0, ins.encode());
        assert!(line.text.starts_with("IF_C JMP #"));
    }

    #[test]
    fn no_operand_mnemonic_has_no_trailing_space() {
        let ins = Instruction { cond: Condition::Always, inst: Mnemonic::RET, wc: false, wz: false, im: false, dst: 0, src: 0 };
        let line = disassemble(0, ins.encode());
        assert_eq!(line.text, "RET");
    }

    #[test]
    fn augmented_source_combines_with_latched_payload() {
        let mut d = Disassembler::new();
        let aug_word = encode_augment(Condition::Always, false, 0xDEAD_BEEFu32 >> 9);
        let _ = d.feed(0, aug_word);
        let ins = Instruction { cond: Condition::Always, inst: Mnemonic::MOV, wc: false, wz: false, im: true, dst: 1, src: (0xDEAD_BEEFu32 & 0x1FF) as u16 };
        let line = d.feed(1, ins.encode());
        assert_eq!(line.text, "MOV $001,##$DEAD_BEEF");
    }

    #[test]
    fn relative_jump_resolves_to_absolute_target() {
        // JMP at cog address 1, offset -2 -> next_pc (2) + (-2) == 0.
        let ins = Instruction { cond: Condition::Always, inst: Mnemonic::JMP, wc: false, wz: false, im: true, dst: 0, src: 0x1FE };
        let line = disassemble(1, ins.encode());
        assert_eq!(line.text, "JMP #$0_0000");
    }

    #[test]
    fn pointer_postinc_operand_is_named() {
        let ins = Instruction {
            cond: Condition::Always,
            inst: Mnemonic::RDLONG,
            wc: false,
            wz: false,
            im: false,
            dst: 5,
            src: 0b1_0_1_00_0001, // bit8=ptr, bit7=PTRA(0), bit6=update(1), bit5=post(0), offset=+1
        };
        let line = disassemble(0, ins.encode());
        assert!(line.text.contains("PTRA++"), "text was {}", line.text);
    }

    #[test]
    fn hub_access_family_recognizes_pointers() {
        assert!(takes_pointer_src(Mnemonic::RDLONG));
        assert!(!takes_pointer_src(Mnemonic::ADD));
    }
}
