use p2_types::Word;

use crate::condition::Condition;
use crate::mnemonic::Mnemonic;

/// The canonical 32-bit Propeller2 instruction word:
/// `EEEE OOOOOOO CZI DDDDDDDDD SSSSSSSSS`
/// (cond:4, inst:7, wc:1, wz:1, im:1, dst:9, src:9), MSB to LSB.
///
/// This is a plain bitfield view over one machine word, not a tagged
/// union — the same shape serves every instruction, with `dst`/`src`
/// reinterpreted as register index, literal, or branch displacement
/// depending on [`Mnemonic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Conditional-execution code.
    pub cond: Condition,
    /// Primary instruction selector.
    pub inst: Mnemonic,
    /// Write-C flag.
    pub wc: bool,
    /// Write-Z flag.
    pub wz: bool,
    /// Immediate-source flag: when set, `src` is a literal rather than a
    /// register index.
    pub im: bool,
    /// Destination field (register index, or immediate for `##D` forms).
    pub dst: u16,
    /// Source field (register index, literal, or branch displacement).
    pub src: u16,
}

const DST_SHIFT: u32 = 9;
const SRC_MASK: u32 = 0x1FF;
const DST_MASK: u32 = 0x1FF;
const IM_SHIFT: u32 = 18;
const WZ_SHIFT: u32 = 19;
const WC_SHIFT: u32 = 20;
const INST_SHIFT: u32 = 21;
const INST_MASK: u32 = 0x7F;
const COND_SHIFT: u32 = 28;

impl Instruction {
    /// Decode a 32-bit word into its constituent fields.
    pub fn decode(word: Word) -> Instruction {
        Instruction {
            cond: Condition::from_nibble((word >> COND_SHIFT) as u8 & 0xF),
            inst: Mnemonic::from_inst((word >> INST_SHIFT) as u8 & INST_MASK as u8),
            wc: (word >> WC_SHIFT) & 1 != 0,
            wz: (word >> WZ_SHIFT) & 1 != 0,
            im: (word >> IM_SHIFT) & 1 != 0,
            dst: ((word >> DST_SHIFT) & DST_MASK) as u16,
            src: (word & SRC_MASK) as u16,
        }
    }

    /// Encode back into a 32-bit word.
    pub fn encode(self) -> Word {
        let mut w = (self.cond.to_nibble() as u32) << COND_SHIFT;
        w |= (self.inst.to_inst() as u32 & INST_MASK) << INST_SHIFT;
        w |= (self.wc as u32) << WC_SHIFT;
        w |= (self.wz as u32) << WZ_SHIFT;
        w |= (self.im as u32) << IM_SHIFT;
        w |= (self.dst as u32 & DST_MASK) << DST_SHIFT;
        w |= self.src as u32 & SRC_MASK;
        w
    }
}

/// The 5-bit code occupying `inst`'s top bits when a word is an `AUGS`/
/// `AUGD` prefix rather than an ordinary instruction: `cond(4) code(5)
/// payload(23)`, freeing the full 23-bit field the one-shot immediate
/// augmentation needs — a 7-bit `inst` only leaves
/// 21 payload bits, one short of the 9-bit low half this augments.
const AUGS_CODE: u32 = 0b11110;
const AUGD_CODE: u32 = 0b11111;
const AUG_CODE_SHIFT: u32 = 23;
const AUG_PAYLOAD_MASK: u32 = 0x7F_FFFF;

/// Either a decoded ordinary instruction, or an `AUGS`/`AUGD` prefix word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedWord {
    /// A normal instruction.
    Instr(Instruction),
    /// An augmentation prefix: `dest` is `true` for `AUGD`, `false` for
    /// `AUGS`; `payload` is its 23-bit field.
    Augment { cond: Condition, dest: bool, payload: u32 },
}

/// Decode a word, checking the `AUGS`/`AUGD` bit pattern before falling
/// back to an ordinary [`Instruction::decode`].
pub fn decode_any(word: Word) -> DecodedWord {
    let code = (word >> AUG_CODE_SHIFT) & 0x1F;
    if code == AUGS_CODE || code == AUGD_CODE {
        return DecodedWord::Augment {
            cond: Condition::from_nibble((word >> COND_SHIFT) as u8 & 0xF),
            dest: code == AUGD_CODE,
            payload: word & AUG_PAYLOAD_MASK,
        };
    }
    DecodedWord::Instr(Instruction::decode(word))
}

/// Encode an `AUGS` (`dest = false`) or `AUGD` (`dest = true`) prefix word
/// carrying the top 23 bits of a 32-bit immediate.
pub fn encode_augment(cond: Condition, dest: bool, payload: u32) -> Word {
    let code = if dest { AUGD_CODE } else { AUGS_CODE };
    (cond.to_nibble() as u32) << COND_SHIFT | code << AUG_CODE_SHIFT | (payload & AUG_PAYLOAD_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augment_round_trips() {
        let word = encode_augment(Condition::Always, true, 0x7F_FFFE);
        match decode_any(word) {
            DecodedWord::Augment { dest, payload, .. } => {
                assert!(dest);
                assert_eq!(payload, 0x7F_FFFE);
            }
            _ => panic!("expected an augment word"),
        }
    }

    #[test]
    fn ordinary_instruction_is_not_mistaken_for_augment() {
        let ins = Instruction {
            cond: Condition::Always,
            inst: Mnemonic::ADD,
            wc: false,
            wz: false,
            im: false,
            dst: 1,
            src: 1,
        };
        assert_eq!(decode_any(ins.encode()), DecodedWord::Instr(ins));
    }

    #[test]
    fn round_trips_add_with_wc() {
        let ins = Instruction {
            cond: Condition::Always,
            inst: Mnemonic::ADD,
            wc: true,
            wz: false,
            im: true,
            dst: 1,
            src: 1,
        };
        let word = ins.encode();
        assert_eq!(Instruction::decode(word), ins);
    }

    #[test]
    fn fields_land_in_documented_bit_positions() {
        let ins = Instruction {
            cond: Condition::from_nibble(0b1010),
            inst: Mnemonic::XOR,
            wc: true,
            wz: true,
            im: false,
            dst: 0x1FF,
            src: 0x0AA,
        };
        let word = ins.encode();
        assert_eq!((word >> 28) & 0xF, 0b1010);
        assert_eq!((word >> 21) & 0x7F, Mnemonic::XOR.to_inst() as u32);
        assert_eq!((word >> 20) & 1, 1);
        assert_eq!((word >> 19) & 1, 1);
        assert_eq!((word >> 18) & 1, 0);
        assert_eq!((word >> 9) & 0x1FF, 0x1FF);
        assert_eq!(word & 0x1FF, 0x0AA);
    }
}
