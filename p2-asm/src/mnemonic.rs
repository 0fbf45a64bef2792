/// The primary 7-bit instruction field (`inst`), naming all 128 possible
/// values. Enum order is the field's numeric encoding, 0 (`ROR`) through
/// 127 (`AUGD_11`).
///
/// A handful of slots with no single fixed mnemonic are filled in here
/// with the hub-memory, flow-control, CORDIC, lock, and system mnemonics
/// the emulator needs that don't otherwise have a primary slot of their
/// own — `LOCK` folds `LOCKNEW`/`LOCKRET`/`LOCKTRY`/`LOCKREL` into one
/// slot sub-selected by `src`'s low 2 bits, the same sub-select technique
/// used for `TESTB_W`/`TESTBN_W`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::EnumString, strum::Display)]
#[allow(clippy::upper_case_acronyms)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum Mnemonic {
    /// Rotate right.
    ROR = 0,
    /// Rotate left.
    ROL = 1,
    /// Shift right.
    SHR = 2,
    /// Shift left.
    SHL = 3,
    /// Rotate right through carry.
    RCR = 4,
    /// Rotate left through carry.
    RCL = 5,
    /// Arithmetic shift right.
    SAR = 6,
    /// Arithmetic shift left (unsigned, result may overflow into C).
    SAL = 7,
    /// Add.
    ADD = 8,
    /// Add with carry (extended precision).
    ADDX = 9,
    /// Add, signed-overflow into C.
    ADDS = 10,
    /// Add with carry, signed-overflow into C.
    ADDSX = 11,
    /// Subtract.
    SUB = 12,
    /// Subtract with borrow (extended precision).
    SUBX = 13,
    /// Subtract, signed-overflow into C.
    SUBS = 14,
    /// Subtract with borrow, signed-overflow into C.
    SUBSX = 15,
    /// Compare.
    CMP = 16,
    /// Compare with borrow (extended precision).
    CMPX = 17,
    /// Compare, signed.
    CMPS = 18,
    /// Compare with borrow, signed.
    CMPSX = 19,
    /// Compare and repeat (ping-pong D/S roles on swap).
    CMPR = 20,
    /// Compare masked.
    CMPM = 21,
    /// Subtract reverse (`D = S - D`).
    SUBR = 22,
    /// Compare and subtract if >=.
    CMPSUB = 23,
    /// Float compare >=.
    FGE = 24,
    /// Float compare <=.
    FLE = 25,
    /// Float compare >=, signed.
    FGES = 26,
    /// Float compare <=, signed.
    FLES = 27,
    /// Sum if C.
    SUMC = 28,
    /// Sum if NC.
    SUMNC = 29,
    /// Sum if Z.
    SUMZ = 30,
    /// Sum if NZ.
    SUMNZ = 31,
    /// Test bit (write result to Z), low sub-select; also `BITL`.
    TESTB_W = 32,
    /// Test bit, negated; also `BITH`.
    TESTBN_W = 33,
    /// Test bit AND-accumulate; also `BITC`.
    TESTB_AND = 34,
    /// Test bit AND-accumulate, negated; also `BITNC`.
    TESTBN_AND = 35,
    /// Test bit OR-accumulate; also `BITZ`.
    TESTB_OR = 36,
    /// Test bit OR-accumulate, negated; also `BITNZ`.
    TESTBN_OR = 37,
    /// Test bit XOR-accumulate; also `BITRND`.
    TESTB_XOR = 38,
    /// Test bit XOR-accumulate, negated; also `BITNOT`.
    TESTBN_XOR = 39,
    /// Bitwise AND.
    AND = 40,
    /// Bitwise AND-NOT (`D = D & !S`).
    ANDN = 41,
    /// Bitwise OR.
    OR = 42,
    /// Bitwise XOR.
    XOR = 43,
    /// Mux bits if C.
    MUXC = 44,
    /// Mux bits if NC.
    MUXNC = 45,
    /// Mux bits if Z.
    MUXZ = 46,
    /// Mux bits if NZ.
    MUXNZ = 47,
    /// Move.
    MOV = 48,
    /// Bitwise complement.
    NOT = 49,
    /// Absolute value.
    ABS = 50,
    /// Negate.
    NEG = 51,
    /// Negate if C.
    NEGC = 52,
    /// Negate if NC.
    NEGNC = 53,
    /// Negate if Z.
    NEGZ = 54,
    /// Negate if NZ.
    NEGNZ = 55,
    /// Increment modulo (D+1, wrap to 0 at S).
    INCMOD = 56,
    /// Decrement modulo (D-1, wrap to S at 0).
    DECMOD = 57,
    /// Zero-extend at bit S.
    ZEROX = 58,
    /// Sign-extend at bit S.
    SIGNX = 59,
    /// Encode: index of the highest set bit.
    ENCOD = 60,
    /// Population count.
    ONES = 61,
    /// Test (AND, result discarded, flags only).
    TEST = 62,
    /// Test complement.
    TESTN = 63,
    /// Set nibble 0 (immediate nibble index from instruction bits).
    SETNIB_0 = 64,
    /// Set nibble, index from operand.
    SETNIB_1 = 65,
    /// Get nibble 0.
    GETNIB_0 = 66,
    /// Get nibble, index from operand.
    GETNIB_1 = 67,
    /// Rotate-left nibble into place 0.
    ROLNIB_0 = 68,
    /// Rotate-left nibble, index from operand.
    ROLNIB_1 = 69,
    /// Set byte.
    SETBYTE = 70,
    /// Get byte.
    GETBYTE = 71,
    /// Rotate-left byte into place.
    ROLBYTE = 72,
    /// Write a byte to hub RAM.
    WRBYTE = 73,
    /// Write a word to hub RAM.
    WRWORD = 74,
    /// Write a long to hub RAM.
    WRLONG = 75,
    /// Jump, relative or via pointer (`D,S/#S` shape; `JMP #A` is the
    /// common relative-branch form).
    JMP = 76,
    /// Call, pushing the return address onto the hub/cog stack.
    CALL = 77,
    /// Return, popping the stack into `pc`.
    RET = 78,
    /// Call via the A stack.
    CALLA = 79,
    /// Call via the B stack.
    CALLB = 80,
    /// Decrement and jump if not zero.
    DJNZ = 81,
    /// Jump if zero, test only (no decrement).
    TJZ = 82,
    /// Wait a number of sysclocks.
    WAITX = 83,
    /// Begin a REP block: repeat the next `D` instructions `S` times.
    REP = 84,
    /// Read a long from LUT RAM.
    RDLUT = 85,
    /// Read a byte from hub RAM.
    RDBYTE = 86,
    /// Read a word from hub RAM.
    RDWORD = 87,
    /// Read a long from hub RAM.
    RDLONG = 88,
    /// Call, pushing the return address to D; direct 20-bit hub address.
    CALLD = 89,
    /// Call via pointer, pushing return state.
    CALLP = 90,
    /// Return this cog's id (and, with `WC`, whether it is alone).
    COGID = 91,
    /// Stop a cog.
    COGSTOP = 92,
    /// Lock management family, sub-selected by the low 2 bits of `src`:
    /// `0`=`LOCKNEW`, `1`=`LOCKRET`, `2`=`LOCKTRY`, `3`=`LOCKREL`.
    LOCK = 93,
    /// Retrieve the CORDIC pipeline's posted X result.
    GETQX = 94,
    /// Retrieve the CORDIC pipeline's posted Y result.
    GETQY = 95,
    /// Post an unsigned multiply to the CORDIC pipeline.
    QMUL = 96,
    /// Post an unsigned divide to the CORDIC pipeline.
    QDIV = 97,
    /// Post an integer square root to the CORDIC pipeline.
    QSQRT = 98,
    /// Set clock mode / crystal parameters (functional no-op beyond
    /// recording the written value).
    HUBSET = 99,
    /// Advance or reseed the xoroshiro128+ generator.
    XORO32 = 100,
    /// Latch a value for the next instruction's implicit `S` operand
    /// (`SETQ`/`SETQ2`-style block-transfer setup).
    SETQ = 101,
    /// Test a pin's current input level into `C`/`Z`.
    TESTP = 102,
    /// Start a cog running code at a hub address.
    COGINIT = 103,
    /// Read the free-running hub counter.
    GETCT = 104,
    /// Wait until the hub counter equals `CT1`'s target.
    WAITCT1 = 105,
    /// Globally disable interrupts.
    ALLOWI = 106,
    /// Globally re-enable interrupts.
    STALLI = 107,
    /// Jump to a 20-bit absolute address.
    JMP_ABS = 108,
    /// Call (push to hub stack), absolute.
    CALL_ABS = 109,
    /// Call via A-stack, absolute.
    CALLA_ABS = 110,
    /// Call via B-stack, absolute.
    CALLB_ABS = 111,
    /// Call-direct via PA, absolute.
    CALLD_PA_ABS = 112,
    /// Call-direct via PB, absolute.
    CALLD_PB_ABS = 113,
    /// Call-direct via PTRA, absolute.
    CALLD_PTRA_ABS = 114,
    /// Call-direct via PTRB, absolute.
    CALLD_PTRB_ABS = 115,
    /// Load a 20-bit address/immediate pattern into PA.
    LOC_PA = 116,
    /// Load into PB.
    LOC_PB = 117,
    /// Load into PTRA.
    LOC_PTRA = 118,
    /// Load into PTRB.
    LOC_PTRB = 119,
    /// Augment the next instruction's source immediate, bit pattern 00.
    AUGS_00 = 120,
    /// Augment source immediate, bit pattern 01.
    AUGS_01 = 121,
    /// Augment source immediate, bit pattern 10.
    AUGS_10 = 122,
    /// Augment source immediate, bit pattern 11.
    AUGS_11 = 123,
    /// Augment the next instruction's destination immediate, bit pattern 00.
    AUGD_00 = 124,
    /// Augment destination immediate, bit pattern 01.
    AUGD_01 = 125,
    /// Augment destination immediate, bit pattern 10.
    AUGD_10 = 126,
    /// Augment destination immediate, bit pattern 11.
    AUGD_11 = 127,
}

/// Coarse operand shape of a mnemonic, used by both the assembler (to
/// parse operand lists) and the disassembler (to choose a print
/// template) from the `"D,{#}S"`/`"D"`/... template families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// `D,S` (or `D,#S`/`##D,#S` with the `im` flag): the large majority
    /// of ALU, bit-manipulation and memory instructions.
    DstSrc,
    /// `D:S` read together as one 18-to-20-bit absolute address, used by
    /// the unconditional `_ABS` jump/call family.
    Addr20,
    /// `D:S` read together as a 23-bit augmentation payload (`AUGS`/
    /// `AUGD`).
    Imm23,
    /// No meaningful operand (unassigned primary-table slot).
    None,
}

impl Mnemonic {
    /// This mnemonic's operand shape.
    pub const fn shape(self) -> OperandShape {
        match self {
            Mnemonic::JMP_ABS
            | Mnemonic::CALL_ABS
            | Mnemonic::CALLA_ABS
            | Mnemonic::CALLB_ABS
            | Mnemonic::CALLD_PA_ABS
            | Mnemonic::CALLD_PB_ABS
            | Mnemonic::CALLD_PTRA_ABS
            | Mnemonic::CALLD_PTRB_ABS
            | Mnemonic::LOC_PA
            | Mnemonic::LOC_PB
            | Mnemonic::LOC_PTRA
            | Mnemonic::LOC_PTRB => OperandShape::Addr20,
            Mnemonic::AUGS_00
            | Mnemonic::AUGS_01
            | Mnemonic::AUGS_10
            | Mnemonic::AUGS_11
            | Mnemonic::AUGD_00
            | Mnemonic::AUGD_01
            | Mnemonic::AUGD_10
            | Mnemonic::AUGD_11 => OperandShape::Imm23,
            Mnemonic::RET | Mnemonic::COGID | Mnemonic::GETQX | Mnemonic::GETQY
            | Mnemonic::GETCT | Mnemonic::WAITCT1 | Mnemonic::ALLOWI | Mnemonic::STALLI => {
                OperandShape::None
            }
            _ => OperandShape::DstSrc,
        }
    }

    /// Decode from the raw 7-bit `inst` field. Every value in `0..128` is
    /// valid, so this never errors.
    pub fn from_inst(inst: u8) -> Mnemonic {
        // Safety-free: match table covers the entire 0..128 domain.
        MNEMONIC_TABLE[(inst & 0x7F) as usize]
    }

    /// Encode to the raw 7-bit `inst` field.
    pub const fn to_inst(self) -> u8 {
        self as u8
    }

    /// True for the four `AUGS_*` slots.
    pub const fn is_augs(self) -> bool {
        matches!(
            self,
            Mnemonic::AUGS_00 | Mnemonic::AUGS_01 | Mnemonic::AUGS_10 | Mnemonic::AUGS_11
        )
    }

    /// True for the four `AUGD_*` slots.
    pub const fn is_augd(self) -> bool {
        matches!(
            self,
            Mnemonic::AUGD_00 | Mnemonic::AUGD_01 | Mnemonic::AUGD_10 | Mnemonic::AUGD_11
        )
    }

    /// `true` for the `LOCK` slot, whose real operation is sub-selected by
    /// `src`'s low 2 bits rather than carrying a distinct primary slot.
    pub const fn is_lock(self) -> bool {
        matches!(self, Mnemonic::LOCK)
    }
}

macro_rules! mnemonic_table {
    ($($variant:ident = $idx:literal),+ $(,)?) => {
        const MNEMONIC_TABLE: [Mnemonic; 128] = {
            let mut table = [Mnemonic::ROR; 128];
            $(table[$idx] = Mnemonic::$variant;)+
            table
        };
    };
}

mnemonic_table! {
    ROR = 0, ROL = 1, SHR = 2, SHL = 3, RCR = 4, RCL = 5, SAR = 6, SAL = 7,
    ADD = 8, ADDX = 9, ADDS = 10, ADDSX = 11, SUB = 12, SUBX = 13, SUBS = 14, SUBSX = 15,
    CMP = 16, CMPX = 17, CMPS = 18, CMPSX = 19, CMPR = 20, CMPM = 21, SUBR = 22, CMPSUB = 23,
    FGE = 24, FLE = 25, FGES = 26, FLES = 27, SUMC = 28, SUMNC = 29, SUMZ = 30, SUMNZ = 31,
    TESTB_W = 32, TESTBN_W = 33, TESTB_AND = 34, TESTBN_AND = 35,
    TESTB_OR = 36, TESTBN_OR = 37, TESTB_XOR = 38, TESTBN_XOR = 39,
    AND = 40, ANDN = 41, OR = 42, XOR = 43, MUXC = 44, MUXNC = 45, MUXZ = 46, MUXNZ = 47,
    MOV = 48, NOT = 49, ABS = 50, NEG = 51, NEGC = 52, NEGNC = 53, NEGZ = 54, NEGNZ = 55,
    INCMOD = 56, DECMOD = 57, ZEROX = 58, SIGNX = 59, ENCOD = 60, ONES = 61, TEST = 62, TESTN = 63,
    SETNIB_0 = 64, SETNIB_1 = 65, GETNIB_0 = 66, GETNIB_1 = 67, ROLNIB_0 = 68, ROLNIB_1 = 69,
    SETBYTE = 70, GETBYTE = 71, ROLBYTE = 72,
    WRBYTE = 73, WRWORD = 74, WRLONG = 75, JMP = 76,
    CALL = 77, RET = 78, CALLA = 79, CALLB = 80, DJNZ = 81, TJZ = 82, WAITX = 83, REP = 84,
    RDLUT = 85, RDBYTE = 86, RDWORD = 87,
    RDLONG = 88, CALLD = 89, CALLP = 90,
    COGID = 91, COGSTOP = 92, LOCK = 93, GETQX = 94, GETQY = 95,
    QMUL = 96, QDIV = 97, QSQRT = 98, HUBSET = 99,
    XORO32 = 100, SETQ = 101, TESTP = 102, COGINIT = 103,
    GETCT = 104, WAITCT1 = 105, ALLOWI = 106, STALLI = 107,
    JMP_ABS = 108, CALL_ABS = 109, CALLA_ABS = 110, CALLB_ABS = 111,
    CALLD_PA_ABS = 112, CALLD_PB_ABS = 113, CALLD_PTRA_ABS = 114, CALLD_PTRB_ABS = 115,
    LOC_PA = 116, LOC_PB = 117, LOC_PTRA = 118, LOC_PTRB = 119,
    AUGS_00 = 120, AUGS_01 = 121, AUGS_10 = 122, AUGS_11 = 123,
    AUGD_00 = 124, AUGD_01 = 125, AUGD_10 = 126, AUGD_11 = 127,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_slot_eight() {
        assert_eq!(Mnemonic::from_inst(8), Mnemonic::ADD);
        assert_eq!(Mnemonic::ADD.to_inst(), 8);
    }

    #[test]
    fn augd_11_is_the_last_slot() {
        assert_eq!(Mnemonic::from_inst(127), Mnemonic::AUGD_11);
    }

    #[test]
    fn round_trips_every_slot() {
        for i in 0u8..128 {
            assert_eq!(Mnemonic::from_inst(i).to_inst(), i);
        }
    }
}
