//! Opcode classification.
//!
//! [`classify`] maps a 16-bit opcode word to an [`InstructionCode`]: the
//! mnemonic, operation size, fixed extension-word count and an overload tag
//! telling apart encodings that share those three (e.g. `ADD <ea>,Dn` and
//! `ADD Dn,<ea>`). Extension words contributed by effective addresses are not
//! part of the code; the decoder adds them.

use super::ea::EaClass;
use super::mnemonic::{Mnemonic, BRANCHES, DECREMENT_BRANCHES, SETS, SHIFTS};
use super::{get_condition, get_dst_mode, get_dst_reg, get_size_bits, get_src_mode, get_src_reg, Size};
use serde::Serialize;

const B: Option<Size> = Some(Size::Byte);
const W: Option<Size> = Some(Size::Word);
const L: Option<Size> = Some(Size::Long);
const NONE: Option<Size> = None;

/// Compact identity of a decodable instruction form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InstructionCode {
    pub mnemonic: Mnemonic,
    pub size: Option<Size>,
    /// Extension words required before any effective-address words
    pub extension_words: u8,
    pub overload: u8,
}

impl InstructionCode {
    pub const fn new(mnemonic: Mnemonic, size: Option<Size>, extension_words: u8, overload: u8) -> Self {
        InstructionCode {
            mnemonic,
            size,
            extension_words,
            overload,
        }
    }

    /// Packed form: overload, extension words, size and mnemonic.
    pub const fn key(self) -> u32 {
        let size = match self.size {
            Some(Size::Byte) => 0,
            Some(Size::Word) => 1,
            Some(Size::Long) => 2,
            None => 3,
        };
        ((self.overload as u32) << 12)
            | ((self.extension_words as u32) << 10)
            | (size << 8)
            | self.mnemonic as u32
    }

    /// Size shown after the mnemonic. Bit operations, BCD, branches and
    /// address computations carry an implied size.
    pub fn display_size(self) -> Option<Size> {
        use Mnemonic as M;
        let m = self.mnemonic;
        let is_unsized = m.is_branch()
            || m.is_decrement_branch()
            || m.is_set()
            || matches!(
                m,
                M::Abcd
                    | M::Sbcd
                    | M::Nbcd
                    | M::Btst
                    | M::Bchg
                    | M::Bclr
                    | M::Bset
                    | M::Tas
                    | M::Swap
                    | M::Jmp
                    | M::Jsr
                    | M::Link
                    | M::Unlk
                    | M::Pea
                    | M::Lea
                    | M::Exg
                    | M::Trap
                    | M::Chk
                    | M::Stop
            );
        if is_unsized {
            None
        } else {
            self.size
        }
    }
}

macro_rules! instruction_codes {
    ($($name:ident = ($mnemonic:ident, $size:expr, $ext:expr, $overload:expr);)*) => {
        impl InstructionCode {
            $(pub const $name: InstructionCode =
                InstructionCode::new(Mnemonic::$mnemonic, $size, $ext, $overload);)*

            /// Every instruction code `classify` can produce.
            pub const ALL: &'static [InstructionCode] = &[$(InstructionCode::$name,)*];
        }
    };
}

instruction_codes! {
    MOVE_B = (Move, B, 0, 0);
    MOVE_W = (Move, W, 0, 0);
    MOVE_L = (Move, L, 0, 0);
    MOVE_TO_CCR = (Move, W, 0, 1);
    MOVE_FROM_SR = (Move, W, 0, 2);
    MOVE_TO_SR = (Move, W, 0, 3);
    MOVE_TO_USP = (Move, L, 0, 1);
    MOVE_FROM_USP = (Move, L, 0, 2);
    MOVEA_W = (Movea, W, 0, 0);
    MOVEA_L = (Movea, L, 0, 0);
    MOVEQ = (Moveq, L, 0, 0);
    MOVEM_TO_MEM_W = (Movem, W, 1, 0);
    MOVEM_TO_MEM_L = (Movem, L, 1, 0);
    MOVEM_TO_REG_W = (Movem, W, 1, 1);
    MOVEM_TO_REG_L = (Movem, L, 1, 1);
    MOVEP_TO_MEM_W = (Movep, W, 1, 0);
    MOVEP_TO_MEM_L = (Movep, L, 1, 0);
    MOVEP_TO_REG_W = (Movep, W, 1, 1);
    MOVEP_TO_REG_L = (Movep, L, 1, 1);

    ORI_B = (Ori, B, 1, 0);
    ORI_W = (Ori, W, 1, 0);
    ORI_L = (Ori, L, 2, 0);
    ORI_TO_CCR = (Ori, B, 1, 1);
    ORI_TO_SR = (Ori, W, 1, 1);
    ANDI_B = (Andi, B, 1, 0);
    ANDI_W = (Andi, W, 1, 0);
    ANDI_L = (Andi, L, 2, 0);
    ANDI_TO_CCR = (Andi, B, 1, 1);
    ANDI_TO_SR = (Andi, W, 1, 1);
    EORI_B = (Eori, B, 1, 0);
    EORI_W = (Eori, W, 1, 0);
    EORI_L = (Eori, L, 2, 0);
    EORI_TO_CCR = (Eori, B, 1, 1);
    EORI_TO_SR = (Eori, W, 1, 1);
    SUBI_B = (Subi, B, 1, 0);
    SUBI_W = (Subi, W, 1, 0);
    SUBI_L = (Subi, L, 2, 0);
    ADDI_B = (Addi, B, 1, 0);
    ADDI_W = (Addi, W, 1, 0);
    ADDI_L = (Addi, L, 2, 0);
    CMPI_B = (Cmpi, B, 1, 0);
    CMPI_W = (Cmpi, W, 1, 0);
    CMPI_L = (Cmpi, L, 2, 0);

    BTST_REG = (Btst, NONE, 0, 0);
    BTST_IMM = (Btst, NONE, 1, 1);
    BCHG_REG = (Bchg, NONE, 0, 0);
    BCHG_IMM = (Bchg, NONE, 1, 1);
    BCLR_REG = (Bclr, NONE, 0, 0);
    BCLR_IMM = (Bclr, NONE, 1, 1);
    BSET_REG = (Bset, NONE, 0, 0);
    BSET_IMM = (Bset, NONE, 1, 1);

    ADDQ_B = (Addq, B, 0, 0);
    ADDQ_W = (Addq, W, 0, 0);
    ADDQ_L = (Addq, L, 0, 0);
    SUBQ_B = (Subq, B, 0, 0);
    SUBQ_W = (Subq, W, 0, 0);
    SUBQ_L = (Subq, L, 0, 0);

    BRA_B = (Bra, B, 0, 0);
    BRA_W = (Bra, W, 1, 0);
    BSR_B = (Bsr, B, 0, 0);
    BSR_W = (Bsr, W, 1, 0);
    BHI_B = (Bhi, B, 0, 0);
    BHI_W = (Bhi, W, 1, 0);
    BLS_B = (Bls, B, 0, 0);
    BLS_W = (Bls, W, 1, 0);
    BCC_B = (Bcc, B, 0, 0);
    BCC_W = (Bcc, W, 1, 0);
    BCS_B = (Bcs, B, 0, 0);
    BCS_W = (Bcs, W, 1, 0);
    BNE_B = (Bne, B, 0, 0);
    BNE_W = (Bne, W, 1, 0);
    BEQ_B = (Beq, B, 0, 0);
    BEQ_W = (Beq, W, 1, 0);
    BVC_B = (Bvc, B, 0, 0);
    BVC_W = (Bvc, W, 1, 0);
    BVS_B = (Bvs, B, 0, 0);
    BVS_W = (Bvs, W, 1, 0);
    BPL_B = (Bpl, B, 0, 0);
    BPL_W = (Bpl, W, 1, 0);
    BMI_B = (Bmi, B, 0, 0);
    BMI_W = (Bmi, W, 1, 0);
    BGE_B = (Bge, B, 0, 0);
    BGE_W = (Bge, W, 1, 0);
    BLT_B = (Blt, B, 0, 0);
    BLT_W = (Blt, W, 1, 0);
    BGT_B = (Bgt, B, 0, 0);
    BGT_W = (Bgt, W, 1, 0);
    BLE_B = (Ble, B, 0, 0);
    BLE_W = (Ble, W, 1, 0);

    ST = (St, B, 0, 0);
    SF = (Sf, B, 0, 0);
    SHI = (Shi, B, 0, 0);
    SLS = (Sls, B, 0, 0);
    SCC = (Scc, B, 0, 0);
    SCS = (Scs, B, 0, 0);
    SNE = (Sne, B, 0, 0);
    SEQ = (Seq, B, 0, 0);
    SVC = (Svc, B, 0, 0);
    SVS = (Svs, B, 0, 0);
    SPL = (Spl, B, 0, 0);
    SMI = (Smi, B, 0, 0);
    SGE = (Sge, B, 0, 0);
    SLT = (Slt, B, 0, 0);
    SGT = (Sgt, B, 0, 0);
    SLE = (Sle, B, 0, 0);

    DBT = (Dbt, W, 1, 0);
    DBF = (Dbf, W, 1, 0);
    DBHI = (Dbhi, W, 1, 0);
    DBLS = (Dbls, W, 1, 0);
    DBCC = (Dbcc, W, 1, 0);
    DBCS = (Dbcs, W, 1, 0);
    DBNE = (Dbne, W, 1, 0);
    DBEQ = (Dbeq, W, 1, 0);
    DBVC = (Dbvc, W, 1, 0);
    DBVS = (Dbvs, W, 1, 0);
    DBPL = (Dbpl, W, 1, 0);
    DBMI = (Dbmi, W, 1, 0);
    DBGE = (Dbge, W, 1, 0);
    DBLT = (Dblt, W, 1, 0);
    DBGT = (Dbgt, W, 1, 0);
    DBLE = (Dble, W, 1, 0);

    ASR_B = (Asr, B, 0, 0);
    ASR_W = (Asr, W, 0, 0);
    ASR_L = (Asr, L, 0, 0);
    ASR_MEM = (Asr, W, 0, 1);
    ASL_B = (Asl, B, 0, 0);
    ASL_W = (Asl, W, 0, 0);
    ASL_L = (Asl, L, 0, 0);
    ASL_MEM = (Asl, W, 0, 1);
    LSR_B = (Lsr, B, 0, 0);
    LSR_W = (Lsr, W, 0, 0);
    LSR_L = (Lsr, L, 0, 0);
    LSR_MEM = (Lsr, W, 0, 1);
    LSL_B = (Lsl, B, 0, 0);
    LSL_W = (Lsl, W, 0, 0);
    LSL_L = (Lsl, L, 0, 0);
    LSL_MEM = (Lsl, W, 0, 1);
    ROXR_B = (Roxr, B, 0, 0);
    ROXR_W = (Roxr, W, 0, 0);
    ROXR_L = (Roxr, L, 0, 0);
    ROXR_MEM = (Roxr, W, 0, 1);
    ROXL_B = (Roxl, B, 0, 0);
    ROXL_W = (Roxl, W, 0, 0);
    ROXL_L = (Roxl, L, 0, 0);
    ROXL_MEM = (Roxl, W, 0, 1);
    ROR_B = (Ror, B, 0, 0);
    ROR_W = (Ror, W, 0, 0);
    ROR_L = (Ror, L, 0, 0);
    ROR_MEM = (Ror, W, 0, 1);
    ROL_B = (Rol, B, 0, 0);
    ROL_W = (Rol, W, 0, 0);
    ROL_L = (Rol, L, 0, 0);
    ROL_MEM = (Rol, W, 0, 1);

    ADD_B = (Add, B, 0, 0);
    ADD_W = (Add, W, 0, 0);
    ADD_L = (Add, L, 0, 0);
    ADD_TO_EA_B = (Add, B, 0, 1);
    ADD_TO_EA_W = (Add, W, 0, 1);
    ADD_TO_EA_L = (Add, L, 0, 1);
    ADDA_W = (Adda, W, 0, 0);
    ADDA_L = (Adda, L, 0, 0);
    ADDX_B = (Addx, B, 0, 0);
    ADDX_W = (Addx, W, 0, 0);
    ADDX_L = (Addx, L, 0, 0);
    ADDX_MEM_B = (Addx, B, 0, 1);
    ADDX_MEM_W = (Addx, W, 0, 1);
    ADDX_MEM_L = (Addx, L, 0, 1);
    SUB_B = (Sub, B, 0, 0);
    SUB_W = (Sub, W, 0, 0);
    SUB_L = (Sub, L, 0, 0);
    SUB_TO_EA_B = (Sub, B, 0, 1);
    SUB_TO_EA_W = (Sub, W, 0, 1);
    SUB_TO_EA_L = (Sub, L, 0, 1);
    SUBA_W = (Suba, W, 0, 0);
    SUBA_L = (Suba, L, 0, 0);
    SUBX_B = (Subx, B, 0, 0);
    SUBX_W = (Subx, W, 0, 0);
    SUBX_L = (Subx, L, 0, 0);
    SUBX_MEM_B = (Subx, B, 0, 1);
    SUBX_MEM_W = (Subx, W, 0, 1);
    SUBX_MEM_L = (Subx, L, 0, 1);

    CMP_B = (Cmp, B, 0, 0);
    CMP_W = (Cmp, W, 0, 0);
    CMP_L = (Cmp, L, 0, 0);
    CMPA_W = (Cmpa, W, 0, 0);
    CMPA_L = (Cmpa, L, 0, 0);
    CMPM_B = (Cmpm, B, 0, 0);
    CMPM_W = (Cmpm, W, 0, 0);
    CMPM_L = (Cmpm, L, 0, 0);

    MULU = (Mulu, W, 0, 0);
    MULS = (Muls, W, 0, 0);
    DIVU = (Divu, W, 0, 0);
    DIVS = (Divs, W, 0, 0);

    AND_B = (And, B, 0, 0);
    AND_W = (And, W, 0, 0);
    AND_L = (And, L, 0, 0);
    AND_TO_EA_B = (And, B, 0, 1);
    AND_TO_EA_W = (And, W, 0, 1);
    AND_TO_EA_L = (And, L, 0, 1);
    OR_B = (Or, B, 0, 0);
    OR_W = (Or, W, 0, 0);
    OR_L = (Or, L, 0, 0);
    OR_TO_EA_B = (Or, B, 0, 1);
    OR_TO_EA_W = (Or, W, 0, 1);
    OR_TO_EA_L = (Or, L, 0, 1);
    EOR_B = (Eor, B, 0, 0);
    EOR_W = (Eor, W, 0, 0);
    EOR_L = (Eor, L, 0, 0);
    NOT_B = (Not, B, 0, 0);
    NOT_W = (Not, W, 0, 0);
    NOT_L = (Not, L, 0, 0);

    ABCD = (Abcd, B, 0, 0);
    ABCD_MEM = (Abcd, B, 0, 1);
    SBCD = (Sbcd, B, 0, 0);
    SBCD_MEM = (Sbcd, B, 0, 1);
    NBCD = (Nbcd, B, 0, 0);

    NEG_B = (Neg, B, 0, 0);
    NEG_W = (Neg, W, 0, 0);
    NEG_L = (Neg, L, 0, 0);
    NEGX_B = (Negx, B, 0, 0);
    NEGX_W = (Negx, W, 0, 0);
    NEGX_L = (Negx, L, 0, 0);
    CLR_B = (Clr, B, 0, 0);
    CLR_W = (Clr, W, 0, 0);
    CLR_L = (Clr, L, 0, 0);
    TST_B = (Tst, B, 0, 0);
    TST_W = (Tst, W, 0, 0);
    TST_L = (Tst, L, 0, 0);
    TAS = (Tas, B, 0, 0);
    EXT_W = (Ext, W, 0, 0);
    EXT_L = (Ext, L, 0, 0);
    SWAP = (Swap, W, 0, 0);

    JMP = (Jmp, NONE, 0, 0);
    JSR = (Jsr, NONE, 0, 0);
    LEA = (Lea, L, 0, 0);
    PEA = (Pea, L, 0, 0);
    CHK = (Chk, W, 0, 0);
    EXG_DATA = (Exg, L, 0, 0);
    EXG_ADDRESS = (Exg, L, 0, 1);
    EXG_MIXED = (Exg, L, 0, 2);
    LINK = (Link, NONE, 1, 0);
    UNLK = (Unlk, NONE, 0, 0);
    TRAP = (Trap, NONE, 0, 0);
    TRAPV = (Trapv, NONE, 0, 0);
    RTE = (Rte, NONE, 0, 0);
    RTS = (Rts, NONE, 0, 0);
    RTR = (Rtr, NONE, 0, 0);
    NOP = (Nop, NONE, 0, 0);
    RESET = (Reset, NONE, 0, 0);
    STOP = (Stop, NONE, 1, 0);
    ILLEGAL = (Illegal, NONE, 0, 0);
}

const fn all_unique(codes: &[InstructionCode]) -> bool {
    let mut i = 0;
    while i < codes.len() {
        let mut j = i + 1;
        while j < codes.len() {
            if codes[i].key() == codes[j].key() {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(all_unique(InstructionCode::ALL));

/// Pick the code for the standard 2-bit size field.
fn sized(size_bits: u16, codes: [InstructionCode; 3]) -> Option<InstructionCode> {
    codes.get(size_bits as usize).copied()
}

fn has(ea: Option<EaClass>, required: EaClass) -> bool {
    ea.map_or(false, |class| class.contains(required))
}

/// Classify an opcode word, or `None` when it is not a valid 68000
/// instruction.
pub fn classify(opcode: u16) -> Option<InstructionCode> {
    let mode = get_src_mode(opcode);
    let ea = EaClass::from_mode(mode, get_src_reg(opcode));

    match opcode >> 12 {
        0x0 => classify_immediate(opcode, ea),
        0x1..=0x3 => classify_move(opcode, ea),
        0x4 => classify_misc(opcode, mode, ea),
        0x5 => classify_quick(opcode, ea),
        0x6 => {
            let branch = BRANCHES[get_condition(opcode) as usize];
            if opcode & 0xFF == 0 {
                Some(InstructionCode::new(branch, W, 1, 0))
            } else {
                Some(InstructionCode::new(branch, B, 0, 0))
            }
        }
        0x7 => (opcode & 0x0100 == 0).then_some(InstructionCode::MOVEQ),
        0x8 => classify_logical(opcode, ea, LogicalLine::Or),
        0x9 => classify_arithmetic(opcode, mode, ea, &SUB_FAMILY),
        0xB => classify_compare(opcode, mode, ea),
        0xC => classify_logical(opcode, ea, LogicalLine::And),
        0xD => classify_arithmetic(opcode, mode, ea, &ADD_FAMILY),
        0xE => classify_shift(opcode, ea),
        // 0xA and 0xF are the unimplemented A-line and F-line traps
        _ => None,
    }
}

fn classify_move(opcode: u16, src: Option<EaClass>) -> Option<InstructionCode> {
    let dst_mode = get_dst_mode(opcode);
    let dst = EaClass::from_mode(dst_mode, get_dst_reg(opcode));
    let size_index = match opcode >> 12 {
        1 => 0,
        3 => 1,
        _ => 2,
    };

    if src.is_none() || !has(dst, EaClass::ALTERABLE) {
        return None;
    }
    if size_index == 0 && has(src, EaClass::ADDRESS_REGISTER) {
        return None;
    }

    if dst_mode == 1 {
        return [None, Some(InstructionCode::MOVEA_W), Some(InstructionCode::MOVEA_L)][size_index];
    }
    sized(
        size_index as u16,
        [InstructionCode::MOVE_B, InstructionCode::MOVE_W, InstructionCode::MOVE_L],
    )
}

fn classify_immediate(opcode: u16, ea: Option<EaClass>) -> Option<InstructionCode> {
    match opcode {
        0x003C => return Some(InstructionCode::ORI_TO_CCR),
        0x007C => return Some(InstructionCode::ORI_TO_SR),
        0x023C => return Some(InstructionCode::ANDI_TO_CCR),
        0x027C => return Some(InstructionCode::ANDI_TO_SR),
        0x0A3C => return Some(InstructionCode::EORI_TO_CCR),
        0x0A7C => return Some(InstructionCode::EORI_TO_SR),
        _ => {}
    }

    let family = match opcode >> 8 {
        0x00 => Some([InstructionCode::ORI_B, InstructionCode::ORI_W, InstructionCode::ORI_L]),
        0x02 => Some([InstructionCode::ANDI_B, InstructionCode::ANDI_W, InstructionCode::ANDI_L]),
        0x04 => Some([InstructionCode::SUBI_B, InstructionCode::SUBI_W, InstructionCode::SUBI_L]),
        0x06 => Some([InstructionCode::ADDI_B, InstructionCode::ADDI_W, InstructionCode::ADDI_L]),
        0x0A => Some([InstructionCode::EORI_B, InstructionCode::EORI_W, InstructionCode::EORI_L]),
        0x0C => Some([InstructionCode::CMPI_B, InstructionCode::CMPI_W, InstructionCode::CMPI_L]),
        _ => None,
    };
    if let Some(codes) = family {
        if !has(ea, EaClass::DATA_ALTERABLE) {
            return None;
        }
        return sized(get_size_bits(opcode), codes);
    }

    // static bit operations: 0000 1000 tt mmm rrr
    if opcode & 0x0F00 == 0x0800 {
        return match get_size_bits(opcode) {
            0 => (has(ea, EaClass::DATA) && !has(ea, EaClass::IMMEDIATE))
                .then_some(InstructionCode::BTST_IMM),
            kind => has(ea, EaClass::DATA_ALTERABLE).then_some(
                [InstructionCode::BCHG_IMM, InstructionCode::BCLR_IMM, InstructionCode::BSET_IMM]
                    [kind as usize - 1],
            ),
        };
    }

    // MOVEP: 0000 ddd 1 oo 001 aaa, bit 7 set moves registers to memory
    if opcode & 0xF138 == 0x0108 {
        let long = opcode & 0x0040 != 0;
        return Some(match (opcode & 0x0080 != 0, long) {
            (true, false) => InstructionCode::MOVEP_TO_MEM_W,
            (true, true) => InstructionCode::MOVEP_TO_MEM_L,
            (false, false) => InstructionCode::MOVEP_TO_REG_W,
            (false, true) => InstructionCode::MOVEP_TO_REG_L,
        });
    }

    // dynamic bit operations: 0000 ddd 1 tt mmm rrr
    if opcode & 0x0100 != 0 {
        return match get_size_bits(opcode) {
            0 => (has(ea, EaClass::DATA) && !has(ea, EaClass::IMMEDIATE))
                .then_some(InstructionCode::BTST_REG),
            kind => has(ea, EaClass::DATA_ALTERABLE).then_some(
                [InstructionCode::BCHG_REG, InstructionCode::BCLR_REG, InstructionCode::BSET_REG]
                    [kind as usize - 1],
            ),
        };
    }

    None
}

fn classify_quick(opcode: u16, ea: Option<EaClass>) -> Option<InstructionCode> {
    let size_bits = get_size_bits(opcode);
    let condition = get_condition(opcode) as usize;

    if size_bits == 3 {
        if (opcode >> 3) & 0x1F == 0x19 {
            return Some(InstructionCode::new(DECREMENT_BRANCHES[condition], W, 1, 0));
        }
        return has(ea, EaClass::DATA_ALTERABLE)
            .then(|| InstructionCode::new(SETS[condition], B, 0, 0));
    }

    if !has(ea, EaClass::ALTERABLE) {
        return None;
    }
    if size_bits == 0 && has(ea, EaClass::ADDRESS_REGISTER) {
        return None;
    }
    if opcode & 0x0100 != 0 {
        sized(size_bits, [InstructionCode::SUBQ_B, InstructionCode::SUBQ_W, InstructionCode::SUBQ_L])
    } else {
        sized(size_bits, [InstructionCode::ADDQ_B, InstructionCode::ADDQ_W, InstructionCode::ADDQ_L])
    }
}

fn classify_shift(opcode: u16, ea: Option<EaClass>) -> Option<InstructionCode> {
    let left = usize::from(opcode & 0x0100 != 0);
    let size_bits = get_size_bits(opcode);

    if size_bits == 3 {
        if opcode & 0x0800 != 0 || !has(ea, EaClass::MEMORY_ALTERABLE) {
            return None;
        }
        let kind = ((opcode >> 9) & 3) as usize;
        return Some(InstructionCode::new(SHIFTS[kind][left], W, 0, 1));
    }

    let kind = ((opcode >> 3) & 3) as usize;
    Size::from_bits(size_bits).map(|size| InstructionCode::new(SHIFTS[kind][left], Some(size), 0, 0))
}

fn classify_misc(opcode: u16, mode: u8, ea: Option<EaClass>) -> Option<InstructionCode> {
    match opcode {
        0x4AFC => return Some(InstructionCode::ILLEGAL),
        0x4E70 => return Some(InstructionCode::RESET),
        0x4E71 => return Some(InstructionCode::NOP),
        0x4E72 => return Some(InstructionCode::STOP),
        0x4E73 => return Some(InstructionCode::RTE),
        0x4E75 => return Some(InstructionCode::RTS),
        0x4E76 => return Some(InstructionCode::TRAPV),
        0x4E77 => return Some(InstructionCode::RTR),
        _ => {}
    }

    // register-only forms; SWAP shares its prefix with PEA and must win
    match opcode & 0xFFF8 {
        0x4880 => return Some(InstructionCode::EXT_W),
        0x48C0 => return Some(InstructionCode::EXT_L),
        0x4840 => return Some(InstructionCode::SWAP),
        0x4E50 => return Some(InstructionCode::LINK),
        0x4E58 => return Some(InstructionCode::UNLK),
        0x4E60 => return Some(InstructionCode::MOVE_TO_USP),
        0x4E68 => return Some(InstructionCode::MOVE_FROM_USP),
        _ => {}
    }

    if opcode & 0xFFF0 == 0x4E40 {
        return Some(InstructionCode::TRAP);
    }

    let single = match opcode & 0xFFC0 {
        0x4E80 => Some((InstructionCode::JSR, EaClass::CONTROL)),
        0x4EC0 => Some((InstructionCode::JMP, EaClass::CONTROL)),
        0x4800 => Some((InstructionCode::NBCD, EaClass::DATA_ALTERABLE)),
        0x4840 => Some((InstructionCode::PEA, EaClass::CONTROL)),
        0x4AC0 => Some((InstructionCode::TAS, EaClass::DATA_ALTERABLE)),
        0x40C0 => Some((InstructionCode::MOVE_FROM_SR, EaClass::DATA_ALTERABLE)),
        0x46C0 => Some((InstructionCode::MOVE_TO_SR, EaClass::DATA)),
        0x44C0 => Some((InstructionCode::MOVE_TO_CCR, EaClass::DATA)),
        _ => None,
    };
    if let Some((code, required)) = single {
        return has(ea, required).then_some(code);
    }

    match opcode & 0xF1C0 {
        0x41C0 => return has(ea, EaClass::CONTROL).then_some(InstructionCode::LEA),
        0x4180 => return has(ea, EaClass::DATA).then_some(InstructionCode::CHK),
        _ => {}
    }

    let unary = match opcode & 0xFF00 {
        0x4200 => Some([InstructionCode::CLR_B, InstructionCode::CLR_W, InstructionCode::CLR_L]),
        0x4400 => Some([InstructionCode::NEG_B, InstructionCode::NEG_W, InstructionCode::NEG_L]),
        0x4000 => Some([InstructionCode::NEGX_B, InstructionCode::NEGX_W, InstructionCode::NEGX_L]),
        0x4600 => Some([InstructionCode::NOT_B, InstructionCode::NOT_W, InstructionCode::NOT_L]),
        0x4A00 => Some([InstructionCode::TST_B, InstructionCode::TST_W, InstructionCode::TST_L]),
        _ => None,
    };
    if let Some(codes) = unary {
        if !has(ea, EaClass::DATA_ALTERABLE) {
            return None;
        }
        return sized(get_size_bits(opcode), codes);
    }

    let long = opcode & 0x0040 != 0;
    match opcode & 0xFF80 {
        0x4880 => {
            // (An)+ cannot be a store destination
            if !has(ea, EaClass::MEMORY_ALTERABLE) || mode == 3 {
                return None;
            }
            Some(if long {
                InstructionCode::MOVEM_TO_MEM_L
            } else {
                InstructionCode::MOVEM_TO_MEM_W
            })
        }
        0x4C80 => {
            // -(An) cannot be a load source
            if !(has(ea, EaClass::CONTROL) || mode == 3) {
                return None;
            }
            Some(if long {
                InstructionCode::MOVEM_TO_REG_L
            } else {
                InstructionCode::MOVEM_TO_REG_W
            })
        }
        _ => None,
    }
}

/// Codes of the ADD and SUB lines.
struct ArithmeticFamily {
    to_register: [InstructionCode; 3],
    to_ea: [InstructionCode; 3],
    address: [InstructionCode; 2],
    extended: [InstructionCode; 3],
    extended_memory: [InstructionCode; 3],
}

const ADD_FAMILY: ArithmeticFamily = ArithmeticFamily {
    to_register: [InstructionCode::ADD_B, InstructionCode::ADD_W, InstructionCode::ADD_L],
    to_ea: [InstructionCode::ADD_TO_EA_B, InstructionCode::ADD_TO_EA_W, InstructionCode::ADD_TO_EA_L],
    address: [InstructionCode::ADDA_W, InstructionCode::ADDA_L],
    extended: [InstructionCode::ADDX_B, InstructionCode::ADDX_W, InstructionCode::ADDX_L],
    extended_memory: [InstructionCode::ADDX_MEM_B, InstructionCode::ADDX_MEM_W, InstructionCode::ADDX_MEM_L],
};

const SUB_FAMILY: ArithmeticFamily = ArithmeticFamily {
    to_register: [InstructionCode::SUB_B, InstructionCode::SUB_W, InstructionCode::SUB_L],
    to_ea: [InstructionCode::SUB_TO_EA_B, InstructionCode::SUB_TO_EA_W, InstructionCode::SUB_TO_EA_L],
    address: [InstructionCode::SUBA_W, InstructionCode::SUBA_L],
    extended: [InstructionCode::SUBX_B, InstructionCode::SUBX_W, InstructionCode::SUBX_L],
    extended_memory: [InstructionCode::SUBX_MEM_B, InstructionCode::SUBX_MEM_W, InstructionCode::SUBX_MEM_L],
};

fn classify_arithmetic(
    opcode: u16,
    mode: u8,
    ea: Option<EaClass>,
    family: &ArithmeticFamily,
) -> Option<InstructionCode> {
    let size_bits = get_size_bits(opcode);
    if opcode & 0x0100 == 0 {
        // <ea>,Dn or <ea>,An
        ea?;
        return match size_bits {
            3 => Some(family.address[0]),
            0 if has(ea, EaClass::ADDRESS_REGISTER) => None,
            _ => sized(size_bits, family.to_register),
        };
    }

    match (size_bits, mode) {
        (3, _) => ea.map(|_| family.address[1]),
        (_, 0) => sized(size_bits, family.extended),
        (_, 1) => sized(size_bits, family.extended_memory),
        _ if has(ea, EaClass::MEMORY_ALTERABLE) => sized(size_bits, family.to_ea),
        _ => None,
    }
}

fn classify_compare(opcode: u16, mode: u8, ea: Option<EaClass>) -> Option<InstructionCode> {
    let size_bits = get_size_bits(opcode);
    if opcode & 0x0100 == 0 {
        ea?;
        return match size_bits {
            3 => Some(InstructionCode::CMPA_W),
            0 if has(ea, EaClass::ADDRESS_REGISTER) => None,
            _ => sized(
                size_bits,
                [InstructionCode::CMP_B, InstructionCode::CMP_W, InstructionCode::CMP_L],
            ),
        };
    }

    match (size_bits, mode) {
        (3, _) => ea.map(|_| InstructionCode::CMPA_L),
        (_, 1) => sized(
            size_bits,
            [InstructionCode::CMPM_B, InstructionCode::CMPM_W, InstructionCode::CMPM_L],
        ),
        _ if has(ea, EaClass::DATA_ALTERABLE) => sized(
            size_bits,
            [InstructionCode::EOR_B, InstructionCode::EOR_W, InstructionCode::EOR_L],
        ),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LogicalLine {
    Or,
    And,
}

fn classify_logical(opcode: u16, ea: Option<EaClass>, line: LogicalLine) -> Option<InstructionCode> {
    let (unsigned, signed) = match line {
        LogicalLine::Or => (InstructionCode::DIVU, InstructionCode::DIVS),
        LogicalLine::And => (InstructionCode::MULU, InstructionCode::MULS),
    };
    match opcode & 0xF1C0 {
        0x80C0 | 0xC0C0 => return has(ea, EaClass::DATA).then_some(unsigned),
        0x81C0 | 0xC1C0 => return has(ea, EaClass::DATA).then_some(signed),
        _ => {}
    }

    match line {
        LogicalLine::Or => match opcode & 0xF1F8 {
            0x8100 => return Some(InstructionCode::SBCD),
            0x8108 => return Some(InstructionCode::SBCD_MEM),
            _ => {}
        },
        LogicalLine::And => {
            match opcode & 0xF1F8 {
                0xC140 => return Some(InstructionCode::EXG_DATA),
                0xC148 => return Some(InstructionCode::EXG_ADDRESS),
                0xC188 => return Some(InstructionCode::EXG_MIXED),
                _ => {}
            }
            match opcode & 0xF1F8 {
                0xC100 => return Some(InstructionCode::ABCD),
                0xC108 => return Some(InstructionCode::ABCD_MEM),
                _ => {}
            }
        }
    }

    let (to_register, to_ea) = match line {
        LogicalLine::Or => (
            [InstructionCode::OR_B, InstructionCode::OR_W, InstructionCode::OR_L],
            [InstructionCode::OR_TO_EA_B, InstructionCode::OR_TO_EA_W, InstructionCode::OR_TO_EA_L],
        ),
        LogicalLine::And => (
            [InstructionCode::AND_B, InstructionCode::AND_W, InstructionCode::AND_L],
            [InstructionCode::AND_TO_EA_B, InstructionCode::AND_TO_EA_W, InstructionCode::AND_TO_EA_L],
        ),
    };

    let size_bits = get_size_bits(opcode);
    if opcode & 0x0100 != 0 {
        has(ea, EaClass::MEMORY_ALTERABLE)
            .then(|| sized(size_bits, to_ea))
            .flatten()
    } else {
        has(ea, EaClass::DATA)
            .then(|| sized(size_bits, to_register))
            .flatten()
    }
}
