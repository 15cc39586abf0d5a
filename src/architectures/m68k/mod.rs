//! Motorola 68000 (m68k) instruction decoding.
//!
//! m68k uses variable-length instructions (2-10 bytes), big-endian,
//! 16-bit aligned. The first word determines the instruction class; the
//! class fixes how many extension words follow and how operands decode.
//!
//! Decoding is split in two stages: [`classify`] maps an opcode word to an
//! [`InstructionCode`] (or `None` for encodings that are invalid on a plain
//! 68000), then [`decode::read_instruction`] pulls the extension words and
//! builds the operand list.

pub mod code;
pub mod decode;
pub mod ea;
pub mod mnemonic;
pub mod render;

pub use code::{classify, InstructionCode};
pub use decode::{
    disassemble, instruction_length, read_instruction, read_unconditional_execution, Instruction,
    WordReader,
};
pub use ea::{EaClass, EffectiveAddress, ExtensionWords, IndexRegister, Operand};
pub use mnemonic::Mnemonic;

use serde::Serialize;
use std::fmt;

/// Fully specified and base opcodes used when emitting code.
pub mod opcodes {
    pub const NOP: u16 = 0x4E71;
    pub const RTS: u16 = 0x4E75;

    /// JMP (xxx).L
    pub const JMP_ABS_L: u16 = 0x4EF9;
    /// JSR (xxx).L
    pub const JSR_ABS_L: u16 = 0x4EB9;
    /// JMP (An), register in bits 2:0
    pub const JMP_INDIRECT: u16 = 0x4ED0;
    /// JSR (An), register in bits 2:0
    pub const JSR_INDIRECT: u16 = 0x4E90;
    /// LEA (d16,PC),An, register in bits 11:9
    pub const LEA_PC: u16 = 0x41FA;

    pub const BRA: u16 = 0x6000;
}

/// Operation size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Size {
    #[serde(rename = "B")]
    Byte,
    #[serde(rename = "W")]
    Word,
    #[serde(rename = "L")]
    Long,
}

impl Size {
    /// Size from the common 2-bit field (00/01/10); 11 has no size.
    pub const fn from_bits(bits: u16) -> Option<Size> {
        match bits & 3 {
            0 => Some(Size::Byte),
            1 => Some(Size::Word),
            2 => Some(Size::Long),
            _ => None,
        }
    }

    /// Assembler suffix letter.
    pub const fn suffix(self) -> char {
        match self {
            Size::Byte => 'B',
            Size::Word => 'W',
            Size::Long => 'L',
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Extract source mode (bits 5:3).
pub fn get_src_mode(instr: u16) -> u8 {
    ((instr >> 3) & 0x07) as u8
}

/// Extract source register (bits 2:0).
pub fn get_src_reg(instr: u16) -> u8 {
    (instr & 0x07) as u8
}

/// Extract destination mode (bits 8:6).
pub fn get_dst_mode(instr: u16) -> u8 {
    ((instr >> 6) & 0x07) as u8
}

/// Extract destination register (bits 11:9).
pub fn get_dst_reg(instr: u16) -> u8 {
    ((instr >> 9) & 0x07) as u8
}

/// Extract the 2-bit size field (bits 7:6).
pub fn get_size_bits(instr: u16) -> u16 {
    (instr >> 6) & 0x03
}

/// Extract condition code (bits 11:8) for Bcc/DBcc/Scc.
pub fn get_condition(instr: u16) -> u8 {
    ((instr >> 8) & 0x0F) as u8
}

/// Extract 8-bit displacement from Bcc.
pub fn get_disp8(instr: u16) -> i8 {
    (instr & 0xFF) as i8
}

/// Extract TRAP vector number (bits 3:0).
pub fn get_trap_vector(instr: u16) -> u8 {
    (instr & 0x0F) as u8
}

/// Extract MOVEQ immediate data (bits 7:0).
pub fn get_moveq_data(instr: u16) -> i8 {
    (instr & 0xFF) as i8
}

/// Extract ADDQ/SUBQ data or a shift count (bits 11:9, 0 means 8).
pub fn get_quick_data(instr: u16) -> u8 {
    let data = ((instr >> 9) & 0x07) as u8;
    if data == 0 {
        8
    } else {
        data
    }
}
