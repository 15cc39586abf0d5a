//! Operand decoding and instruction streams.

use super::code::{classify, InstructionCode};
use super::ea::{EaClass, EffectiveAddress, ExtensionWords, IndexRegister, Operand};
use super::mnemonic::Mnemonic;
use super::render;
use super::{
    get_disp8, get_dst_mode, get_dst_reg, get_moveq_data, get_quick_data, get_src_mode,
    get_src_reg, get_trap_vector, Size,
};
use crate::error::{AmosError, Result};
use serde::{Serialize, Serializer};
use std::ops::Range;

/// Sequential big-endian word source over a byte buffer.
#[derive(Debug, Clone)]
pub struct WordReader<'a> {
    data: &'a [u8],
    pos: usize,
    consumed: Vec<u16>,
}

impl<'a> WordReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        WordReader {
            data,
            pos,
            consumed: Vec::new(),
        }
    }

    /// Read the next word and record it.
    pub fn next_word(&mut self) -> Result<u16> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 2)
            .ok_or(AmosError::TruncatedData {
                offset: self.pos,
                expected: 2,
                actual: self.data.len().saturating_sub(self.pos),
            })?;
        let word = u16::from_be_bytes([bytes[0], bytes[1]]);
        self.pos += 2;
        self.consumed.push(word);
        Ok(word)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Every word read so far.
    pub fn words(&self) -> &[u16] {
        &self.consumed
    }
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// One decoded instruction, or an undecodable word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u16,
    #[serde(skip)]
    pub code: Option<InstructionCode>,
    pub size: Option<Size>,
    pub operands: Vec<Operand>,
    /// Extension words following the opcode
    pub words: Vec<u16>,
    #[serde(serialize_with = "serialize_hex")]
    pub bytes: Vec<u8>,
    pub text: String,
}

impl Instruction {
    fn unknown(offset: usize, opcode: u16) -> Self {
        Instruction {
            offset,
            opcode,
            code: None,
            size: None,
            operands: Vec::new(),
            words: Vec::new(),
            bytes: opcode.to_be_bytes().to_vec(),
            text: render::unknown(opcode),
        }
    }

    pub fn mnemonic(&self) -> Option<Mnemonic> {
        self.code.map(|c| c.mnemonic)
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_unknown(&self) -> bool {
        self.code.is_none()
    }

    /// Extension words implied by the operands.
    pub fn required_extension_words(&self) -> usize {
        self.operands.extension_words()
    }

    /// Execution does not continue with the next instruction. Unknown words
    /// count as ending the flow.
    pub fn ends_flow(&self) -> bool {
        self.mnemonic().map_or(true, Mnemonic::ends_flow)
    }

    /// Absolute target of a Bcc, BRA, BSR or DBcc.
    pub fn branch_target(&self) -> Option<usize> {
        let mnemonic = self.mnemonic()?;
        if !(mnemonic.is_branch() || mnemonic.is_decrement_branch()) {
            return None;
        }
        self.operands.iter().find_map(|op| match op {
            Operand::Displacement { value, .. } => {
                usize::try_from(self.offset as i64 + 2 + i64::from(*value)).ok()
            }
            _ => None,
        })
    }
}

/// Operand decoder for a single classified opcode.
struct Decoder<'r, 'a> {
    opcode: u16,
    reader: &'r mut WordReader<'a>,
}

impl Decoder<'_, '_> {
    fn invalid(&self, message: impl Into<String>) -> AmosError {
        AmosError::InvalidOperand {
            opcode: self.opcode,
            message: message.into(),
        }
    }

    fn word(&mut self) -> Result<u16> {
        self.reader.next_word()
    }

    fn immediate(&mut self, size: Size) -> Result<EffectiveAddress> {
        let value = match size {
            Size::Byte => i32::from(self.word()? as u8 as i8),
            Size::Word => i32::from(self.word()? as i16),
            Size::Long => {
                let hi = u32::from(self.word()?);
                let lo = u32::from(self.word()?);
                ((hi << 16) | lo) as i32
            }
        };
        Ok(EffectiveAddress::Immediate { size, value })
    }

    fn ea(&mut self, mode: u8, reg: u8, immediate: Option<Size>) -> Result<EffectiveAddress> {
        Ok(match mode {
            0 => EffectiveAddress::DataRegister(reg),
            1 => EffectiveAddress::AddressRegister(reg),
            2 => EffectiveAddress::Indirect(reg),
            3 => EffectiveAddress::PostIncrement(reg),
            4 => EffectiveAddress::PreDecrement(reg),
            5 => EffectiveAddress::Displaced {
                reg,
                disp: self.word()? as i16,
            },
            6 => {
                let ext = self.word()?;
                EffectiveAddress::Indexed {
                    reg,
                    disp: ext as u8 as i8,
                    index: IndexRegister::from_extension(ext),
                }
            }
            _ => match reg {
                0 => EffectiveAddress::AbsoluteWord(self.word()? as i16),
                1 => {
                    let hi = u32::from(self.word()?);
                    let lo = u32::from(self.word()?);
                    EffectiveAddress::AbsoluteLong((hi << 16) | lo)
                }
                2 => EffectiveAddress::PcDisplaced {
                    disp: self.word()? as i16,
                },
                3 => {
                    let ext = self.word()?;
                    EffectiveAddress::PcIndexed {
                        disp: ext as u8 as i8,
                        index: IndexRegister::from_extension(ext),
                    }
                }
                4 => match immediate {
                    Some(size) => self.immediate(size)?,
                    None => return Err(self.invalid("immediate operand without a size")),
                },
                _ => return Err(self.invalid(format!("reserved addressing mode 7/{}", reg))),
            },
        })
    }

    /// The effective address in bits 5..0.
    fn source(&mut self, immediate: Option<Size>) -> Result<EffectiveAddress> {
        self.ea(get_src_mode(self.opcode), get_src_reg(self.opcode), immediate)
    }

    fn require(&self, ea: EffectiveAddress, class: EaClass, slot: &str) -> Result<Operand> {
        if ea.is(class) {
            Ok(ea.into())
        } else {
            Err(self.invalid(format!("{} {} is not {:?}", slot, ea, class)))
        }
    }

    fn data_register(&self, reg: u8) -> Operand {
        EffectiveAddress::DataRegister(reg).into()
    }

    fn address_register(&self, reg: u8) -> Operand {
        EffectiveAddress::AddressRegister(reg).into()
    }

    fn operands(&mut self, code: InstructionCode) -> Result<Vec<Operand>> {
        use Mnemonic as M;

        let opcode = self.opcode;
        let src_reg = get_src_reg(opcode);
        let dst_reg = get_dst_reg(opcode);
        let size = code.size;

        let operands = match code.mnemonic {
            M::Move => match code {
                InstructionCode::MOVE_TO_CCR | InstructionCode::MOVE_TO_SR => {
                    let src = self.source(size)?;
                    let dst = if code == InstructionCode::MOVE_TO_CCR {
                        Operand::Ccr
                    } else {
                        Operand::Sr
                    };
                    vec![self.require(src, EaClass::DATA, "source")?, dst]
                }
                InstructionCode::MOVE_FROM_SR => {
                    let dst = self.source(None)?;
                    vec![Operand::Sr, self.require(dst, EaClass::DATA_ALTERABLE, "destination")?]
                }
                InstructionCode::MOVE_TO_USP => vec![self.address_register(src_reg), Operand::Usp],
                InstructionCode::MOVE_FROM_USP => vec![Operand::Usp, self.address_register(src_reg)],
                _ => {
                    let src = self.source(size)?;
                    let dst = self.ea(get_dst_mode(opcode), dst_reg, size)?;
                    vec![src.into(), self.require(dst, EaClass::DATA_ALTERABLE, "destination")?]
                }
            },
            M::Movea | M::Adda | M::Suba | M::Cmpa => {
                vec![self.source(size)?.into(), self.address_register(dst_reg)]
            }
            M::Moveq => vec![
                Operand::Quick(get_moveq_data(opcode).into()),
                self.data_register(dst_reg),
            ],
            M::Movem => {
                let mask = self.word()?;
                let ea = self.source(None)?;
                if code.overload == 0 {
                    if matches!(ea, EffectiveAddress::PostIncrement(_)) {
                        return Err(self.invalid("MOVEM cannot store through (An)+"));
                    }
                    // predecrement masks list A7 in bit 0
                    let list = match ea {
                        EffectiveAddress::PreDecrement(_) => mask.reverse_bits(),
                        _ => mask,
                    };
                    let dst = self.require(ea, EaClass::MEMORY_ALTERABLE, "destination")?;
                    vec![Operand::RegisterList(list), dst]
                } else {
                    if !(ea.is(EaClass::CONTROL) || matches!(ea, EffectiveAddress::PostIncrement(_))) {
                        return Err(self.invalid(format!("MOVEM cannot load from {}", ea)));
                    }
                    vec![ea.into(), Operand::RegisterList(mask)]
                }
            }
            M::Movep => {
                let memory = EffectiveAddress::Displaced {
                    reg: src_reg,
                    disp: self.word()? as i16,
                };
                if code.overload == 0 {
                    vec![self.data_register(dst_reg), memory.into()]
                } else {
                    vec![memory.into(), self.data_register(dst_reg)]
                }
            }
            M::Add | M::Sub | M::And | M::Or | M::Cmp if code.overload == 0 => {
                vec![self.source(size)?.into(), self.data_register(dst_reg)]
            }
            M::Add | M::Sub | M::And | M::Or => {
                let dst = self.source(None)?;
                vec![
                    self.data_register(dst_reg),
                    self.require(dst, EaClass::MEMORY_ALTERABLE, "destination")?,
                ]
            }
            M::Eor => {
                let dst = self.source(None)?;
                vec![
                    self.data_register(dst_reg),
                    self.require(dst, EaClass::DATA_ALTERABLE, "destination")?,
                ]
            }
            M::Cmpm => vec![
                EffectiveAddress::PostIncrement(src_reg).into(),
                EffectiveAddress::PostIncrement(dst_reg).into(),
            ],
            M::Ori | M::Andi | M::Eori | M::Addi | M::Subi | M::Cmpi => {
                let size = size.ok_or_else(|| self.invalid("immediate operation without a size"))?;
                let imm = self.immediate(size)?;
                let dst = match code.overload {
                    0 => {
                        let dst = self.source(None)?;
                        self.require(dst, EaClass::DATA_ALTERABLE, "destination")?
                    }
                    _ if size == Size::Byte => Operand::Ccr,
                    _ => Operand::Sr,
                };
                vec![imm.into(), dst]
            }
            M::Addq | M::Subq => {
                let dst = self.source(None)?;
                vec![
                    Operand::Quick(get_quick_data(opcode).into()),
                    self.require(dst, EaClass::ALTERABLE, "destination")?,
                ]
            }
            M::Addx | M::Subx | M::Abcd | M::Sbcd => {
                if code.overload == 0 {
                    vec![self.data_register(src_reg), self.data_register(dst_reg)]
                } else {
                    vec![
                        EffectiveAddress::PreDecrement(src_reg).into(),
                        EffectiveAddress::PreDecrement(dst_reg).into(),
                    ]
                }
            }
            M::Mulu | M::Muls | M::Divu | M::Divs | M::Chk => {
                let src = self.source(Some(Size::Word))?;
                vec![
                    self.require(src, EaClass::DATA, "source")?,
                    self.data_register(dst_reg),
                ]
            }
            m if m.is_shift() => {
                if code.overload == 0 {
                    let count = if opcode & 0x0020 != 0 {
                        self.data_register(dst_reg)
                    } else {
                        Operand::Quick(get_quick_data(opcode).into())
                    };
                    vec![count, self.data_register(src_reg)]
                } else {
                    let dst = self.source(None)?;
                    vec![self.require(dst, EaClass::MEMORY_ALTERABLE, "destination")?]
                }
            }
            M::Btst | M::Bchg | M::Bclr | M::Bset => {
                let bit = if code.overload == 0 {
                    self.data_register(dst_reg)
                } else {
                    self.immediate(Size::Byte)?.into()
                };
                let required = if code.mnemonic == M::Btst {
                    EaClass::DATA
                } else {
                    EaClass::DATA_ALTERABLE
                };
                let dst = self.source(None)?;
                vec![bit, self.require(dst, required, "destination")?]
            }
            M::Neg | M::Negx | M::Not | M::Clr | M::Tst => {
                let dst = self.source(size)?;
                vec![self.require(dst, EaClass::DATA_ALTERABLE, "destination")?]
            }
            m if m == M::Nbcd || m == M::Tas || m.is_set() => {
                let dst = self.source(None)?;
                vec![self.require(dst, EaClass::DATA_ALTERABLE, "destination")?]
            }
            M::Ext | M::Swap => vec![self.data_register(src_reg)],
            m if m.is_decrement_branch() => {
                let disp = self.word()? as i16;
                vec![
                    self.data_register(src_reg),
                    Operand::Displacement {
                        size: Size::Word,
                        value: disp.into(),
                    },
                ]
            }
            m if m.is_branch() => {
                let target = if size == Some(Size::Word) {
                    Operand::Displacement {
                        size: Size::Word,
                        value: i32::from(self.word()? as i16),
                    }
                } else {
                    Operand::Displacement {
                        size: Size::Byte,
                        value: get_disp8(opcode).into(),
                    }
                };
                vec![target]
            }
            M::Jmp | M::Jsr | M::Pea => {
                let target = self.source(None)?;
                vec![self.require(target, EaClass::CONTROL, "target")?]
            }
            M::Lea => {
                let src = self.source(None)?;
                vec![
                    self.require(src, EaClass::CONTROL, "source")?,
                    self.address_register(dst_reg),
                ]
            }
            M::Exg => match code.overload {
                0 => vec![self.data_register(dst_reg), self.data_register(src_reg)],
                1 => vec![self.address_register(dst_reg), self.address_register(src_reg)],
                _ => vec![self.data_register(dst_reg), self.address_register(src_reg)],
            },
            M::Link => {
                let disp = self.word()? as i16;
                vec![
                    self.address_register(src_reg),
                    EffectiveAddress::Immediate {
                        size: Size::Word,
                        value: disp.into(),
                    }
                    .into(),
                ]
            }
            M::Unlk => vec![self.address_register(src_reg)],
            M::Trap => vec![Operand::Vector(get_trap_vector(opcode))],
            M::Stop => {
                let sr = self.word()?;
                vec![EffectiveAddress::Immediate {
                    size: Size::Word,
                    value: sr.into(),
                }
                .into()]
            }
            _ => Vec::new(),
        };
        Ok(operands)
    }
}

/// Decode the instruction at `offset`. Words that do not classify become
/// unknown instructions; running out of extension words is an error.
pub fn read_instruction(bytes: &[u8], offset: usize) -> Result<Instruction> {
    let mut reader = WordReader::new(bytes, offset);
    let opcode = reader.next_word()?;
    let Some(code) = classify(opcode) else {
        return Ok(Instruction::unknown(offset, opcode));
    };

    let operands = Decoder {
        opcode,
        reader: &mut reader,
    }
    .operands(code)?;

    let size = code.display_size();
    let end = reader.position();
    Ok(Instruction {
        offset,
        opcode,
        code: Some(code),
        size,
        text: render::render(code.mnemonic, size, &operands),
        operands,
        words: reader.words()[1..].to_vec(),
        bytes: bytes[offset..end].to_vec(),
    })
}

/// Byte length of the instruction at `offset`.
pub fn instruction_length(bytes: &[u8], offset: usize) -> Result<usize> {
    read_instruction(bytes, offset).map(|i| i.byte_len())
}

/// Decode a whole buffer; offsets are reported relative to `base`.
///
/// Decoding stops at the first instruction that runs past the end of the
/// buffer, or at a trailing odd byte.
pub fn disassemble(bytes: &[u8], base: usize) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos + 2 <= bytes.len() {
        match read_instruction(bytes, pos) {
            Ok(mut instruction) => {
                pos += instruction.byte_len();
                instruction.offset += base;
                out.push(instruction);
            }
            Err(e) => {
                tracing::trace!(offset = base + pos, error = %e, "disassembly stopped");
                break;
            }
        }
    }
    out
}

/// Byte range from `offset` through the first instruction after which
/// execution cannot fall through.
pub fn read_unconditional_execution(bytes: &[u8], offset: usize) -> Result<Range<usize>> {
    let mut pos = offset;
    loop {
        let instruction = read_instruction(bytes, pos)?;
        pos += instruction.byte_len();
        if instruction.ends_flow() {
            return Ok(offset..pos);
        }
    }
}
