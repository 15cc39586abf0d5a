//! Effective addresses and operands.

use super::Size;
use bitflags::bitflags;
use serde::{Serialize, Serializer};

bitflags! {
    /// Addressing capabilities of an effective-address mode.
    ///
    /// Instruction slots name the capability they need (a MOVE destination
    /// must be `DATA_ALTERABLE`, JMP needs `CONTROL`, ...). Categories follow
    /// the Motorola programmer's reference manual.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EaClass: u16 {
        const DATA_REGISTER = 1 << 0;
        const ADDRESS_REGISTER = 1 << 1;
        const MEMORY = 1 << 2;
        const CONTROL = 1 << 3;
        const IMMEDIATE = 1 << 4;
        const ALTERABLE = 1 << 5;
        const DATA = 1 << 6;
        const DATA_ALTERABLE = 1 << 7;
        const MEMORY_ALTERABLE = 1 << 8;
    }
}

impl EaClass {
    /// Capabilities of a 6-bit mode/register field, or `None` for the
    /// encodings reserved on the 68000 (mode 7, register 5-7).
    pub fn from_mode(mode: u8, reg: u8) -> Option<EaClass> {
        const MEM: EaClass = EaClass::MEMORY
            .union(EaClass::DATA)
            .union(EaClass::ALTERABLE)
            .union(EaClass::MEMORY_ALTERABLE)
            .union(EaClass::DATA_ALTERABLE);

        let class = match mode & 7 {
            0 => {
                EaClass::DATA_REGISTER
                    | EaClass::DATA
                    | EaClass::ALTERABLE
                    | EaClass::DATA_ALTERABLE
            }
            1 => EaClass::ADDRESS_REGISTER | EaClass::ALTERABLE,
            3 | 4 => MEM,
            2 | 5 | 6 => MEM | EaClass::CONTROL,
            _ => match reg & 7 {
                0 | 1 => MEM | EaClass::CONTROL,
                2 | 3 => EaClass::MEMORY | EaClass::CONTROL | EaClass::DATA,
                4 => EaClass::IMMEDIATE | EaClass::DATA,
                _ => return None,
            },
        };
        Some(class)
    }
}

/// Index register of the indexed addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRegister {
    /// An rather than Dn
    pub address: bool,
    pub reg: u8,
    /// Full 32-bit index rather than sign-extended low word
    pub long: bool,
}

impl IndexRegister {
    /// Decode the index fields of a brief extension word.
    pub fn from_extension(ext: u16) -> Self {
        IndexRegister {
            address: ext & 0x8000 != 0,
            reg: ((ext >> 12) & 7) as u8,
            long: ext & 0x0800 != 0,
        }
    }
}

/// A decoded effective address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveAddress {
    /// Dn
    DataRegister(u8),
    /// An
    AddressRegister(u8),
    /// (An)
    Indirect(u8),
    /// (An)+
    PostIncrement(u8),
    /// -(An)
    PreDecrement(u8),
    /// (d16,An)
    Displaced { reg: u8, disp: i16 },
    /// (d8,An,Xn)
    Indexed {
        reg: u8,
        disp: i8,
        index: IndexRegister,
    },
    /// (d16,PC)
    PcDisplaced { disp: i16 },
    /// (d8,PC,Xn)
    PcIndexed { disp: i8, index: IndexRegister },
    /// (xxx).W, sign-extended
    AbsoluteWord(i16),
    /// (xxx).L
    AbsoluteLong(u32),
    /// #<data>
    Immediate { size: Size, value: i32 },
}

impl EffectiveAddress {
    /// Capabilities of this address.
    pub fn class(&self) -> EaClass {
        let (mode, reg) = match *self {
            EffectiveAddress::DataRegister(r) => (0, r),
            EffectiveAddress::AddressRegister(r) => (1, r),
            EffectiveAddress::Indirect(r) => (2, r),
            EffectiveAddress::PostIncrement(r) => (3, r),
            EffectiveAddress::PreDecrement(r) => (4, r),
            EffectiveAddress::Displaced { reg, .. } => (5, reg),
            EffectiveAddress::Indexed { reg, .. } => (6, reg),
            EffectiveAddress::AbsoluteWord(_) => (7, 0),
            EffectiveAddress::AbsoluteLong(_) => (7, 1),
            EffectiveAddress::PcDisplaced { .. } => (7, 2),
            EffectiveAddress::PcIndexed { .. } => (7, 3),
            EffectiveAddress::Immediate { .. } => (7, 4),
        };
        EaClass::from_mode(mode, reg).unwrap_or(EaClass::empty())
    }

    pub fn is(&self, class: EaClass) -> bool {
        self.class().contains(class)
    }
}

/// An instruction operand.
///
/// Serializes as its assembler text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Ea(EffectiveAddress),
    Ccr,
    Sr,
    Usp,
    /// Register set, bit i = D0..D7 then A0..A7 regardless of transfer direction
    RegisterList(u16),
    /// Relative branch displacement
    Displacement { size: Size, value: i32 },
    /// Data embedded in the opcode word (MOVEQ, ADDQ/SUBQ, shift counts)
    Quick(i32),
    /// TRAP vector
    Vector(u8),
}

impl From<EffectiveAddress> for Operand {
    fn from(ea: EffectiveAddress) -> Self {
        Operand::Ea(ea)
    }
}

impl Serialize for Operand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Number of 16-bit extension words an operand occupies.
pub trait ExtensionWords {
    fn extension_words(&self) -> usize;
}

impl ExtensionWords for EffectiveAddress {
    fn extension_words(&self) -> usize {
        match self {
            EffectiveAddress::DataRegister(_)
            | EffectiveAddress::AddressRegister(_)
            | EffectiveAddress::Indirect(_)
            | EffectiveAddress::PostIncrement(_)
            | EffectiveAddress::PreDecrement(_) => 0,
            EffectiveAddress::Displaced { .. }
            | EffectiveAddress::Indexed { .. }
            | EffectiveAddress::PcDisplaced { .. }
            | EffectiveAddress::PcIndexed { .. }
            | EffectiveAddress::AbsoluteWord(_) => 1,
            EffectiveAddress::AbsoluteLong(_) => 2,
            EffectiveAddress::Immediate { size: Size::Long, .. } => 2,
            EffectiveAddress::Immediate { .. } => 1,
        }
    }
}

impl ExtensionWords for Operand {
    fn extension_words(&self) -> usize {
        match self {
            Operand::Ea(ea) => ea.extension_words(),
            Operand::RegisterList(_) => 1,
            Operand::Displacement { size: Size::Byte, .. } => 0,
            Operand::Displacement { .. } => 1,
            Operand::Ccr | Operand::Sr | Operand::Usp | Operand::Quick(_) | Operand::Vector(_) => 0,
        }
    }
}

impl<T: ExtensionWords> ExtensionWords for [T] {
    fn extension_words(&self) -> usize {
        self.iter().map(ExtensionWords::extension_words).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_classes() {
        let dn = EaClass::from_mode(0, 3).unwrap();
        assert!(dn.contains(EaClass::DATA_ALTERABLE));
        assert!(!dn.contains(EaClass::MEMORY));

        let an = EaClass::from_mode(1, 0).unwrap();
        assert!(an.contains(EaClass::ALTERABLE));
        assert!(!an.contains(EaClass::DATA));

        assert!(EaClass::from_mode(2, 0).unwrap().contains(EaClass::CONTROL));
        assert!(!EaClass::from_mode(3, 0).unwrap().contains(EaClass::CONTROL));
        assert!(!EaClass::from_mode(4, 0).unwrap().contains(EaClass::CONTROL));

        let pc = EaClass::from_mode(7, 2).unwrap();
        assert!(pc.contains(EaClass::CONTROL));
        assert!(!pc.contains(EaClass::ALTERABLE));

        let imm = EaClass::from_mode(7, 4).unwrap();
        assert_eq!(imm, EaClass::IMMEDIATE | EaClass::DATA);
        assert_eq!(EaClass::from_mode(7, 5), None);
        assert_eq!(EaClass::from_mode(7, 7), None);
    }

    #[test]
    fn test_class_of_decoded_address() {
        let ea = EffectiveAddress::Displaced { reg: 5, disp: -4 };
        assert!(ea.is(EaClass::CONTROL | EaClass::MEMORY_ALTERABLE));
        assert!(!EffectiveAddress::PostIncrement(1).is(EaClass::CONTROL));
        assert!(EffectiveAddress::AbsoluteLong(0).is(EaClass::DATA_ALTERABLE));
    }

    #[test]
    fn test_index_register() {
        let index = IndexRegister::from_extension(0xA804);
        assert!(index.address);
        assert_eq!(index.reg, 2);
        assert!(index.long);
    }

    #[test]
    fn test_extension_words() {
        let ops = [
            Operand::Ea(EffectiveAddress::Immediate {
                size: Size::Long,
                value: 1,
            }),
            Operand::Ea(EffectiveAddress::AbsoluteWord(0x100)),
            Operand::Displacement {
                size: Size::Byte,
                value: 4,
            },
            Operand::RegisterList(0x00FF),
        ];
        assert_eq!(ops[..].extension_words(), 4);
        assert_eq!(Operand::Quick(8).extension_words(), 0);
    }
}
