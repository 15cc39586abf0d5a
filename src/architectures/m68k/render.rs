//! Assembler text for operands and instructions.

use super::ea::{EffectiveAddress, IndexRegister, Operand};
use super::mnemonic::Mnemonic;
use super::Size;
use std::fmt::{self, Write as _};

/// Hex with a leading sign for negative values: `$1c`, `-$8`.
pub fn signed_hex(value: i64) -> String {
    if value < 0 {
        format!("-${:x}", value.unsigned_abs())
    } else {
        format!("${:x}", value)
    }
}

fn immediate(value: i32) -> String {
    if value.unsigned_abs() < 10 {
        format!("#{}", value)
    } else {
        format!("#{}", signed_hex(value.into()))
    }
}

impl fmt::Display for IndexRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.address { 'A' } else { 'D' };
        write!(f, "{}{}", kind, self.reg)?;
        if self.long {
            f.write_str(".L")?;
        }
        Ok(())
    }
}

impl fmt::Display for EffectiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EffectiveAddress::DataRegister(r) => write!(f, "D{}", r),
            EffectiveAddress::AddressRegister(r) => write!(f, "A{}", r),
            EffectiveAddress::Indirect(r) => write!(f, "(A{})", r),
            EffectiveAddress::PostIncrement(r) => write!(f, "(A{})+", r),
            EffectiveAddress::PreDecrement(r) => write!(f, "-(A{})", r),
            EffectiveAddress::Displaced { reg, disp } => {
                write!(f, "({},A{})", signed_hex(disp.into()), reg)
            }
            EffectiveAddress::Indexed { reg, disp, index } => {
                write!(f, "({},A{},{})", signed_hex(disp.into()), reg, index)
            }
            EffectiveAddress::PcDisplaced { disp } => write!(f, "({},PC)", signed_hex(disp.into())),
            EffectiveAddress::PcIndexed { disp, index } => {
                write!(f, "({},PC,{})", signed_hex(disp.into()), index)
            }
            EffectiveAddress::AbsoluteWord(value) => write!(f, "(${:x}).W", i32::from(value) as u32),
            EffectiveAddress::AbsoluteLong(value) => write!(f, "(${:x}).L", value),
            EffectiveAddress::Immediate { value, .. } => f.write_str(&immediate(value)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operand::Ea(ea) => fmt::Display::fmt(&ea, f),
            Operand::Ccr => f.write_str("CCR"),
            Operand::Sr => f.write_str("SR"),
            Operand::Usp => f.write_str("USP"),
            Operand::RegisterList(mask) => f.write_str(&register_list(mask)),
            Operand::Displacement { value, .. } => f.write_str(&signed_hex(value.into())),
            Operand::Quick(value) => f.write_str(&immediate(value)),
            Operand::Vector(n) => write!(f, "#{}", n),
        }
    }
}

/// Register set notation such as `D0-D3/D6/D7/A5`. Runs of three or more
/// collapse to a range; pairs are listed individually.
pub fn register_list(mask: u16) -> String {
    if mask == 0 {
        return "{}".to_string();
    }

    let mut parts = Vec::new();
    for (prefix, bits) in [('D', mask & 0xFF), ('A', mask >> 8)] {
        let mut reg = 0;
        while reg < 8 {
            if bits & (1 << reg) == 0 {
                reg += 1;
                continue;
            }
            let start = reg;
            while reg < 8 && bits & (1 << reg) != 0 {
                reg += 1;
            }
            let end = reg - 1;
            match end - start {
                0 => parts.push(format!("{}{}", prefix, start)),
                1 => {
                    parts.push(format!("{}{}", prefix, start));
                    parts.push(format!("{}{}", prefix, end));
                }
                _ => parts.push(format!("{}{}-{}{}", prefix, start, prefix, end)),
            }
        }
    }
    parts.join("/")
}

/// `NAME[.S][ op1,op2]`
pub fn render(mnemonic: Mnemonic, size: Option<Size>, operands: &[Operand]) -> String {
    let mut text = String::from(mnemonic.name());
    if let Some(size) = size {
        let _ = write!(text, ".{}", size);
    }
    for (i, operand) in operands.iter().enumerate() {
        text.push(if i == 0 { ' ' } else { ',' });
        let _ = write!(text, "{}", operand);
    }
    text
}

/// Text of a word that does not decode.
pub fn unknown(opcode: u16) -> String {
    format!("DC.W ${:04x}", opcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_hex() {
        assert_eq!(signed_hex(0), "$0");
        assert_eq!(signed_hex(0x1c), "$1c");
        assert_eq!(signed_hex(-8), "-$8");
        assert_eq!(signed_hex(i32::MIN.into()), "-$80000000");
    }

    #[test]
    fn test_register_list() {
        assert_eq!(register_list(0), "{}");
        assert_eq!(register_list(0x000F), "D0-D3");
        assert_eq!(register_list(0x0003), "D0/D1");
        assert_eq!(register_list(0x7FFF), "D0-D7/A0-A6");
        assert_eq!(register_list(0x4101), "D0/A0/A6");
    }

    #[test]
    fn test_addresses() {
        let index = IndexRegister {
            address: false,
            reg: 0,
            long: false,
        };
        assert_eq!(
            EffectiveAddress::Indexed { reg: 3, disp: 4, index }.to_string(),
            "($4,A3,D0)"
        );
        let long_index = IndexRegister {
            address: true,
            reg: 1,
            long: true,
        };
        assert_eq!(
            EffectiveAddress::PcIndexed {
                disp: -2,
                index: long_index
            }
            .to_string(),
            "(-$2,PC,A1.L)"
        );
        assert_eq!(EffectiveAddress::AbsoluteWord(-0x8000).to_string(), "($ffff8000).W");
        assert_eq!(EffectiveAddress::AbsoluteLong(0xDFF180).to_string(), "($dff180).L");
        assert_eq!(
            EffectiveAddress::Displaced { reg: 5, disp: 16 }.to_string(),
            "($10,A5)"
        );
        assert_eq!(
            EffectiveAddress::Immediate {
                size: Size::Word,
                value: 9
            }
            .to_string(),
            "#9"
        );
        assert_eq!(
            EffectiveAddress::Immediate {
                size: Size::Word,
                value: -10
            }
            .to_string(),
            "#-$a"
        );
    }

    #[test]
    fn test_render() {
        assert_eq!(render(Mnemonic::Rts, None, &[]), "RTS");
        assert_eq!(
            render(
                Mnemonic::Moveq,
                Some(Size::Long),
                &[Operand::Quick(-1), EffectiveAddress::DataRegister(0).into()]
            ),
            "MOVEQ.L #-1,D0"
        );
        assert_eq!(render(Mnemonic::Trap, None, &[Operand::Vector(15)]), "TRAP #15");
        assert_eq!(unknown(0xA00F), "DC.W $a00f");
    }
}
