//! 68000 mnemonics.

use serde::Serialize;

macro_rules! mnemonics {
    ($($variant:ident => $name:literal,)*) => {
        /// Every baseline 68000 mnemonic, with each condition spelled out.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(rename_all = "UPPERCASE")]
        #[repr(u8)]
        pub enum Mnemonic {
            $($variant,)*
        }

        impl Mnemonic {
            /// All mnemonics in declaration order.
            pub const ALL: &'static [Mnemonic] = &[$(Mnemonic::$variant,)*];

            /// Assembler spelling.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Mnemonic::$variant => $name,)*
                }
            }
        }
    };
}

mnemonics! {
    Abcd => "ABCD",
    Add => "ADD",
    Adda => "ADDA",
    Addi => "ADDI",
    Addq => "ADDQ",
    Addx => "ADDX",
    And => "AND",
    Andi => "ANDI",
    Asl => "ASL",
    Asr => "ASR",
    Bcc => "BCC",
    Bchg => "BCHG",
    Bclr => "BCLR",
    Bcs => "BCS",
    Beq => "BEQ",
    Bge => "BGE",
    Bgt => "BGT",
    Bhi => "BHI",
    Ble => "BLE",
    Bls => "BLS",
    Blt => "BLT",
    Bmi => "BMI",
    Bne => "BNE",
    Bpl => "BPL",
    Bra => "BRA",
    Bset => "BSET",
    Bsr => "BSR",
    Btst => "BTST",
    Bvc => "BVC",
    Bvs => "BVS",
    Chk => "CHK",
    Clr => "CLR",
    Cmp => "CMP",
    Cmpa => "CMPA",
    Cmpi => "CMPI",
    Cmpm => "CMPM",
    Dbcc => "DBCC",
    Dbcs => "DBCS",
    Dbeq => "DBEQ",
    Dbf => "DBF",
    Dbge => "DBGE",
    Dbgt => "DBGT",
    Dbhi => "DBHI",
    Dble => "DBLE",
    Dbls => "DBLS",
    Dblt => "DBLT",
    Dbmi => "DBMI",
    Dbne => "DBNE",
    Dbpl => "DBPL",
    Dbt => "DBT",
    Dbvc => "DBVC",
    Dbvs => "DBVS",
    Divs => "DIVS",
    Divu => "DIVU",
    Eor => "EOR",
    Eori => "EORI",
    Exg => "EXG",
    Ext => "EXT",
    Illegal => "ILLEGAL",
    Jmp => "JMP",
    Jsr => "JSR",
    Lea => "LEA",
    Link => "LINK",
    Lsl => "LSL",
    Lsr => "LSR",
    Move => "MOVE",
    Movea => "MOVEA",
    Movem => "MOVEM",
    Movep => "MOVEP",
    Moveq => "MOVEQ",
    Muls => "MULS",
    Mulu => "MULU",
    Nbcd => "NBCD",
    Neg => "NEG",
    Negx => "NEGX",
    Nop => "NOP",
    Not => "NOT",
    Or => "OR",
    Ori => "ORI",
    Pea => "PEA",
    Reset => "RESET",
    Rol => "ROL",
    Ror => "ROR",
    Roxl => "ROXL",
    Roxr => "ROXR",
    Rte => "RTE",
    Rtr => "RTR",
    Rts => "RTS",
    Sbcd => "SBCD",
    Scc => "SCC",
    Scs => "SCS",
    Seq => "SEQ",
    Sf => "SF",
    Sge => "SGE",
    Sgt => "SGT",
    Shi => "SHI",
    Sle => "SLE",
    Sls => "SLS",
    Slt => "SLT",
    Smi => "SMI",
    Sne => "SNE",
    Spl => "SPL",
    St => "ST",
    Stop => "STOP",
    Sub => "SUB",
    Suba => "SUBA",
    Subi => "SUBI",
    Subq => "SUBQ",
    Subx => "SUBX",
    Svc => "SVC",
    Svs => "SVS",
    Swap => "SWAP",
    Tas => "TAS",
    Trap => "TRAP",
    Trapv => "TRAPV",
    Tst => "TST",
    Unlk => "UNLK",
}

/// Bcc mnemonics indexed by condition field. Conditions 0 and 1 are BRA and BSR.
pub const BRANCHES: [Mnemonic; 16] = [
    Mnemonic::Bra,
    Mnemonic::Bsr,
    Mnemonic::Bhi,
    Mnemonic::Bls,
    Mnemonic::Bcc,
    Mnemonic::Bcs,
    Mnemonic::Bne,
    Mnemonic::Beq,
    Mnemonic::Bvc,
    Mnemonic::Bvs,
    Mnemonic::Bpl,
    Mnemonic::Bmi,
    Mnemonic::Bge,
    Mnemonic::Blt,
    Mnemonic::Bgt,
    Mnemonic::Ble,
];

/// DBcc mnemonics indexed by condition field.
pub const DECREMENT_BRANCHES: [Mnemonic; 16] = [
    Mnemonic::Dbt,
    Mnemonic::Dbf,
    Mnemonic::Dbhi,
    Mnemonic::Dbls,
    Mnemonic::Dbcc,
    Mnemonic::Dbcs,
    Mnemonic::Dbne,
    Mnemonic::Dbeq,
    Mnemonic::Dbvc,
    Mnemonic::Dbvs,
    Mnemonic::Dbpl,
    Mnemonic::Dbmi,
    Mnemonic::Dbge,
    Mnemonic::Dblt,
    Mnemonic::Dbgt,
    Mnemonic::Dble,
];

/// Scc mnemonics indexed by condition field.
pub const SETS: [Mnemonic; 16] = [
    Mnemonic::St,
    Mnemonic::Sf,
    Mnemonic::Shi,
    Mnemonic::Sls,
    Mnemonic::Scc,
    Mnemonic::Scs,
    Mnemonic::Sne,
    Mnemonic::Seq,
    Mnemonic::Svc,
    Mnemonic::Svs,
    Mnemonic::Spl,
    Mnemonic::Smi,
    Mnemonic::Sge,
    Mnemonic::Slt,
    Mnemonic::Sgt,
    Mnemonic::Sle,
];

/// Shift and rotate mnemonics indexed by type field, right then left.
pub const SHIFTS: [[Mnemonic; 2]; 4] = [
    [Mnemonic::Asr, Mnemonic::Asl],
    [Mnemonic::Lsr, Mnemonic::Lsl],
    [Mnemonic::Roxr, Mnemonic::Roxl],
    [Mnemonic::Ror, Mnemonic::Rol],
];

impl Mnemonic {
    /// BRA, BSR or a conditional branch.
    pub fn is_branch(self) -> bool {
        BRANCHES.contains(&self)
    }

    /// DBcc family.
    pub fn is_decrement_branch(self) -> bool {
        DECREMENT_BRANCHES.contains(&self)
    }

    /// Scc family.
    pub fn is_set(self) -> bool {
        SETS.contains(&self)
    }

    /// Shift or rotate.
    pub fn is_shift(self) -> bool {
        SHIFTS.iter().any(|pair| pair.contains(&self))
    }

    /// Execution never continues with the following instruction.
    pub fn ends_flow(self) -> bool {
        matches!(
            self,
            Mnemonic::Jmp | Mnemonic::Bra | Mnemonic::Rts | Mnemonic::Rtr | Mnemonic::Rte
        )
    }
}

impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_uppercase_variants() {
        for m in Mnemonic::ALL {
            assert_eq!(m.name(), format!("{:?}", m).to_uppercase());
        }
    }

    #[test]
    fn test_families() {
        assert!(Mnemonic::Bsr.is_branch());
        assert!(!Mnemonic::Dbf.is_branch());
        assert!(Mnemonic::Dbf.is_decrement_branch());
        assert!(Mnemonic::Sne.is_set());
        assert!(Mnemonic::Roxl.is_shift());
        assert!(!Mnemonic::Rts.is_shift());
        assert!(Mnemonic::Rte.ends_flow());
        assert!(!Mnemonic::Bsr.ends_flow());
    }

    #[test]
    fn test_serialize_uses_assembler_name() {
        assert_eq!(serde_json::to_string(&Mnemonic::Dbhi).unwrap(), "\"DBHI\"");
    }
}
