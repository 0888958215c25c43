//! Field accessors for 32 bit MIPS-I instruction words.
//!
//! These are the methods generated lookup functions call, for example
//! `instruction.opcode()` or `instruction.funct()`.

use std::fmt;

use dispatch::{FieldSource, Literal};
use modular_bitfield::{bitfield, specifiers::*};

#[bitfield(bits = 32)]
#[derive(Debug, Copy, Clone)]
pub struct RType {
    pub funct: B6,
    pub shamt: B5,
    pub rd: B5,
    pub rt: B5,
    pub rs: B5,
    pub opcode: B6,
}

/// Coprocessor layout. Bit 25 separates coprocessor operations (`c` set)
/// from register moves, which keep their sub-opcode in the low four bits
/// of `rs`.
#[bitfield(bits = 32)]
#[derive(Debug, Copy, Clone)]
pub struct CopType {
    pub funct: B6,
    #[skip]
    regs: B15,
    pub rs4: B4,
    pub c: bool,
    #[skip]
    op: B6,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub value: u32,
}

impl Instruction {
    pub fn new(value: u32) -> Instruction {
        Instruction { value }
    }

    fn r(self) -> RType {
        RType::from_bytes(self.value.to_le_bytes())
    }

    fn cop(self) -> CopType {
        CopType::from_bytes(self.value.to_le_bytes())
    }

    pub fn opcode(self) -> u32 {
        self.r().opcode().into()
    }

    pub fn rs(self) -> u32 {
        self.r().rs().into()
    }

    pub fn rt(self) -> u32 {
        self.r().rt().into()
    }

    pub fn rd(self) -> u32 {
        self.r().rd().into()
    }

    pub fn shamt(self) -> u32 {
        self.r().shamt().into()
    }

    pub fn funct(self) -> u32 {
        self.r().funct().into()
    }

    pub fn c(self) -> bool {
        self.cop().c()
    }

    pub fn rs4(self) -> u32 {
        self.cop().rs4().into()
    }
}

impl From<u32> for Instruction {
    fn from(value: u32) -> Self {
        Instruction::new(value)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instruction({:#010x})", self.value)
    }
}

impl FieldSource for Instruction {
    fn field(&self, name: &str) -> Option<Literal> {
        let value = match name {
            "opcode" => self.opcode(),
            "rs" => self.rs(),
            "rt" => self.rt(),
            "rd" => self.rd(),
            "shamt" => self.shamt(),
            "funct" => self.funct(),
            "rs4" => self.rs4(),
            "c" => return Some(Literal::Bool(self.c())),
            _ => return None,
        };
        Some(Literal::Int(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_special_funct_32() {
        // add $v0, $a0, $a1
        let i = Instruction::new(0x0085_1020);
        assert_eq!(i.opcode(), 0);
        assert_eq!(i.rs(), 4);
        assert_eq!(i.rt(), 5);
        assert_eq!(i.rd(), 2);
        assert_eq!(i.shamt(), 0);
        assert_eq!(i.funct(), 32);
    }

    #[test]
    fn rfe_sets_the_coprocessor_bit() {
        let i = Instruction::new(0x4200_0010);
        assert_eq!(i.opcode(), 16);
        assert!(i.c());
        assert_eq!(i.rs4(), 0);
        assert_eq!(i.funct(), 16);
    }

    #[test]
    fn mtc0_is_a_register_move() {
        // mtc0 $t0, $12
        let i = Instruction::new(0x4088_6000);
        assert_eq!(i.opcode(), 16);
        assert!(!i.c());
        assert_eq!(i.rs4(), 4);
        assert_eq!(i.rs(), 4);
    }

    #[test]
    fn field_source_names() {
        let i = Instruction::new(0x4200_0010);
        assert_eq!(i.field("c"), Some(Literal::Bool(true)));
        assert_eq!(i.field("opcode"), Some(Literal::Int(16)));
        assert_eq!(i.field("imm"), None);
    }

    #[test]
    fn debug_shows_the_word() {
        assert_eq!(format!("{:?}", Instruction::new(0x20)), "Instruction(0x00000020)");
    }
}
