//! Chip32 instruction set: opcode ordering, operand shapes, register names.
//!
//! Shared between the assembler (encoding) and the VM (decoding) so the two
//! can never drift: both import the same mnemonic table.

/// A single register operand's width in bytes after the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSpec {
    /// A register name, encoded as one register-index byte.
    Reg,
    /// An `@reg` indirect operand — same one-byte encoding as `Reg`; the
    /// leading `@` is purely a lexical/validation marker.
    RegIndirect,
    /// An 8-bit immediate (syscall code, STORE/LOAD size).
    Imm8,
    /// A 16-bit code address, may be a `.label` reference (two-byte hole).
    Imm16Addr,
    /// A 32-bit immediate, may be a `$label` reference (four-byte hole,
    /// high byte carries the RAM/ROM flag when resolved from a label).
    Imm32OrLabel,
}

impl OperandSpec {
    pub const fn encoded_len(self) -> usize {
        match self {
            OperandSpec::Reg | OperandSpec::RegIndirect | OperandSpec::Imm8 => 1,
            OperandSpec::Imm16Addr => 2,
            OperandSpec::Imm32OrLabel => 4,
        }
    }
}

/// One row of the fixed mnemonic table. Opcode value is the row's index.
pub struct OpcodeInfo {
    pub mnemonic: &'static str,
    pub operands: &'static [OperandSpec],
}

macro_rules! op_row {
    ($name:literal) => {
        OpcodeInfo {
            mnemonic: $name,
            operands: &[],
        }
    };
    ($name:literal, $($spec:expr),+ $(,)?) => {
        OpcodeInfo {
            mnemonic: $name,
            operands: &[$($spec),+],
        }
    };
}

use OperandSpec::*;

/// Opcode ordering is fixed: numeric value == index into this table.
pub static OPCODES: &[OpcodeInfo] = &[
    op_row!("nop"),                              // 0x00
    op_row!("halt"),                              // 0x01
    op_row!("syscall", Imm8),                     // 0x02
    op_row!("lcons", Reg, Imm32OrLabel),          // 0x03
    op_row!("mov", Reg, Reg),                     // 0x04
    op_row!("push", Reg),                         // 0x05
    op_row!("pop", Reg),                          // 0x06
    op_row!("call", Imm16Addr),                   // 0x07
    op_row!("ret"),                                // 0x08
    op_row!("store", RegIndirect, Reg, Imm8),     // 0x09
    op_row!("load", Reg, RegIndirect, Imm8),      // 0x0a
    op_row!("add", Reg, Reg),                     // 0x0b
    op_row!("sub", Reg, Reg),                     // 0x0c
    op_row!("mul", Reg, Reg),                     // 0x0d
    op_row!("div", Reg, Reg),                     // 0x0e
    op_row!("shiftl", Reg, Reg),                  // 0x0f
    op_row!("shiftr", Reg, Reg),                  // 0x10
    op_row!("ishiftr", Reg, Reg),                 // 0x11
    op_row!("and", Reg, Reg),                     // 0x12
    op_row!("or", Reg, Reg),                      // 0x13
    op_row!("xor", Reg, Reg),                     // 0x14
    op_row!("not", Reg, Reg),                     // 0x15
    op_row!("jump", Imm16Addr),                   // 0x16
    op_row!("jumpr", Reg),                        // 0x17
    op_row!("skipz", Reg),                        // 0x18
    op_row!("skipnz", Reg),                       // 0x19
];

pub const OP_NOP: u8 = 0x00;
pub const OP_HALT: u8 = 0x01;
pub const OP_SYSCALL: u8 = 0x02;
pub const OP_LCONS: u8 = 0x03;
pub const OP_MOV: u8 = 0x04;
pub const OP_PUSH: u8 = 0x05;
pub const OP_POP: u8 = 0x06;
pub const OP_CALL: u8 = 0x07;
pub const OP_RET: u8 = 0x08;
pub const OP_STORE: u8 = 0x09;
pub const OP_LOAD: u8 = 0x0a;
pub const OP_ADD: u8 = 0x0b;
pub const OP_SUB: u8 = 0x0c;
pub const OP_MUL: u8 = 0x0d;
pub const OP_DIV: u8 = 0x0e;
pub const OP_SHIFTL: u8 = 0x0f;
pub const OP_SHIFTR: u8 = 0x10;
pub const OP_ISHIFTR: u8 = 0x11;
pub const OP_AND: u8 = 0x12;
pub const OP_OR: u8 = 0x13;
pub const OP_XOR: u8 = 0x14;
pub const OP_NOT: u8 = 0x15;
pub const OP_JUMP: u8 = 0x16;
pub const OP_JUMPR: u8 = 0x17;
pub const OP_SKIPZ: u8 = 0x18;
pub const OP_SKIPNZ: u8 = 0x19;

/// Look up a mnemonic's opcode value (case-sensitive — mnemonics are
/// lowercased by the lexer before this is called).
pub fn opcode_for(mnemonic: &str) -> Option<u8> {
    OPCODES
        .iter()
        .position(|o| o.mnemonic == mnemonic)
        .map(|i| i as u8)
}

pub fn info_for(opcode: u8) -> Option<&'static OpcodeInfo> {
    OPCODES.get(opcode as usize)
}

/// Total encoded instruction length (opcode byte + operand bytes).
pub fn instruction_len(opcode: u8) -> Option<usize> {
    info_for(opcode).map(|info| 1 + info.operands.iter().map(|o| o.encoded_len()).sum::<usize>())
}

/// Chip32 register file indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    Pc = 10,
    Sp = 11,
    Ra = 12,
}

/// Total number of registers in the register file.
pub const REGISTER_COUNT: usize = 13;

impl Register {
    pub fn from_index(i: u8) -> Option<Register> {
        use Register::*;
        Some(match i {
            0 => R0,
            1 => R1,
            2 => R2,
            3 => R3,
            4 => R4,
            5 => R5,
            6 => R6,
            7 => R7,
            8 => R8,
            9 => R9,
            10 => Pc,
            11 => Sp,
            12 => Ra,
            _ => return None,
        })
    }

    /// Resolve a register name (case-insensitive), without the optional
    /// leading `@` used for indirect operands.
    pub fn from_name(name: &str) -> Option<Register> {
        use Register::*;
        let lower_matches = |s: &str, target: &str| s.eq_ignore_ascii_case(target);
        Some(match name {
            n if lower_matches(n, "r0") => R0,
            n if lower_matches(n, "r1") => R1,
            n if lower_matches(n, "r2") => R2,
            n if lower_matches(n, "r3") => R3,
            n if lower_matches(n, "r4") => R4,
            n if lower_matches(n, "r5") => R5,
            n if lower_matches(n, "r6") => R6,
            n if lower_matches(n, "r7") => R7,
            n if lower_matches(n, "r8") => R8,
            n if lower_matches(n, "r9") => R9,
            n if lower_matches(n, "pc") => Pc,
            n if lower_matches(n, "sp") => Sp,
            n if lower_matches(n, "ra") => Ra,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_ordering_matches_spec() {
        assert_eq!(opcode_for("nop"), Some(0x00));
        assert_eq!(opcode_for("halt"), Some(0x01));
        assert_eq!(opcode_for("skipnz"), Some(0x19));
        assert_eq!(OPCODES.len(), 0x1a);
    }

    #[test]
    fn register_round_trip() {
        for i in 0..REGISTER_COUNT as u8 {
            let reg = Register::from_index(i).unwrap();
            assert_eq!(reg as u8, i);
        }
        assert_eq!(Register::from_name("R4").unwrap() as u8, 4);
        assert_eq!(Register::from_name("sp").unwrap() as u8, 11);
    }
}
