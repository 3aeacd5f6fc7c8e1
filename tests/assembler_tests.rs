//! Integration tests for the two-pass assembler: literal round-trips,
//! label resolution, and the LCONS RAM/ROM flag bit, driven as properties
//! rather than fixed examples.

use chip32_core::assemble;
use proptest::prelude::*;

const RAM_FLAG: u32 = 0x8000_0000;

#[test]
fn label_jump_patches_little_endian_target_address() {
    let src = ".s: jump .target\n.target: halt\n";
    let image = assemble(src).unwrap();
    // jump is opcode(1) + addr16(2) = 3 bytes; target label sits right after.
    let target_addr = u16::from_le_bytes([image.code[1], image.code[2]]);
    assert_eq!(target_addr, 3);
}

#[test]
fn lcons_from_rom_constant_has_flag_bit_clear() {
    let src = ".s: lcons r0, $v\n    halt\n$v DC8 9\n";
    let image = assemble(src).unwrap();
    // lcons r0, $v: opcode + reg + imm32, bytes[2..6]
    let imm = u32::from_le_bytes([image.code[2], image.code[3], image.code[4], image.code[5]]);
    assert_eq!(imm & RAM_FLAG, 0);
}

#[test]
fn lcons_from_ram_reservation_has_flag_bit_set() {
    let src = ".s: lcons r0, $v\n    halt\n$v DV8 4\n";
    let image = assemble(src).unwrap();
    let imm = u32::from_le_bytes([image.code[2], image.code[3], image.code[4], image.code[5]]);
    assert_eq!(imm & RAM_FLAG, RAM_FLAG);
}

proptest! {
    #[test]
    fn dc8_literal_round_trip(v in 0u32..256) {
        let src = format!("$v DC8 {v}\n.s: halt\n");
        let image = assemble(&src).unwrap();
        prop_assert_eq!(image.code[0] as u32, v);
    }

    #[test]
    fn dc16_literal_round_trip(v in 0u32..65536) {
        let src = format!("$v DC16 {v}\n.s: halt\n");
        let image = assemble(&src).unwrap();
        let bytes = [image.code[0], image.code[1]];
        prop_assert_eq!(u16::from_le_bytes(bytes) as u32, v);
    }

    #[test]
    fn label_always_resolves_to_its_own_instruction_address(gap in 0usize..8) {
        let mut src = String::from(".entry: jump .target\n");
        for _ in 0..gap {
            src.push_str("nop\n");
        }
        src.push_str(".target: halt\n");
        let image = assemble(&src).unwrap();
        let target_addr = u16::from_le_bytes([image.code[1], image.code[2]]);
        // jump is 3 bytes, then `gap` nops of 1 byte each.
        prop_assert_eq!(target_addr as usize, 3 + gap);
    }
}
