//! Two-pass Chip32 assembler.
//!
//! Pass 1 lays out code and data, assigning addresses and reserving
//! relocation holes for label references. Pass 2 resolves every label and
//! patches those holes. A final serialization step concatenates the
//! resulting records into a flat ROM image with no header and no
//! relocation table.

pub mod encode;
pub mod isa;
pub mod lexer;
pub mod symbol;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use isa::{OperandSpec, Register};
use lexer::{LineKind, SourceLine};
use symbol::{Symbol, SymbolKind, SymbolTable};

/// An assembler error: fatal to the compile, always carries the source
/// line that triggered it.
pub type AsmError = crate::error::LineError;

fn err(line: usize, msg: impl Into<String>) -> AsmError {
    AsmError::new(line, msg)
}

/// What a label reference, once pass 2 resolves it, needs patched into the
/// record's byte buffer.
#[derive(Debug, Clone)]
enum Reloc {
    /// A 16-bit code address at `bytes[offset..offset+2]`.
    Addr16 { label: String, offset: usize },
    /// A 32-bit `LCONS` immediate at `bytes[offset..offset+4]`; byte
    /// `offset+3` additionally gets the RAM/ROM flag.
    Lcons32 { label: String, offset: usize },
}

#[derive(Debug, Clone)]
struct Record {
    line: usize,
    address: u32,
    bytes: Vec<u8>,
    reloc: Option<Reloc>,
}

/// The assembled program: a flat byte image plus the metadata needed to
/// load and debug it.
#[derive(Debug, Clone)]
pub struct Assembled {
    /// Concatenation of ROM-code instructions and ROM-data directives, in
    /// source order. No header, no relocation table.
    pub code: Vec<u8>,
    pub rom_size: usize,
    pub ram_size: usize,
    pub symbols: SymbolTable,
    /// `PC -> source line`, for the host debugger to translate addresses.
    pub addr_to_line: BTreeMap<u32, usize>,
}

/// Assemble Chip32 source text into a binary image and symbol table.
pub fn assemble(source: &str) -> Result<Assembled, AsmError> {
    let lines = lexer::tokenize(source).map_err(|(line, msg)| err(line, msg))?;

    let mut symbols = SymbolTable::new();
    let mut records: Vec<Record> = Vec::new();
    let mut code_addr: u32 = 0;
    let mut ram_addr: u32 = 0;

    // ---- Pass 1: layout ----
    for line in &lines {
        match &line.kind {
            LineKind::CodeLabel { name } => {
                symbols
                    .define(
                        name.clone(),
                        Symbol {
                            address: code_addr,
                            kind: SymbolKind::Label,
                        },
                    )
                    .map_err(|_| err(line.number, alloc::format!("duplicate symbol '{}'", name)))?;
            }
            LineKind::DataDirective {
                name,
                type_tag,
                args,
            } => {
                let (is_const, width) = encode::parse_width(type_tag)
                    .ok_or_else(|| err(line.number, alloc::format!("bad type tag '{}'", type_tag)))?;
                if is_const {
                    let bytes = encode_dcn(line.number, args, width)?;
                    symbols
                        .define(
                            name.clone(),
                            Symbol {
                                address: code_addr,
                                kind: SymbolKind::RomData,
                            },
                        )
                        .map_err(|_| {
                            err(line.number, alloc::format!("duplicate symbol '{}'", name))
                        })?;
                    let len = bytes.len() as u32;
                    records.push(Record {
                        line: line.number,
                        address: code_addr,
                        bytes,
                        reloc: None,
                    });
                    code_addr += len;
                } else {
                    if args.len() != 1 {
                        return Err(err(
                            line.number,
                            "DVn expects exactly one operand: an element count",
                        ));
                    }
                    let count = encode::parse_integer(&args[0])
                        .map_err(|m| err(line.number, m))?;
                    symbols
                        .define(
                            name.clone(),
                            Symbol {
                                address: ram_addr,
                                kind: SymbolKind::RamData,
                            },
                        )
                        .map_err(|_| {
                            err(line.number, alloc::format!("duplicate symbol '{}'", name))
                        })?;
                    ram_addr += count * (width / 8);
                }
            }
            LineKind::Instruction { mnemonic, operands } => {
                let opcode = isa::opcode_for(mnemonic)
                    .ok_or_else(|| err(line.number, alloc::format!("unknown mnemonic '{}'", mnemonic)))?;
                let info = isa::info_for(opcode).expect("opcode_for/info_for in sync");
                if operands.len() != info.operands.len() {
                    return Err(err(
                        line.number,
                        alloc::format!(
                            "'{}' expects {} operand(s), got {}",
                            mnemonic,
                            info.operands.len(),
                            operands.len()
                        ),
                    ));
                }

                let mut bytes = alloc::vec![opcode];
                let mut reloc = None;
                for (idx, (spec, operand)) in info.operands.iter().zip(operands.iter()).enumerate() {
                    encode_operand(
                        line.number,
                        mnemonic,
                        idx,
                        *spec,
                        operand,
                        &mut bytes,
                        &mut reloc,
                    )?;
                }

                let len = bytes.len() as u32;
                records.push(Record {
                    line: line.number,
                    address: code_addr,
                    bytes,
                    reloc,
                });
                code_addr += len;
            }
        }
    }

    // ---- Pass 2: relocation ----
    for record in &mut records {
        let Some(reloc) = &record.reloc else {
            continue;
        };
        match reloc {
            Reloc::Addr16 { label, offset } => {
                let symbol = symbols
                    .get(label)
                    .ok_or_else(|| err(record.line, alloc::format!("unresolved symbol '{}'", label)))?;
                let addr = symbol.address as u16;
                record.bytes[*offset..*offset + 2].copy_from_slice(&addr.to_le_bytes());
            }
            Reloc::Lcons32 { label, offset } => {
                let symbol = symbols
                    .get(label)
                    .ok_or_else(|| err(record.line, alloc::format!("unresolved symbol '{}'", label)))?;
                let addr = symbol.address;
                record.bytes[*offset..*offset + 4].copy_from_slice(&addr.to_le_bytes());
                record.bytes[*offset + 3] = match symbol.kind {
                    SymbolKind::RamData => 0x80,
                    _ => 0x00,
                };
            }
        }
    }

    // ---- Serialize ----
    let mut code = Vec::new();
    let mut addr_to_line = BTreeMap::new();
    for record in &records {
        addr_to_line.insert(record.address, record.line);
        code.extend_from_slice(&record.bytes);
    }

    Ok(Assembled {
        rom_size: code.len(),
        code,
        ram_size: ram_addr as usize,
        symbols,
        addr_to_line,
    })
}

fn encode_dcn(line: usize, args: &[String], width: u32) -> Result<Vec<u8>, AsmError> {
    if args.is_empty() {
        return Err(err(line, "DCn expects at least one argument"));
    }
    let mut bytes = Vec::new();
    for arg in args {
        if encode::is_string_literal(arg) {
            if width != 8 {
                return Err(err(line, "string literals are only legal in DC8"));
            }
            bytes.extend_from_slice(&encode::pack_string(encode::string_literal_contents(arg)));
        } else {
            let value = encode::parse_integer(arg).map_err(|m| err(line, m))?;
            bytes.extend_from_slice(&encode::pack_literal(value, width).map_err(|m| err(line, m))?);
        }
    }
    Ok(bytes)
}

#[allow(clippy::too_many_arguments)]
fn encode_operand(
    line: usize,
    mnemonic: &str,
    idx: usize,
    spec: OperandSpec,
    operand: &str,
    bytes: &mut Vec<u8>,
    reloc: &mut Option<Reloc>,
) -> Result<(), AsmError> {
    match spec {
        OperandSpec::Reg => {
            if operand.starts_with('@') {
                return Err(err(
                    line,
                    alloc::format!("'{}' operand {} must not be indirect", mnemonic, idx + 1),
                ));
            }
            let reg = Register::from_name(operand)
                .ok_or_else(|| err(line, alloc::format!("bad register name '{}'", operand)))?;
            bytes.push(reg as u8);
        }
        OperandSpec::RegIndirect => {
            let name = operand.strip_prefix('@').ok_or_else(|| {
                err(
                    line,
                    alloc::format!("'{}' operand {} must begin with '@'", mnemonic, idx + 1),
                )
            })?;
            let reg = Register::from_name(name)
                .ok_or_else(|| err(line, alloc::format!("bad register name '{}'", name)))?;
            bytes.push(reg as u8);
        }
        OperandSpec::Imm8 => {
            let value = encode::parse_integer(operand).map_err(|m| err(line, m))?;
            bytes.extend_from_slice(&encode::pack_literal(value, 8).map_err(|m| err(line, m))?);
        }
        OperandSpec::Imm16Addr => {
            let offset = bytes.len();
            if operand.starts_with('.') {
                *reloc = Some(Reloc::Addr16 {
                    label: operand.to_string(),
                    offset,
                });
                bytes.extend_from_slice(&[0u8, 0u8]);
            } else {
                let value = encode::parse_integer(operand).map_err(|m| err(line, m))?;
                bytes.extend_from_slice(&encode::pack_literal(value, 16).map_err(|m| err(line, m))?);
            }
        }
        OperandSpec::Imm32OrLabel => {
            let offset = bytes.len();
            if let Some(label) = operand.strip_prefix('$') {
                *reloc = Some(Reloc::Lcons32 {
                    label: alloc::format!("${}", label),
                    offset,
                });
                bytes.extend_from_slice(&[0u8, 0u8, 0u8, 0u8]);
            } else {
                let value = encode::parse_integer(operand).map_err(|m| err(line, m))?;
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    Ok(())
}
