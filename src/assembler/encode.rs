//! Operand encoding helpers: integer literal parsing, string-literal byte
//! extraction, and n-bit width packing for `DCn`/`DVn` directives.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// Parse an integer literal: decimal, `0x`-prefixed hex, or `0`-prefixed
/// octal. Negative literals are not supported; a leading `-` is a loud
/// parse error rather than a silent wraparound.
pub fn parse_integer(text: &str) -> Result<u32, String> {
    let s = text.trim();
    if s.is_empty() {
        return Err("empty integer literal".into());
    }
    if let Some(rest) = s.strip_prefix('-') {
        let _ = rest;
        return Err(format!("negative literals are not supported: '{}'", s));
    }
    let (digits, radix) = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        (rest, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    u32::from_str_radix(digits, radix).map_err(|_| format!("invalid integer literal '{}'", s))
}

/// Is this token a double-quoted string literal?
pub fn is_string_literal(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('"') && token.ends_with('"')
}

/// Strip the surrounding quotes from a string literal, leaving the raw text
/// (no escape processing — the source format doesn't define any).
pub fn string_literal_contents(token: &str) -> &str {
    &token[1..token.len() - 1]
}

/// Maximum representable unsigned value for an `n`-bit field.
fn max_for_width(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// Pack a literal integer into `n`-bit little-endian bytes (`n` in
/// `{8,16,32}`). Errors if the value overflows the declared width.
pub fn pack_literal(value: u32, n: u32) -> Result<Vec<u8>, String> {
    if (value as u64) > max_for_width(n) {
        return Err(format!(
            "literal {} does not fit in {} bits",
            value, n
        ));
    }
    Ok(match n {
        8 => alloc::vec![value as u8],
        16 => (value as u16).to_le_bytes().to_vec(),
        32 => value.to_le_bytes().to_vec(),
        other => return Err(format!("unsupported directive width {}", other)),
    })
}

/// Encode a ROM string literal: raw bytes followed by a null terminator.
pub fn pack_string(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// Parse a `DCn`/`DVn` type tag into its numeric width, e.g. `"DC8"` -> `8`.
pub fn parse_width(type_tag: &str) -> Option<(bool, u32)> {
    let (is_const, rest) = if let Some(rest) = type_tag.strip_prefix("DC") {
        (true, rest)
    } else if let Some(rest) = type_tag.strip_prefix("DV") {
        (false, rest)
    } else {
        return None;
    };
    match rest {
        "8" => Some((is_const, 8)),
        "16" => Some((is_const, 16)),
        "32" => Some((is_const, 32)),
        _ => None,
    }
}
