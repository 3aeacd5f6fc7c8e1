//! Lexical layer: comment stripping, line splitting, operand tokenizing.
//!
//! Mirrors `kernel/src/trustlang/lexer.rs`'s tokenizer split, simplified to
//! line-oriented assembly rather than a full expression grammar.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// The parsed shape of one non-blank source line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    /// `.name:` — a code label definition.
    CodeLabel { name: String },
    /// `$name DCn arg, arg, ...` or `$name DVn count` — a data directive.
    DataDirective {
        name: String,
        type_tag: String,
        args: Vec<String>,
    },
    /// `mnemonic arg, arg, ...`
    Instruction {
        mnemonic: String,
        operands: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub number: usize,
    pub kind: LineKind,
}

/// Strip a `;`-to-end-of-line comment, respecting double-quoted strings so a
/// `;` inside a string literal is not treated as a comment start.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Split a comma-separated operand list, trimming each operand. Commas
/// inside double-quoted strings do not split.
fn split_operands(rest: &str) -> Vec<String> {
    let mut operands = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for ch in rest.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            ',' if !in_string => {
                operands.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let tail = current.trim();
    if !tail.is_empty() || !operands.is_empty() {
        operands.push(tail.to_string());
    }
    operands
}

/// Tokenize assembly source into structured, non-blank lines.
///
/// Returns `Err((line_number, message))` for lines that are not well-formed
/// at the lexical level (e.g. a label missing its trailing `:`).
pub fn tokenize(source: &str) -> Result<Vec<SourceLine>, (usize, String)> {
    let mut lines = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let stripped = strip_comment(raw).trim();
        if stripped.is_empty() {
            continue;
        }

        let (lead, rest) = match stripped.find(char::is_whitespace) {
            Some(pos) => (&stripped[..pos], stripped[pos..].trim_start()),
            None => (stripped, ""),
        };

        let kind = if lead.starts_with('.') {
            if !lead.ends_with(':') || !rest.is_empty() {
                return Err((number, alloc::format!("malformed label '{}'", stripped)));
            }
            LineKind::CodeLabel {
                name: lead[..lead.len() - 1].to_string(),
            }
        } else if lead.starts_with('$') {
            let mut rest_tokens = rest.splitn(2, char::is_whitespace);
            let type_tag = rest_tokens
                .next()
                .ok_or_else(|| (number, "missing data directive type tag".to_string()))?;
            let arg_text = rest_tokens.next().unwrap_or("").trim_start();
            LineKind::DataDirective {
                name: lead.to_string(),
                type_tag: type_tag.to_string(),
                args: split_operands(arg_text),
            }
        } else {
            LineKind::Instruction {
                mnemonic: lead.to_ascii_lowercase(),
                operands: split_operands(rest),
            }
        };

        lines.push(SourceLine { number, kind });
    }
    Ok(lines)
}
