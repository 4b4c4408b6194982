//! Two-pass text assembler (SPEC_FULL.md §4.1).
//!
//! Pass one walks the source computing each label's byte address; pass two
//! walks it again emitting bytes, resolving operands against the label table
//! built in pass one.

use crate::error::AssembleError;
use crate::opcode::OpCode;
use crate::word::Word;
use std::collections::HashMap;

/// A line stripped of comments and split into tokens, with its 1-based source
/// line number kept for diagnostics.
struct Line<'a> {
    number: usize,
    label: Option<&'a str>,
    mnemonic: Option<&'a str>,
    operand: Option<&'a str>,
}

/// Strip a `;`-introduced comment, then split off an optional `IDENT:` label
/// prefix and an optional `MNEMONIC [OPERAND]` instruction.
fn tokenize(number: usize, raw: &str) -> Option<Line<'_>> {
    let without_comment = match raw.find(';') {
        Some(idx) => &raw[..idx],
        None => raw,
    };

    let mut rest = without_comment.trim();
    if rest.is_empty() {
        return None;
    }

    let mut label = None;
    if let Some(colon) = rest.find(':') {
        let candidate = rest[..colon].trim();
        if !candidate.is_empty() && candidate.split_whitespace().count() == 1 {
            label = Some(candidate);
            rest = rest[colon + 1..].trim();
        }
    }

    if rest.is_empty() {
        return Some(Line { number, label, mnemonic: None, operand: None });
    }

    let mut parts = rest.split_whitespace();
    let mnemonic = parts.next();
    let operand = parts.next();
    Some(Line { number, label, mnemonic, operand })
}

/// Size in bytes of the instruction named by `mnemonic`, used by the address pass.
fn instruction_len(op: OpCode) -> usize {
    if op.has_immediate() {
        5
    } else {
        1
    }
}

fn resolve_mnemonic(number: usize, mnemonic: &str) -> Result<OpCode, AssembleError> {
    OpCode::from_mnemonic(mnemonic).ok_or_else(|| AssembleError::UnknownMnemonic {
        line: number,
        mnemonic: mnemonic.to_string(),
    })
}

fn resolve_operand(
    number: usize,
    mnemonic: &str,
    op: OpCode,
    operand: Option<&str>,
    labels: &HashMap<String, Word>,
) -> Result<Option<Word>, AssembleError> {
    match (op.has_immediate(), operand) {
        (false, None) => Ok(None),
        (false, Some(_)) => Err(AssembleError::UnexpectedOperand {
            line: number,
            mnemonic: mnemonic.to_string(),
        }),
        (true, None) => Err(AssembleError::MissingOperand {
            line: number,
            mnemonic: mnemonic.to_string(),
        }),
        (true, Some(text)) => {
            if let Some(&addr) = labels.get(text) {
                return Ok(Some(addr));
            }
            let looks_like_ident = text.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_');
            match text.parse::<Word>() {
                Ok(value) => Ok(Some(value)),
                Err(_) if looks_like_ident => {
                    Err(AssembleError::UnresolvedLabel { line: number, name: text.to_string() })
                }
                Err(_) => Err(AssembleError::MalformedInteger { line: number, text: text.to_string() }),
            }
        }
    }
}

/// Assemble `source` into a raw bytecode image.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssembleError> {
    let lines: Vec<Line<'_>> = source
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| tokenize(i + 1, raw))
        .collect();

    // Pass 1: address resolution.
    let mut labels: HashMap<String, Word> = HashMap::new();
    let mut addr: usize = 0;
    for line in &lines {
        if let Some(name) = line.label {
            if labels.insert(name.to_string(), addr as Word).is_some() {
                return Err(AssembleError::DuplicateLabel { line: line.number, name: name.to_string() });
            }
        }
        if let Some(mnemonic) = line.mnemonic {
            let op = resolve_mnemonic(line.number, mnemonic)?;
            addr += instruction_len(op);
        }
    }

    // Pass 2: emission.
    let mut image = Vec::with_capacity(addr);
    for line in &lines {
        let Some(mnemonic) = line.mnemonic else { continue };
        let op = resolve_mnemonic(line.number, mnemonic)?;
        image.push(op as u8);
        if let Some(value) = resolve_operand(line.number, mnemonic, op, line.operand, &labels)? {
            image.extend_from_slice(&value.to_le_bytes());
        }
    }

    Ok(image)
}
