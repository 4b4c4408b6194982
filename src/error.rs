//! The three error domains named in SPEC_FULL.md §4.6: assembly, runtime traps,
//! and JIT compilation failure. Kept as distinct `thiserror` enums rather than
//! one catch-all string so callers can match on the failure kind.

use thiserror::Error;

/// A fatal runtime condition. Shared by the interpreter and the JIT so both
/// engines report the same message substring for the same condition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    #[error("Stack Underflow")]
    StackUnderflow,
    #[error("Stack Overflow")]
    StackOverflow,
    #[error("Memory Access Out of Bounds")]
    MemoryOutOfBounds,
    #[error("Division by Zero")]
    DivisionByZero,
    #[error("Invalid Opcode: {0:#04x}")]
    InvalidOpcode(u8),
    #[error("Invalid PC: {0}")]
    InvalidPc(usize),
    #[error("Invalid Reference")]
    InvalidReference,
}

/// A numeric encoding of [`Trap`] used to carry a trap out of JIT-compiled
/// native code, which cannot return a Rust enum directly. `0` means no trap.
impl Trap {
    pub fn to_code(self) -> i32 {
        match self {
            Trap::StackUnderflow => 1,
            Trap::StackOverflow => 2,
            Trap::MemoryOutOfBounds => 3,
            Trap::DivisionByZero => 4,
            Trap::InvalidOpcode(_) => 5,
            Trap::InvalidPc(_) => 6,
            Trap::InvalidReference => 7,
        }
    }

    pub fn from_code(code: i32) -> Option<Trap> {
        match code {
            1 => Some(Trap::StackUnderflow),
            2 => Some(Trap::StackOverflow),
            3 => Some(Trap::MemoryOutOfBounds),
            4 => Some(Trap::DivisionByZero),
            5 => Some(Trap::InvalidOpcode(0)),
            6 => Some(Trap::InvalidPc(0)),
            7 => Some(Trap::InvalidReference),
            _ => None,
        }
    }
}

/// Assembly-time errors. Each variant carries the 1-based source line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("line {line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: malformed integer '{text}'")]
    MalformedInteger { line: usize, text: String },

    #[error("line {line}: unresolved label '{name}'")]
    UnresolvedLabel { line: usize, name: String },

    #[error("line {line}: '{mnemonic}' requires an operand")]
    MissingOperand { line: usize, mnemonic: String },

    #[error("line {line}: '{mnemonic}' takes no operand")]
    UnexpectedOperand { line: usize, mnemonic: String },

    #[error("line {line}: label '{name}' defined more than once")]
    DuplicateLabel { line: usize, name: String },
}

/// JIT compilation failures. Distinct from [`Trap`]: these abort *compilation*,
/// not a running program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JitError {
    #[error("JIT Compilation Failed: unsupported opcode {opcode:#04x} at offset {offset}")]
    UnsupportedOpcode { opcode: u8, offset: usize },

    #[error("JIT Compilation Failed: branch target {target} is not a valid instruction boundary")]
    InvalidBranchTarget { target: usize },

    #[error("JIT Error: code generation backend failed: {0}")]
    Backend(String),
}
