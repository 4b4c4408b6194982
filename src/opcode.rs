//! Opcode set for the stack machine (SPEC_FULL.md §4.1).
//!
//! Hex values are part of the bytecode file format, not an implementation
//! detail: they must match exactly what the assembler emits and what the
//! decoder and JIT expect.

/// A single VM opcode. `#[repr(u8)]` values match the bytecode image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Push = 0x01,
    Pop = 0x02,
    Dup = 0x03,

    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Cmp = 0x14,

    Jmp = 0x20,
    Jz = 0x21,
    Jnz = 0x22,

    Store = 0x30,
    Load = 0x31,

    Call = 0x40,
    Ret = 0x41,

    Read = 0x50,
    Alloc = 0x51,
    GetField = 0x52,
    SetField = 0x53,

    Halt = 0xFF,
}

impl OpCode {
    /// Every opcode, in a stable order, for table-driven tests and mnemonic lookup.
    pub const ALL: &'static [OpCode] = &[
        OpCode::Push,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Cmp,
        OpCode::Jmp,
        OpCode::Jz,
        OpCode::Jnz,
        OpCode::Store,
        OpCode::Load,
        OpCode::Call,
        OpCode::Ret,
        OpCode::Read,
        OpCode::Alloc,
        OpCode::GetField,
        OpCode::SetField,
        OpCode::Halt,
    ];

    /// The case-insensitive assembly mnemonic for this opcode.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Cmp => "CMP",
            OpCode::Jmp => "JMP",
            OpCode::Jz => "JZ",
            OpCode::Jnz => "JNZ",
            OpCode::Store => "STORE",
            OpCode::Load => "LOAD",
            OpCode::Call => "CALL",
            OpCode::Ret => "RET",
            OpCode::Read => "READ",
            OpCode::Alloc => "ALLOC",
            OpCode::GetField => "GETFIELD",
            OpCode::SetField => "SETFIELD",
            OpCode::Halt => "HALT",
        }
    }

    /// Look up an opcode by its assembly mnemonic, case-insensitively.
    pub fn from_mnemonic(text: &str) -> Option<OpCode> {
        let upper = text.to_ascii_uppercase();
        OpCode::ALL.iter().copied().find(|op| op.mnemonic() == upper)
    }

    /// Whether this instruction is followed by a 4-byte little-endian immediate.
    pub fn has_immediate(self) -> bool {
        matches!(
            self,
            OpCode::Push
                | OpCode::Jmp
                | OpCode::Jz
                | OpCode::Jnz
                | OpCode::Store
                | OpCode::Load
                | OpCode::Call
        )
    }

    /// Whether the JIT's template compiler supports this opcode (SPEC_FULL.md §4.3).
    /// CALL/RET need a call stack and READ/ALLOC/GETFIELD/SETFIELD need the GC
    /// heap and stdin, neither of which the JIT's native context models.
    pub fn jit_supported(self) -> bool {
        !matches!(
            self,
            OpCode::Call
                | OpCode::Ret
                | OpCode::Read
                | OpCode::Alloc
                | OpCode::GetField
                | OpCode::SetField
        )
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        OpCode::ALL
            .iter()
            .copied()
            .find(|op| *op as u8 == byte)
            .ok_or(byte)
    }
}
