//! A small stack-based virtual machine: assembler, interpreter, template JIT, and GC.
//!
//! The pipeline is: [`assembler`] turns mnemonic source into a [`Word`]-oriented
//! bytecode image, [`decode`] fetches one instruction at a time from that image,
//! [`interpreter`] drives a fetch-decode-execute loop against an operand stack,
//! a call stack, and linear memory (allocating through [`gc`] on demand), and
//! [`jit`] optionally compiles the same image to native code as a drop-in
//! replacement for the interpreter on a supported opcode subset.

pub mod assembler;
pub mod decode;
pub mod error;
pub mod gc;
pub mod interpreter;
pub mod jit;
pub mod opcode;
pub mod word;

pub use error::Trap;
pub use word::Word;
