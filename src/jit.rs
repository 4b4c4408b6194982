//! Template JIT: compiles a bytecode image straight to native x86-64
//! (SPEC_FULL.md §4.3), one instruction at a time, with no optimization pass.
//!
//! Grounded on the dynasm-based regex backend's `PikeJIT`: a dynamic label per
//! bytecode offset (so branches resolve regardless of emission order), a
//! pinned register holding a context pointer, and `ops.finalize()` handing
//! back an `ExecutableBuffer` whose `.ptr(entry)` is transmuted to a function
//! pointer. Unlike that backend this one is a clean subset compiler: any
//! opcode [`OpCode::jit_supported`] rejects aborts compilation up front
//! rather than falling back to an interpreted path.

use std::collections::HashMap;
use std::mem;

use dynasmrt::{dynasm, x64::Assembler, AssemblyOffset, DynamicLabel, DynasmApi, DynasmLabelApi, ExecutableBuffer};

use crate::decode::{self, Instruction};
use crate::error::{JitError, Trap};
use crate::opcode::OpCode;
use crate::word::{self, Word};

/// Bundles the `.arch x64` directive and this module's register assignment
/// onto every emission site, the same way `PikeJIT`'s own wrapper macro does.
///
/// `ctx` is pinned to `rbx` for the whole function body (callee-saved, so it
/// survives across the `idiv` and `cdq` instructions that clobber `rax`/`rdx`).
/// `sp` holds the *word* count, not a byte offset; every stack access scales
/// it by 4 in the addressing mode rather than pre-multiplying.
macro_rules! emit {
    ($ops:expr, $($t:tt)*) => {
        dynasm!($ops
            ; .arch x64
            ; .alias ctx, rbx
            ; .alias stack_base, r8
            ; .alias mem_base, r9
            ; .alias sp, rcx
            ; .alias scratch_a, eax
            ; .alias scratch_b, edx
            ; .alias scratch_c, r10d
            ; $($t)*
        )
    };
}

const FLAG_LT: i32 = 0;
const FLAG_EQ: i32 = 1;
const FLAG_GT: i32 = 2;

const CTX_STACK_PTR: i32 = 0;
const CTX_SP: i32 = 8;
const CTX_MEMORY_PTR: i32 = 16;
const CTX_FLAG: i32 = 24;
const CTX_TRAP_CODE: i32 = 28;

/// Lives on the native stack for the duration of one [`Jit::run`] call. Native
/// code reaches every field through `ctx` (`rbx`); field offsets above must
/// match this layout exactly since the generated code addresses them by byte
/// offset, not by name.
#[repr(C)]
struct JitContext {
    stack_ptr: *mut Word,
    sp: u64,
    memory_ptr: *mut Word,
    flag: i32,
    trap_code: i32,
}

enum Arith {
    Add,
    Sub,
    Mul,
}

struct Compiler {
    ops: Assembler,
    labels: HashMap<usize, DynamicLabel>,
    trap_underflow: DynamicLabel,
    trap_overflow: DynamicLabel,
    trap_oob: DynamicLabel,
    trap_divzero: DynamicLabel,
    trap_tail: DynamicLabel,
    exit: DynamicLabel,
    s_max: i32,
}

impl Compiler {
    fn bind(&mut self, offset: usize) {
        let label = self.labels[&offset];
        emit!(self.ops, => label);
    }

    fn prologue(&mut self) {
        emit!(self.ops,
            push rbx
            ; mov ctx, rdi
            ; mov stack_base, [ctx + CTX_STACK_PTR]
            ; mov mem_base, [ctx + CTX_MEMORY_PTR]
            ; mov sp, [ctx + CTX_SP]
        );
    }

    fn epilogue(&mut self) {
        let zero = self.ops.new_dynamic_label();
        let done = self.ops.new_dynamic_label();
        emit!(self.ops,
            => self.exit
            ; mov [ctx + CTX_SP], sp
            ; mov DWORD [ctx + CTX_TRAP_CODE], 0
            ; cmp sp, 0
            ; je => zero
            ; mov scratch_a, [stack_base + sp*4 - 4]
            ; jmp => done
            ; => zero
            ; xor scratch_a, scratch_a
            ; => done
            ; pop rbx
            ; ret
        );
    }

    /// Every trap is a `set trap_code; jump to a shared tail that zeroes the
    /// result and returns`. The caller never reads a result word on a trap
    /// (see [`Jit::run`]), so none of these bother restoring `sp`.
    fn traps(&mut self) {
        emit!(self.ops,
            => self.trap_underflow
            ; mov DWORD [ctx + CTX_TRAP_CODE], 1
            ; jmp => self.trap_tail
            ; => self.trap_overflow
            ; mov DWORD [ctx + CTX_TRAP_CODE], 2
            ; jmp => self.trap_tail
            ; => self.trap_oob
            ; mov DWORD [ctx + CTX_TRAP_CODE], 3
            ; jmp => self.trap_tail
            ; => self.trap_divzero
            ; mov DWORD [ctx + CTX_TRAP_CODE], 4
            ; => self.trap_tail
            ; xor eax, eax
            ; pop rbx
            ; ret
        );
    }

    fn branch_target(&self, instr: &Instruction) -> Result<DynamicLabel, JitError> {
        let raw = instr.imm.expect("branch instructions carry an immediate");
        let offset = usize::try_from(raw).map_err(|_| JitError::InvalidBranchTarget { target: raw as usize })?;
        self.labels.get(&offset).copied().ok_or(JitError::InvalidBranchTarget { target: offset })
    }

    fn arithmetic(&mut self, op: Arith) {
        emit!(self.ops,
            cmp sp, 2
            ; jl => self.trap_underflow
            ; mov scratch_b, [stack_base + sp*4 - 4]
            ; mov scratch_a, [stack_base + sp*4 - 8]
            ; sub sp, 2
        );
        match op {
            Arith::Add => emit!(self.ops, add scratch_a, scratch_b),
            Arith::Sub => emit!(self.ops, sub scratch_a, scratch_b),
            Arith::Mul => emit!(self.ops, imul scratch_a, scratch_b),
        }
        emit!(self.ops,
            mov [stack_base + sp*4], scratch_a
            ; inc sp
        );
    }

    fn translate(&mut self, instr: &Instruction, m_max: usize) -> Result<(), JitError> {
        match instr.op {
            OpCode::Push => {
                let imm = instr.imm.expect("PUSH carries an immediate");
                emit!(self.ops,
                    cmp sp, self.s_max as i64
                    ; jge => self.trap_overflow
                    ; mov DWORD [stack_base + sp*4], imm
                    ; inc sp
                );
            }
            OpCode::Pop => {
                emit!(self.ops,
                    cmp sp, 0
                    ; je => self.trap_underflow
                    ; dec sp
                );
            }
            OpCode::Dup => {
                emit!(self.ops,
                    cmp sp, 0
                    ; je => self.trap_underflow
                    ; cmp sp, self.s_max as i64
                    ; jge => self.trap_overflow
                    ; mov scratch_a, [stack_base + sp*4 - 4]
                    ; mov [stack_base + sp*4], scratch_a
                    ; inc sp
                );
            }
            OpCode::Add => self.arithmetic(Arith::Add),
            OpCode::Sub => self.arithmetic(Arith::Sub),
            OpCode::Mul => self.arithmetic(Arith::Mul),
            OpCode::Div => {
                emit!(self.ops,
                    cmp sp, 2
                    ; jl => self.trap_underflow
                    ; mov scratch_c, [stack_base + sp*4 - 4]
                    ; mov scratch_a, [stack_base + sp*4 - 8]
                    ; cmp scratch_c, 0
                    ; je => self.trap_divzero
                    ; cdq
                    ; idiv scratch_c
                    ; sub sp, 2
                    ; mov [stack_base + sp*4], scratch_a
                    ; inc sp
                );
            }
            OpCode::Cmp => {
                let lt = self.ops.new_dynamic_label();
                let gt = self.ops.new_dynamic_label();
                let done = self.ops.new_dynamic_label();
                emit!(self.ops,
                    cmp sp, 2
                    ; jl => self.trap_underflow
                    ; mov scratch_b, [stack_base + sp*4 - 4]
                    ; mov scratch_a, [stack_base + sp*4 - 8]
                    ; sub sp, 2
                    ; cmp scratch_a, scratch_b
                    ; jl => lt
                    ; jg => gt
                    ; mov DWORD [ctx + CTX_FLAG], FLAG_EQ
                    ; jmp => done
                    ; => lt
                    ; mov DWORD [ctx + CTX_FLAG], FLAG_LT
                    ; jmp => done
                    ; => gt
                    ; mov DWORD [ctx + CTX_FLAG], FLAG_GT
                    ; => done
                );
            }
            OpCode::Jmp => {
                let target = self.branch_target(instr)?;
                emit!(self.ops, jmp => target);
            }
            OpCode::Jz => {
                let target = self.branch_target(instr)?;
                emit!(self.ops,
                    mov scratch_a, [ctx + CTX_FLAG]
                    ; cmp scratch_a, FLAG_EQ
                    ; je => target
                );
            }
            OpCode::Jnz => {
                // JNZ is disjoint from JZ: it pops the top-of-stack and
                // branches on that value instead of reading CTX_FLAG
                // (SPEC_FULL.md §9).
                let target = self.branch_target(instr)?;
                emit!(self.ops,
                    cmp sp, 0
                    ; je => self.trap_underflow
                    ; dec sp
                    ; mov scratch_a, [stack_base + sp*4]
                    ; cmp scratch_a, 0
                    ; jne => target
                );
            }
            OpCode::Store => {
                let addr = instr.imm.expect("STORE carries an immediate");
                match usize::try_from(addr).ok().filter(|&a| a < m_max) {
                    Some(a) => {
                        let disp = (a as i32) * 4;
                        emit!(self.ops,
                            cmp sp, 0
                            ; je => self.trap_underflow
                            ; dec sp
                            ; mov scratch_a, [stack_base + sp*4]
                            ; mov [mem_base + disp], scratch_a
                        );
                    }
                    None => emit!(self.ops, jmp => self.trap_oob),
                }
            }
            OpCode::Load => {
                let addr = instr.imm.expect("LOAD carries an immediate");
                match usize::try_from(addr).ok().filter(|&a| a < m_max) {
                    Some(a) => {
                        let disp = (a as i32) * 4;
                        emit!(self.ops,
                            cmp sp, self.s_max as i64
                            ; jge => self.trap_overflow
                            ; mov scratch_a, [mem_base + disp]
                            ; mov [stack_base + sp*4], scratch_a
                            ; inc sp
                        );
                    }
                    None => emit!(self.ops, jmp => self.trap_oob),
                }
            }
            OpCode::Halt => emit!(self.ops, jmp => self.exit),

            OpCode::Call | OpCode::Ret | OpCode::Read | OpCode::Alloc | OpCode::GetField | OpCode::SetField => {
                unreachable!("filtered out by OpCode::jit_supported before translation")
            }
        }
        Ok(())
    }
}

/// A compiled, ready-to-run image. Holds the executable mapping alive for as
/// long as callers want to run it.
pub struct Jit {
    code: ExecutableBuffer,
    entry: AssemblyOffset,
    s_max: usize,
    m_max: usize,
}

impl Jit {
    pub fn compile(image: &[u8]) -> Result<Jit, JitError> {
        Jit::compile_with_limits(image, word::S_MAX, word::M_MAX)
    }

    /// Compile `image`, or report the first unsupported opcode / bad branch
    /// target encountered. Every [`OpCode::jit_supported`] opcode is checked
    /// before any code is emitted, so a rejection never leaves a half-built
    /// buffer behind.
    pub fn compile_with_limits(image: &[u8], s_max: usize, m_max: usize) -> Result<Jit, JitError> {
        let instructions =
            decode::decode_all(image).map_err(|trap| JitError::Backend(trap.to_string()))?;

        for instr in &instructions {
            if !instr.op.jit_supported() {
                return Err(JitError::UnsupportedOpcode { opcode: instr.op as u8, offset: instr.offset });
            }
        }

        let mut ops = Assembler::new().map_err(|e| JitError::Backend(e.to_string()))?;
        let labels: HashMap<usize, DynamicLabel> =
            instructions.iter().map(|instr| (instr.offset, ops.new_dynamic_label())).collect();
        let trap_underflow = ops.new_dynamic_label();
        let trap_overflow = ops.new_dynamic_label();
        let trap_oob = ops.new_dynamic_label();
        let trap_divzero = ops.new_dynamic_label();
        let trap_tail = ops.new_dynamic_label();
        let exit = ops.new_dynamic_label();

        let mut compiler = Compiler {
            ops,
            labels,
            trap_underflow,
            trap_overflow,
            trap_oob,
            trap_divzero,
            trap_tail,
            exit,
            s_max: s_max as i32,
        };

        let entry = compiler.ops.offset();
        compiler.prologue();
        for instr in &instructions {
            compiler.bind(instr.offset);
            compiler.translate(instr, m_max)?;
        }
        compiler.epilogue();
        compiler.traps();

        let code = compiler
            .ops
            .finalize()
            .map_err(|_| JitError::Backend("relocation of generated code failed".to_string()))?;

        Ok(Jit { code, entry, s_max, m_max })
    }

    /// Run the compiled image to completion. Allocates fresh stack/memory
    /// buffers each call so a `Jit` can be run more than once.
    pub fn run(&self) -> Result<Word, Trap> {
        let mut stack = vec![0 as Word; self.s_max];
        let mut memory = vec![0 as Word; self.m_max];
        let mut ctx = JitContext {
            stack_ptr: stack.as_mut_ptr(),
            sp: 0,
            memory_ptr: memory.as_mut_ptr(),
            flag: FLAG_EQ,
            trap_code: 0,
        };

        let entry: extern "sysv64" fn(*mut JitContext) -> Word =
            unsafe { mem::transmute(self.code.ptr(self.entry)) };
        let result = entry(&mut ctx);

        if ctx.trap_code == 0 {
            Ok(result)
        } else {
            Err(Trap::from_code(ctx.trap_code).unwrap_or(Trap::InvalidReference))
        }
    }
}
