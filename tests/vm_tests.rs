//! End-to-end interpreter scenarios (SPEC_FULL.md §8 literal scenarios).

use std::io::Cursor;

use stackvm::assembler::assemble;
use stackvm::error::Trap;
use stackvm::interpreter::Interpreter;
use stackvm::word::Word;

fn run(source: &str) -> Result<Word, Trap> {
    run_with_stdin(source, "")
}

fn run_with_stdin(source: &str, stdin: &str) -> Result<Word, Trap> {
    let image = assemble(source).expect("assembles");
    let mut interp = Interpreter::new();
    let mut stdin = Cursor::new(stdin.as_bytes().to_vec());
    let mut stdout = Vec::new();
    let result = interp.execute(&image, &mut stdin, &mut stdout)?;
    let printed = String::from_utf8(stdout).unwrap();
    assert_eq!(printed, format!("Top of stack: {result}\n"));
    Ok(result)
}

#[test]
fn scenario_1_push_halt() {
    assert_eq!(run("PUSH 10\nHALT\n"), Ok(10));
}

#[test]
fn scenario_2_addition() {
    assert_eq!(run("PUSH 10\nPUSH 20\nADD\nHALT\n"), Ok(30));
}

#[test]
fn scenario_3_countdown_loop() {
    assert_eq!(run("PUSH 10\nL: PUSH 1\nSUB\nDUP\nJNZ L\nHALT\n"), Ok(0));
}

#[test]
fn scenario_4_call_ret() {
    let source = "JMP main\nsub: PUSH 25\nRET\nmain: CALL sub\nHALT\n";
    assert_eq!(run(source), Ok(25));
}

#[test]
fn scenario_5_memory_store_load() {
    assert_eq!(run("PUSH 123\nSTORE 0\nLOAD 0\nHALT\n"), Ok(123));
}

#[test]
fn scenario_6_division_by_zero() {
    assert_eq!(run("PUSH 5\nPUSH 0\nDIV\nHALT\n"), Err(Trap::DivisionByZero));
}

#[test]
fn scenario_7_out_of_bounds_load() {
    assert_eq!(run("LOAD 999999\nHALT\n"), Err(Trap::MemoryOutOfBounds));
}

#[test]
fn scenario_8_read_from_stdin() {
    assert_eq!(run_with_stdin("READ\nPUSH 1\nADD\nHALT\n", "50\n"), Ok(51));
}

#[test]
fn scenario_9_factorial_of_five() {
    let source = "\
        PUSH 1\nSTORE 0\n\
        PUSH 5\nSTORE 1\n\
        loop: LOAD 1\nPUSH 0\nCMP\nJZ end\n\
        LOAD 0\nLOAD 1\nMUL\nSTORE 0\n\
        LOAD 1\nPUSH 1\nSUB\nSTORE 1\n\
        JMP loop\n\
        end: LOAD 0\nHALT\n";
    assert_eq!(run(source), Ok(120));
}

#[test]
fn falling_off_the_end_without_halt_terminates_normally() {
    assert_eq!(run("PUSH 7\n"), Ok(7));
}

#[test]
fn empty_program_reports_zero() {
    assert_eq!(run(""), Ok(0));
}

#[test]
fn stack_underflow_on_bare_pop() {
    assert_eq!(run("POP\nHALT\n"), Err(Trap::StackUnderflow));
}

#[test]
fn call_stack_underflow_on_bare_ret() {
    assert_eq!(run("RET\nHALT\n"), Err(Trap::StackUnderflow));
}

#[test]
fn negative_memory_index_is_out_of_bounds() {
    assert_eq!(run("LOAD -1\nHALT\n"), Err(Trap::MemoryOutOfBounds));
}

#[test]
fn stack_overflow_is_bounded_by_s_max() {
    let mut interp = Interpreter::with_limits(4, 16);
    let image = assemble("PUSH 1\nPUSH 1\nPUSH 1\nPUSH 1\nPUSH 1\nHALT\n").unwrap();
    let mut stdin = Cursor::new(Vec::new());
    let mut stdout = Vec::new();
    assert_eq!(interp.execute(&image, &mut stdin, &mut stdout), Err(Trap::StackOverflow));
}

#[test]
fn jz_branches_only_on_equal_flag() {
    // CMP(5, 5) -> EQ, so JZ should jump over the poison PUSH.
    let source = "PUSH 5\nPUSH 5\nCMP\nJZ ok\nPUSH 999\nok: PUSH 42\nHALT\n";
    assert_eq!(run(source), Ok(42));
}

#[test]
fn jnz_is_disjoint_from_jz_and_pops_the_top_of_stack_to_decide() {
    // JNZ does not consult the CMP flag; it pops a value and branches iff
    // that value is nonzero (SPEC_FULL.md §9), independent of any prior CMP.
    let branches = "PUSH 1\nJNZ ok\nPUSH 999\nok: PUSH 42\nHALT\n";
    assert_eq!(run(branches), Ok(42));

    let falls_through = "PUSH 0\nJNZ skip\nPUSH 42\nJMP end\nskip: PUSH 999\nend: HALT\n";
    assert_eq!(run(falls_through), Ok(42));
}

#[test]
fn alloc_getfield_setfield_round_trip_through_the_gc_heap() {
    let source = "PUSH 2\nALLOC\nDUP\nPUSH 0\nPUSH 111\nSETFIELD\nDUP\nPUSH 1\nPUSH 222\nSETFIELD\nPUSH 1\nGETFIELD\nHALT\n";
    assert_eq!(run(source), Ok(222));
}

#[test]
fn gc_stats_are_exposed_after_a_run_and_start_from_zero() {
    let image = assemble("HALT\n").unwrap();
    let mut interp = Interpreter::new();
    let mut stdin = Cursor::new(Vec::new());
    let mut stdout = Vec::new();
    interp.execute(&image, &mut stdin, &mut stdout).unwrap();
    let stats = interp.gc_stats();
    assert_eq!(stats.runs, 0);
    assert_eq!(stats.freed, 0);
}
