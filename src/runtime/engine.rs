//! Dispatch loop.
//!
//! Every op slot already holds its resolved handler, so each step is one
//! indirect call on the slot at `ip` followed by the handler's own choice of
//! the next position. There is no decode step, no step limit and no
//! recoverable error path: a program that never reaches its halt instruction
//! runs forever, and a branch past the end of the buffer is a caller bug that
//! surfaces as a bounds-check panic.

use tracing::trace;

use crate::bytecode::ir::Program;
use crate::bytecode::op::{Flow, InstructionSet};

/// Run `program` from position 0 until its halt instruction, then return the
/// instruction set's designated result read from `state`.
///
/// The program is borrowed for the whole run, so it cannot be appended to or
/// patched while executing; a patch made before the call is visible to it.
///
/// # Panics
///
/// Panics if the program does not end with the halt instruction.
pub fn run<I: InstructionSet>(program: &Program<I>, state: &mut I::State) -> I::Output {
    assert!(
        program.is_terminated(),
        "program of {} instructions does not end with the halt instruction",
        program.len()
    );

    let ops = program.ops();
    let imm = program.imm();
    trace!(instructions = ops.len(), "run start");

    let mut ip = 0;
    loop {
        let target = &ops[ip];
        match (target.handler)(state, target.operands, imm[ip]) {
            Flow::Next => ip += 1,
            Flow::Jump(to) => ip = to,
            Flow::Halt => break,
        }
    }

    trace!(halted_at = ip, "run end");
    I::output(state)
}
