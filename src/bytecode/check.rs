//! Optional pre-validation of a built program.
//!
//! The engine itself trusts its buffers. Callers that build programs from
//! untrusted input can run [`check_program`] first to catch what the dispatch
//! loop would otherwise turn into a panic or an endless run past intent.
//!
//! NOTE: This is a linear scan. It does not prove termination; a loop whose
//! exit branch is never taken still passes.

use crate::bytecode::check_error::CheckError;
use crate::bytecode::ir::Program;
use crate::bytecode::op::{InstructionSet, Reg};
use crate::config::MachineConfig;
use crate::lang::value::Carrier;

/// Check termination, branch destinations and register operands.
pub fn check_program<I: InstructionSet>(
    program: &Program<I>,
    machine: &MachineConfig,
) -> Result<(), CheckError> {
    let table = program.table();
    let ops = program.ops();
    let len = ops.len();

    let last = ops.last().ok_or(CheckError::Empty)?;
    if !table.is_halt(last) {
        return Err(CheckError::MissingHalt {
            at: len - 1,
            found: table.name(last.opcode as usize),
        });
    }

    for (at, (target, imm)) in ops.iter().zip(program.imm()).enumerate() {
        let index = target.opcode as usize;
        let shape = table.shape(index);
        let op = table.name(index);

        for (reg, &register) in shape.regs.iter().zip(target.operands.0.iter()) {
            let (bank, available) = match reg {
                Reg::None => continue,
                Reg::General => ("general", machine.general),
                Reg::Float => ("float", machine.float),
            };
            if register as usize >= available {
                return Err(CheckError::RegisterOutOfRange {
                    at,
                    op,
                    bank,
                    index: register as usize,
                    available,
                });
            }
        }

        if shape.is_branch() && imm.as_position() >= len {
            return Err(CheckError::BranchOutOfRange {
                at,
                op,
                target: imm.as_position(),
                len,
            });
        }
    }

    Ok(())
}
