use std::fmt::Write;

use serde::Serialize;

use crate::bytecode::ir::Program;
use crate::bytecode::op::{InstructionSet, Reg};
use crate::lang::value::{Carrier, ImmKind};

/// One decoded instruction of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRow {
    pub ip: usize,
    pub op: &'static str,
    /// Register operands as written, e.g. `r0`, `f2`.
    pub registers: Vec<String>,
    /// Immediate rendered per the opcode's kind; absent for bare opcodes.
    pub imm: Option<String>,
    /// Immediate bits, zero-extended from the carrier.
    pub raw: u64,
    /// Some branch in the program lands here.
    pub is_branch_target: bool,
}

/// Decode every instruction through the program's dispatch table.
pub fn listing<I: InstructionSet>(program: &Program<I>) -> Vec<ListingRow> {
    let targets = collect_branch_targets(program);
    let table = program.table();

    program
        .ops()
        .iter()
        .zip(program.imm())
        .enumerate()
        .map(|(ip, (target, imm))| {
            let index = target.opcode as usize;
            let shape = table.shape(index);
            let registers = shape
                .regs
                .iter()
                .zip(target.operands.0.iter())
                .filter_map(|(reg, n)| match reg {
                    Reg::None => None,
                    Reg::General => Some(format!("r{}", n)),
                    Reg::Float => Some(format!("f{}", n)),
                })
                .collect();

            ListingRow {
                ip,
                op: table.name(index),
                registers,
                imm: shape.imm.format(*imm),
                raw: imm.bits(),
                is_branch_target: targets.contains(&ip),
            }
        })
        .collect()
}

fn collect_branch_targets<I: InstructionSet>(program: &Program<I>) -> Vec<usize> {
    let table = program.table();
    let mut targets = Vec::new();

    for (target, imm) in program.ops().iter().zip(program.imm()) {
        if table.shape(target.opcode as usize).imm == ImmKind::Target {
            let to = imm.as_position();
            if !targets.contains(&to) {
                targets.push(to);
            }
        }
    }

    targets
}

/// Render the program as a boxed listing with branch destinations marked.
pub fn disassemble<I: InstructionSet>(program: &Program<I>) -> String {
    let mut out = String::new();
    let rows = listing(program);

    let _ = writeln!(out, "════════════════════════════════════════");
    let _ = writeln!(out, " {} instructions", rows.len());
    let _ = writeln!(out, "════════════════════════════════════════");

    for row in &rows {
        if row.is_branch_target {
            let _ = writeln!(out, "      ┌──────────────────────────────────");
        }

        let marker = if row.is_branch_target { "► " } else { "  " };
        let _ = write!(out, "{:04} {}{:<11} {}", row.ip, marker, row.op, operand_text(row));

        if let Some(direction) = branch_direction(program, row) {
            let _ = write!(out, " {}", direction);
        }
        let _ = writeln!(out);
    }

    out
}

fn operand_text(row: &ListingRow) -> String {
    let mut parts = row.registers.clone();
    if let Some(imm) = &row.imm {
        parts.push(imm.clone());
    }
    parts.join(", ")
}

fn branch_direction<I: InstructionSet>(program: &Program<I>, row: &ListingRow) -> Option<&'static str> {
    let target = program.ops()[row.ip];
    if !program.table().shape(target.opcode as usize).is_branch() {
        return None;
    }
    if row.raw as usize <= row.ip {
        Some("↑")
    } else {
        Some("↓")
    }
}

/// Print disassembly of a program
pub fn print_program<I: InstructionSet>(program: &Program<I>) {
    print!("{}", disassemble(program));
}
