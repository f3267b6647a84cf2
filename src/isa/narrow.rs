//! Integer-only instruction set over a 32-bit immediate carrier.
//!
//! Registers are the same file as [`crate::isa::basic::Basic`] uses, but every
//! result is kept to 32 bits, so arithmetic wraps at `u32::MAX`. Only the
//! general bank is touched.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::bytecode::ir::{Program, Reloc};
use crate::bytecode::op::{Flow, InstructionSet, OpcodeSpec, Operands, Reg, Shape};
use crate::isa::regs::Registers;
use crate::lang::value::{ImmKind, Value32};
use crate::runtime::table::DispatchTable;

/// Opcodes of [`Narrow`].
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NarrowOp {
    End,
    Movi,
    Movsi,
    Movr,
    Addr,
    Addi,
    Subi,
    Bltr,
    Blts,
    Bner,
    Jmp,
}

#[derive(Debug, Clone, Copy)]
pub struct Narrow;

impl InstructionSet for Narrow {
    type Opcode = NarrowOp;
    type Imm = Value32;
    type State = Registers;
    type Output = Option<u64>;

    const END: NarrowOp = NarrowOp::End;

    fn index(op: NarrowOp) -> usize {
        op as usize
    }

    fn table() -> &'static DispatchTable<Registers, Value32> {
        static TABLE: OnceLock<DispatchTable<Registers, Value32>> = OnceLock::new();
        TABLE.get_or_init(|| DispatchTable::build(build_specs()))
    }

    fn output(state: &Registers) -> Option<u64> {
        state.result()
    }
}

#[inline(always)]
fn reg(r: &Registers, index: usize) -> u32 {
    r.general[index] as u32
}

fn movi(r: &mut Registers, o: Operands, imm: Value32) -> Flow {
    r.general[o.r0()] = imm.as_u32() as u64;
    Flow::Next
}

// Sign extension stops at 32 bits; the register keeps the narrow pattern.
fn movsi(r: &mut Registers, o: Operands, imm: Value32) -> Flow {
    r.general[o.r0()] = imm.as_u32() as u64;
    Flow::Next
}

fn movr(r: &mut Registers, o: Operands, _imm: Value32) -> Flow {
    r.general[o.r0()] = reg(r, o.r1()) as u64;
    Flow::Next
}

fn addr(r: &mut Registers, o: Operands, _imm: Value32) -> Flow {
    r.general[o.r0()] = reg(r, o.r1()).wrapping_add(reg(r, o.r2())) as u64;
    Flow::Next
}

fn addi(r: &mut Registers, o: Operands, imm: Value32) -> Flow {
    r.general[o.r0()] = reg(r, o.r1()).wrapping_add(imm.as_u32()) as u64;
    Flow::Next
}

fn subi(r: &mut Registers, o: Operands, imm: Value32) -> Flow {
    r.general[o.r0()] = reg(r, o.r1()).wrapping_sub(imm.as_u32()) as u64;
    Flow::Next
}

#[inline(always)]
fn branch_if(taken: bool, imm: Value32) -> Flow {
    if taken {
        Flow::Jump(imm.as_u32() as usize)
    } else {
        Flow::Next
    }
}

fn bltr(r: &mut Registers, o: Operands, imm: Value32) -> Flow {
    branch_if(reg(r, o.r0()) < reg(r, o.r1()), imm)
}

fn blts(r: &mut Registers, o: Operands, imm: Value32) -> Flow {
    branch_if((reg(r, o.r0()) as i32) < (reg(r, o.r1()) as i32), imm)
}

fn bner(r: &mut Registers, o: Operands, imm: Value32) -> Flow {
    branch_if(reg(r, o.r0()) != reg(r, o.r1()), imm)
}

fn jmp(_r: &mut Registers, _o: Operands, imm: Value32) -> Flow {
    Flow::Jump(imm.as_u32() as usize)
}

fn build_specs() -> Vec<OpcodeSpec<Registers, Value32>> {
    use ImmKind::{Signed, Target, Unsigned};
    use NarrowOp::*;

    const G: Reg = Reg::General;
    const N: Reg = Reg::None;

    macro_rules! op {
        ($kind:ident, $name:literal, [$a:expr, $b:expr, $c:expr], $imm:expr, $handler:ident) => {
            OpcodeSpec {
                index: $kind as usize,
                name: $name,
                shape: Shape::new([$a, $b, $c], $imm),
                handler: $handler,
            }
        };
    }

    vec![
        op!(Movi, "MOVI", [G, N, N], Unsigned, movi),
        op!(Movsi, "MOVSI", [G, N, N], Signed, movsi),
        op!(Movr, "MOVR", [G, G, N], ImmKind::None, movr),
        op!(Addr, "ADDR", [G, G, G], ImmKind::None, addr),
        op!(Addi, "ADDI", [G, G, N], Unsigned, addi),
        op!(Subi, "SUBI", [G, G, N], Unsigned, subi),
        op!(Bltr, "BLTR", [G, G, N], Target, bltr),
        op!(Blts, "BLTS", [G, G, N], Target, blts),
        op!(Bner, "BNER", [G, G, N], Target, bner),
        op!(Jmp, "JMP", [N, N, N], Target, jmp),
    ]
}

/// Emitters for [`Narrow`], in the same calling convention as the
/// [`crate::isa::basic::select`] helpers.
pub mod select {
    use super::*;

    pub fn movi(p: &mut Program<Narrow>, d: u8, imm: u32) {
        p.push_imm_op(NarrowOp::Movi, Operands::one(d), imm as u64);
    }

    pub fn movsi(p: &mut Program<Narrow>, d: u8, imm: i32) {
        p.push_imm_op(NarrowOp::Movsi, Operands::one(d), imm as u32 as u64);
    }

    pub fn movr(p: &mut Program<Narrow>, d: u8, s: u8) {
        p.push_op(NarrowOp::Movr, Operands::two(d, s));
    }

    pub fn addr(p: &mut Program<Narrow>, d: u8, a: u8, b: u8) {
        p.push_op(NarrowOp::Addr, Operands::three(d, a, b));
    }

    pub fn addi(p: &mut Program<Narrow>, d: u8, a: u8, imm: u32) {
        p.push_imm_op(NarrowOp::Addi, Operands::two(d, a), imm as u64);
    }

    pub fn subi(p: &mut Program<Narrow>, d: u8, a: u8, imm: u32) {
        p.push_imm_op(NarrowOp::Subi, Operands::two(d, a), imm as u64);
    }

    fn branch(p: &mut Program<Narrow>, op: NarrowOp, operands: Operands, target: u32) -> Reloc {
        let r = p.reloc();
        p.push_imm_op(op, operands, target as u64);
        r
    }

    pub fn bltr(p: &mut Program<Narrow>, a: u8, b: u8, target: u32) -> Reloc {
        branch(p, NarrowOp::Bltr, Operands::two(a, b), target)
    }

    pub fn blts(p: &mut Program<Narrow>, a: u8, b: u8, target: u32) -> Reloc {
        branch(p, NarrowOp::Blts, Operands::two(a, b), target)
    }

    pub fn bner(p: &mut Program<Narrow>, a: u8, b: u8, target: u32) -> Reloc {
        branch(p, NarrowOp::Bner, Operands::two(a, b), target)
    }

    pub fn jmp(p: &mut Program<Narrow>, target: u32) -> Reloc {
        branch(p, NarrowOp::Jmp, Operands::NONE, target)
    }
}
