//! A small register-machine instruction set.
//!
//! Integer arithmetic wraps. Branch immediates are absolute positions and are
//! normally filled in through a [`Reloc`] once the destination is known.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::bytecode::ir::{Program, Reloc};
use crate::bytecode::op::{Flow, InstructionSet, OpcodeSpec, Operands, Reg, Shape};
use crate::isa::regs::Registers;
use crate::lang::value::{ImmKind, Value};
use crate::runtime::table::DispatchTable;

/// Opcodes of [`Basic`]. `End` is the reserved halt opcode at index 0.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicOp {
    End,

    // integer moves
    Movi,
    Movsi,
    Movr,

    // integer arithmetic
    Addr,
    Addi,
    Subr,
    Subi,
    Mulr,
    Muli,

    // branches
    Bltr,
    Blts,
    Beqr,
    Bner,
    Jmp,

    // double precision
    Movd,
    Addd,
    Subd,
    Muld,
    Divd,
    Bltd,

    // conversions
    Cvtgd,
    Cvtdg,
}

/// The instruction set marker type.
#[derive(Debug, Clone, Copy)]
pub struct Basic;

impl InstructionSet for Basic {
    type Opcode = BasicOp;
    type Imm = Value;
    type State = Registers;
    type Output = Option<u64>;

    const END: BasicOp = BasicOp::End;

    fn index(op: BasicOp) -> usize {
        op as usize
    }

    fn table() -> &'static DispatchTable<Registers, Value> {
        static TABLE: OnceLock<DispatchTable<Registers, Value>> = OnceLock::new();
        TABLE.get_or_init(|| DispatchTable::build(build_specs()))
    }

    fn output(state: &Registers) -> Option<u64> {
        state.result()
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn movi(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    r.general[o.r0()] = imm.as_u64();
    Flow::Next
}

fn movsi(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    r.general[o.r0()] = imm.as_i64() as u64;
    Flow::Next
}

fn movr(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.general[o.r0()] = r.general[o.r1()];
    Flow::Next
}

fn addr(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.general[o.r0()] = r.general[o.r1()].wrapping_add(r.general[o.r2()]);
    Flow::Next
}

fn addi(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    r.general[o.r0()] = r.general[o.r1()].wrapping_add(imm.as_u64());
    Flow::Next
}

fn subr(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.general[o.r0()] = r.general[o.r1()].wrapping_sub(r.general[o.r2()]);
    Flow::Next
}

fn subi(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    r.general[o.r0()] = r.general[o.r1()].wrapping_sub(imm.as_u64());
    Flow::Next
}

fn mulr(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.general[o.r0()] = r.general[o.r1()].wrapping_mul(r.general[o.r2()]);
    Flow::Next
}

fn muli(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    r.general[o.r0()] = r.general[o.r1()].wrapping_mul(imm.as_u64());
    Flow::Next
}

#[inline(always)]
fn branch_if(taken: bool, imm: Value) -> Flow {
    if taken {
        Flow::Jump(imm.as_position())
    } else {
        Flow::Next
    }
}

fn bltr(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    branch_if(r.general[o.r0()] < r.general[o.r1()], imm)
}

fn blts(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    branch_if((r.general[o.r0()] as i64) < (r.general[o.r1()] as i64), imm)
}

fn beqr(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    branch_if(r.general[o.r0()] == r.general[o.r1()], imm)
}

fn bner(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    branch_if(r.general[o.r0()] != r.general[o.r1()], imm)
}

fn jmp(_r: &mut Registers, _o: Operands, imm: Value) -> Flow {
    Flow::Jump(imm.as_position())
}

fn movd(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    r.float[o.r0()] = imm.as_f64();
    Flow::Next
}

fn addd(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.float[o.r0()] = r.float[o.r1()] + r.float[o.r2()];
    Flow::Next
}

fn subd(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.float[o.r0()] = r.float[o.r1()] - r.float[o.r2()];
    Flow::Next
}

fn muld(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.float[o.r0()] = r.float[o.r1()] * r.float[o.r2()];
    Flow::Next
}

fn divd(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.float[o.r0()] = r.float[o.r1()] / r.float[o.r2()];
    Flow::Next
}

fn bltd(r: &mut Registers, o: Operands, imm: Value) -> Flow {
    branch_if(r.float[o.r0()] < r.float[o.r1()], imm)
}

fn cvtgd(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.float[o.r0()] = r.general[o.r1()] as f64;
    Flow::Next
}

// Saturating: negative and NaN become 0.
fn cvtdg(r: &mut Registers, o: Operands, _imm: Value) -> Flow {
    r.general[o.r0()] = r.float[o.r1()] as u64;
    Flow::Next
}

/// Master list of opcode specs, linking enumerants to metadata and handlers.
fn build_specs() -> Vec<OpcodeSpec<Registers, Value>> {
    use BasicOp::*;
    use ImmKind::{Double, Signed, Target, Unsigned};

    const G: Reg = Reg::General;
    const F: Reg = Reg::Float;
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
        op!(Subr, "SUBR", [G, G, G], ImmKind::None, subr),
        op!(Subi, "SUBI", [G, G, N], Unsigned, subi),
        op!(Mulr, "MULR", [G, G, G], ImmKind::None, mulr),
        op!(Muli, "MULI", [G, G, N], Unsigned, muli),
        op!(Bltr, "BLTR", [G, G, N], Target, bltr),
        op!(Blts, "BLTS", [G, G, N], Target, blts),
        op!(Beqr, "BEQR", [G, G, N], Target, beqr),
        op!(Bner, "BNER", [G, G, N], Target, bner),
        op!(Jmp, "JMP", [N, N, N], Target, jmp),
        op!(Movd, "MOVD", [F, N, N], Double, movd),
        op!(Addd, "ADDD", [F, F, F], ImmKind::None, addd),
        op!(Subd, "SUBD", [F, F, F], ImmKind::None, subd),
        op!(Muld, "MULD", [F, F, F], ImmKind::None, muld),
        op!(Divd, "DIVD", [F, F, F], ImmKind::None, divd),
        op!(Bltd, "BLTD", [F, F, N], Target, bltd),
        op!(Cvtgd, "CVTGD", [F, G, N], ImmKind::None, cvtgd),
        op!(Cvtdg, "CVTDG", [G, F, N], ImmKind::None, cvtdg),
    ]
}

// =============================================================================
// Selection helpers
// =============================================================================

/// Emitters for [`Basic`]. Register operands come first, in shape order;
/// branch emitters take a placeholder destination and return the branch's
/// relocation for a later [`Program::patch_label`].
pub mod select {
    use super::*;

    pub fn movi(p: &mut Program<Basic>, d: u8, imm: u64) {
        p.push_imm_op(BasicOp::Movi, Operands::one(d), imm);
    }

    pub fn movsi(p: &mut Program<Basic>, d: u8, imm: i64) {
        p.push_imm_op(BasicOp::Movsi, Operands::one(d), Value::from_i64(imm).as_u64());
    }

    pub fn movr(p: &mut Program<Basic>, d: u8, s: u8) {
        p.push_op(BasicOp::Movr, Operands::two(d, s));
    }

    pub fn addr(p: &mut Program<Basic>, d: u8, a: u8, b: u8) {
        p.push_op(BasicOp::Addr, Operands::three(d, a, b));
    }

    pub fn addi(p: &mut Program<Basic>, d: u8, a: u8, imm: u64) {
        p.push_imm_op(BasicOp::Addi, Operands::two(d, a), imm);
    }

    pub fn subr(p: &mut Program<Basic>, d: u8, a: u8, b: u8) {
        p.push_op(BasicOp::Subr, Operands::three(d, a, b));
    }

    pub fn subi(p: &mut Program<Basic>, d: u8, a: u8, imm: u64) {
        p.push_imm_op(BasicOp::Subi, Operands::two(d, a), imm);
    }

    pub fn mulr(p: &mut Program<Basic>, d: u8, a: u8, b: u8) {
        p.push_op(BasicOp::Mulr, Operands::three(d, a, b));
    }

    pub fn muli(p: &mut Program<Basic>, d: u8, a: u8, imm: u64) {
        p.push_imm_op(BasicOp::Muli, Operands::two(d, a), imm);
    }

    fn branch(p: &mut Program<Basic>, op: BasicOp, operands: Operands, target: u64) -> Reloc {
        let r = p.reloc();
        p.push_imm_op(op, operands, target);
        r
    }

    pub fn bltr(p: &mut Program<Basic>, a: u8, b: u8, target: u64) -> Reloc {
        branch(p, BasicOp::Bltr, Operands::two(a, b), target)
    }

    pub fn blts(p: &mut Program<Basic>, a: u8, b: u8, target: u64) -> Reloc {
        branch(p, BasicOp::Blts, Operands::two(a, b), target)
    }

    pub fn beqr(p: &mut Program<Basic>, a: u8, b: u8, target: u64) -> Reloc {
        branch(p, BasicOp::Beqr, Operands::two(a, b), target)
    }

    pub fn bner(p: &mut Program<Basic>, a: u8, b: u8, target: u64) -> Reloc {
        branch(p, BasicOp::Bner, Operands::two(a, b), target)
    }

    pub fn jmp(p: &mut Program<Basic>, target: u64) -> Reloc {
        branch(p, BasicOp::Jmp, Operands::NONE, target)
    }

    pub fn movd(p: &mut Program<Basic>, d: u8, dimm: f64) {
        p.push_dimm_op(BasicOp::Movd, Operands::one(d), dimm);
    }

    pub fn addd(p: &mut Program<Basic>, d: u8, a: u8, b: u8) {
        p.push_op(BasicOp::Addd, Operands::three(d, a, b));
    }

    pub fn subd(p: &mut Program<Basic>, d: u8, a: u8, b: u8) {
        p.push_op(BasicOp::Subd, Operands::three(d, a, b));
    }

    pub fn muld(p: &mut Program<Basic>, d: u8, a: u8, b: u8) {
        p.push_op(BasicOp::Muld, Operands::three(d, a, b));
    }

    pub fn divd(p: &mut Program<Basic>, d: u8, a: u8, b: u8) {
        p.push_op(BasicOp::Divd, Operands::three(d, a, b));
    }

    pub fn bltd(p: &mut Program<Basic>, a: u8, b: u8, target: u64) -> Reloc {
        branch(p, BasicOp::Bltd, Operands::two(a, b), target)
    }

    pub fn cvtgd(p: &mut Program<Basic>, d: u8, s: u8) {
        p.push_op(BasicOp::Cvtgd, Operands::two(d, s));
    }

    pub fn cvtdg(p: &mut Program<Basic>, d: u8, s: u8) {
        p.push_op(BasicOp::Cvtdg, Operands::two(d, s));
    }
}
