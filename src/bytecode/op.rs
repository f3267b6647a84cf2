use serde::{Deserialize, Serialize};

use crate::lang::value::{Carrier, ImmKind};
use crate::runtime::table::DispatchTable;

// =============================================================================
// OPERANDS - register indices baked into an instruction
// =============================================================================

/// Up to three register indices, resolved into the op slot at append time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operands(pub [u8; 3]);

impl Operands {
    pub const NONE: Operands = Operands([0; 3]);

    pub const fn one(r0: u8) -> Self {
        Operands([r0, 0, 0])
    }

    pub const fn two(r0: u8, r1: u8) -> Self {
        Operands([r0, r1, 0])
    }

    pub const fn three(r0: u8, r1: u8, r2: u8) -> Self {
        Operands([r0, r1, r2])
    }

    #[inline(always)]
    pub fn r0(self) -> usize {
        self.0[0] as usize
    }

    #[inline(always)]
    pub fn r1(self) -> usize {
        self.0[1] as usize
    }

    #[inline(always)]
    pub fn r2(self) -> usize {
        self.0[2] as usize
    }
}

/// Register bank an operand position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reg {
    /// Position unused.
    None,
    General,
    Float,
}

/// Operand layout of an opcode: three register positions and an immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub regs: [Reg; 3],
    pub imm: ImmKind,
}

impl Shape {
    pub const BARE: Shape = Shape {
        regs: [Reg::None; 3],
        imm: ImmKind::None,
    };

    pub const fn new(regs: [Reg; 3], imm: ImmKind) -> Self {
        Shape { regs, imm }
    }

    /// True for opcodes whose immediate is a branch destination.
    pub fn is_branch(&self) -> bool {
        self.imm == ImmKind::Target
    }
}

// =============================================================================
// DISPATCH - handlers and resolved targets
// =============================================================================

/// What a handler asks the dispatch loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue at ip + 1.
    Next,
    /// Continue at the given absolute position.
    Jump(usize),
    /// Stop and yield the designated result.
    Halt,
}

/// An opcode body: performs its effect on the machine state `S`, given the
/// operands resolved into the op slot and the immediate slot of carrier `C`.
pub type Handler<S, C> = fn(&mut S, Operands, C) -> Flow;

/// A resolved op slot.
///
/// Produced only by a [`DispatchTable`]: the handler pointer is meaningful
/// inside the current process alone, so targets are never loaded from data.
pub struct Target<S, C> {
    pub handler: Handler<S, C>,
    pub opcode: u16,
    pub operands: Operands,
}

impl<S, C> Clone for Target<S, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, C> Copy for Target<S, C> {}

impl<S, C> std::fmt::Debug for Target<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("opcode", &self.opcode)
            .field("operands", &self.operands)
            .finish()
    }
}

/// Table entry linking an opcode index to its metadata and handler.
pub struct OpcodeSpec<S, C> {
    pub index: usize,
    pub name: &'static str,
    pub shape: Shape,
    pub handler: Handler<S, C>,
}

// =============================================================================
// INSTRUCTION SET - supplied by the selection layer
// =============================================================================

/// An instruction set the engine can build and run programs for.
///
/// The engine never looks at what an opcode does. It needs the enumerant to
/// index mapping (with the halt opcode at index 0), the process-wide table of
/// resolved handlers, and the calling convention for the run result. The
/// immediate carrier is part of the configuration: each instruction set picks
/// one width and numeric kind for all of its programs.
pub trait InstructionSet: Sized + 'static {
    /// Symbolic opcode identifiers used at authoring time.
    type Opcode: Copy + Eq + std::fmt::Debug;

    /// Immediate word stored beside every op slot.
    type Imm: Carrier;

    /// Register file the handlers operate on.
    type State;

    /// Designated run result.
    type Output;

    /// The reserved halt opcode; must map to index 0.
    const END: Self::Opcode;

    fn index(op: Self::Opcode) -> usize;

    /// The dispatch table, built on first call and shared for the rest of
    /// the process.
    fn table() -> &'static DispatchTable<Self::State, Self::Imm>;

    /// Read the designated result out of the state after halting.
    fn output(state: &Self::State) -> Self::Output;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::value::Value;

    #[test]
    fn test_operand_accessors() {
        let o = Operands::three(1, 2, 3);
        assert_eq!((o.r0(), o.r1(), o.r2()), (1, 2, 3));
        assert_eq!(Operands::one(4), Operands([4, 0, 0]));
        assert_eq!(Operands::two(4, 5), Operands([4, 5, 0]));
        assert_eq!(Operands::default(), Operands::NONE);
    }

    #[test]
    fn test_branch_shape() {
        let bltr = Shape::new([Reg::General, Reg::General, Reg::None], ImmKind::Target);
        assert!(bltr.is_branch());
        assert!(!Shape::BARE.is_branch());
    }

    #[test]
    fn test_target_is_copy() {
        fn nop(_: &mut (), _: Operands, _: Value) -> Flow {
            Flow::Next
        }
        let t: Target<(), Value> = Target {
            handler: nop,
            opcode: 3,
            operands: Operands::one(1),
        };
        let u = t;
        assert_eq!(t.opcode, u.opcode);
        assert_eq!(format!("{:?}", u), "Target { opcode: 3, operands: Operands([1, 0, 0]) }");
    }
}
