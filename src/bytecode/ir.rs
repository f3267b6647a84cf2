use std::alloc::{Layout, handle_alloc_error};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::bytecode::op::{InstructionSet, Operands, Target};
use crate::config::BufferConfig;
use crate::lang::value::Carrier;
use crate::runtime::engine;
use crate::runtime::table::{DispatchTable, END_INDEX};

/// Slots allocated by the first append into an unallocated buffer.
pub const INITIAL_CAPACITY: usize = 16;

/// A captured buffer position that later branches jump back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(usize);

impl Label {
    pub fn position(self) -> usize {
        self.0
    }
}

/// Position of an emitted branch whose immediate is filled in later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reloc(usize);

impl Reloc {
    pub fn position(self) -> usize {
        self.0
    }
}

/// A program under construction and, once terminated by the halt
/// instruction, ready to run.
///
/// Op slots and immediate slots are two parallel sequences that only ever
/// grow together through [`Program::append`]. `capacity` tracks the length
/// both were reserved to; the write cursor `pc` never exceeds it.
///
/// Allocation failure while growing aborts the process: a half-grown buffer
/// would leave the two sequences out of step, so there is no state to
/// recover into.
pub struct Program<I: InstructionSet> {
    table: &'static DispatchTable<I::State, I::Imm>,
    ops: Vec<Target<I::State, I::Imm>>,
    imm: Vec<I::Imm>,
    capacity: usize,
}

impl<I: InstructionSet> Program<I> {
    /// Prepare an empty program; allocation is deferred to the first append.
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Prepare an empty program, making sure the dispatch table of `I` exists.
    pub fn with_config(config: BufferConfig) -> Self {
        debug_assert_eq!(I::index(I::END), END_INDEX, "halt opcode must map to index 0");

        let mut program = Program {
            table: I::table(),
            ops: Vec::new(),
            imm: Vec::new(),
            capacity: 0,
        };

        if config.initial_capacity > 0 {
            program.reserve_slots(config.initial_capacity);
        }

        program
    }

    /// Index of the next free slot, equal to the instruction count.
    pub fn pc(&self) -> usize {
        debug_assert_eq!(self.ops.len(), self.imm.len());
        self.ops.len()
    }

    pub fn len(&self) -> usize {
        self.pc()
    }

    pub fn is_empty(&self) -> bool {
        self.pc() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // =========================================================================
    // Append family
    // =========================================================================

    /// Write one instruction at `pc`, growing both sequences first if full.
    pub fn append(&mut self, target: Target<I::State, I::Imm>, value: I::Imm) {
        if self.pc() == self.capacity {
            self.grow();
        }
        self.ops.push(target);
        self.imm.push(value);
    }

    /// Append an instruction with no immediate.
    pub fn push_op(&mut self, op: I::Opcode, operands: Operands) {
        let target = self.resolve(op, operands);
        self.append(target, I::Imm::ZERO);
    }

    /// Append an instruction with an integer immediate, truncated to the
    /// carrier's width.
    pub fn push_imm_op(&mut self, op: I::Opcode, operands: Operands, imm: u64) {
        let target = self.resolve(op, operands);
        self.append(target, I::Imm::from_u64(imm));
    }

    /// Append an instruction with a floating point immediate, narrowed to the
    /// carrier's precision.
    pub fn push_dimm_op(&mut self, op: I::Opcode, operands: Operands, dimm: f64) {
        let target = self.resolve(op, operands);
        self.append(target, I::Imm::from_f64(dimm));
    }

    /// Append the sentinel halt instruction. A program must end with it
    /// before it is run.
    pub fn append_halt(&mut self) {
        let halt = self.table.halt();
        self.append(halt, I::Imm::ZERO);
    }

    // =========================================================================
    // Labels and relocations
    // =========================================================================

    /// Capture the current position as a backward branch destination.
    pub fn label(&self) -> Label {
        Label(self.pc())
    }

    /// Capture the position of the branch about to be appended.
    pub fn reloc(&self) -> Reloc {
        Reloc(self.pc())
    }

    /// Overwrite the immediate of an already appended instruction.
    ///
    /// # Panics
    ///
    /// Panics if nothing was appended at the relocation's position.
    pub fn patch(&mut self, at: Reloc, value: I::Imm) {
        assert!(
            at.0 < self.pc(),
            "patch at position {} but only {} instructions were appended",
            at.0,
            self.pc()
        );
        self.imm[at.0] = value;
    }

    /// Point the branch at `at` to `label`.
    pub fn patch_label(&mut self, at: Reloc, label: Label) {
        self.patch(at, I::Imm::from_position(label.0));
    }

    // =========================================================================
    // Snapshot access
    // =========================================================================

    pub fn ops(&self) -> &[Target<I::State, I::Imm>] {
        &self.ops
    }

    pub fn imm(&self) -> &[I::Imm] {
        &self.imm
    }

    pub fn table(&self) -> &'static DispatchTable<I::State, I::Imm> {
        self.table
    }

    /// True if the last instruction is the halt sentinel.
    pub fn is_terminated(&self) -> bool {
        self.ops.last().is_some_and(|t| self.table.is_halt(t))
    }

    /// Execute the program against `state`; see [`engine::run`].
    pub fn run(&self, state: &mut I::State) -> I::Output {
        engine::run(self, state)
    }

    /// Release the buffer's storage.
    pub fn destroy(self) {
        debug!(
            instructions = self.pc(),
            capacity = self.capacity,
            "program released"
        );
    }

    // =========================================================================
    // Growth
    // =========================================================================

    fn resolve(&self, op: I::Opcode, operands: Operands) -> Target<I::State, I::Imm> {
        self.table.target(I::index(op), operands)
    }

    fn grow(&mut self) {
        let capacity = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity
                .checked_mul(2)
                .unwrap_or_else(|| panic!("program capacity overflow at {} slots", self.capacity))
        };
        trace!(from = self.capacity, to = capacity, "program buffer grow");
        self.reserve_slots(capacity);
    }

    /// Reserve both sequences to `capacity` slots in one step.
    fn reserve_slots(&mut self, capacity: usize) {
        let additional = capacity - self.ops.len();
        if self.ops.try_reserve_exact(additional).is_err() {
            allocation_failed::<Target<I::State, I::Imm>>(capacity);
        }
        if self.imm.try_reserve_exact(additional).is_err() {
            allocation_failed::<I::Imm>(capacity);
        }
        self.capacity = capacity;
    }
}

impl<I: InstructionSet> Default for Program<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: InstructionSet> std::fmt::Debug for Program<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("pc", &self.pc())
            .field("capacity", &self.capacity)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

fn allocation_failed<T>(capacity: usize) -> ! {
    match Layout::array::<T>(capacity) {
        Ok(layout) => handle_alloc_error(layout),
        Err(_) => panic!("program capacity overflow at {} slots", capacity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::basic::{Basic, BasicOp};
    use crate::lang::value::Value;

    fn movi(p: &mut Program<Basic>, r: u8, imm: u64) {
        p.push_imm_op(BasicOp::Movi, Operands::one(r), imm);
    }

    #[test]
    fn test_new_defers_allocation() {
        let p: Program<Basic> = Program::new();
        assert_eq!(p.pc(), 0);
        assert_eq!(p.capacity(), 0);
        assert!(p.is_empty());
        assert!(!p.is_terminated());
    }

    #[test]
    fn test_with_config_allocates_eagerly() {
        let p: Program<Basic> = Program::with_config(BufferConfig {
            initial_capacity: 5,
        });
        assert_eq!(p.capacity(), 5);
        assert_eq!(p.pc(), 0);
    }

    #[test]
    fn test_first_append_seeds_capacity() {
        let mut p: Program<Basic> = Program::new();
        movi(&mut p, 0, 1);
        assert_eq!(p.pc(), 1);
        assert_eq!(p.capacity(), INITIAL_CAPACITY);
    }

    #[test]
    fn test_growth_doubles_and_preserves_entries() {
        let mut p: Program<Basic> = Program::with_config(BufferConfig {
            initial_capacity: 3,
        });
        for i in 0..13u64 {
            movi(&mut p, (i % 4) as u8, i * 11);
        }
        assert_eq!(p.pc(), 13);
        assert_eq!(p.capacity(), 24);
        assert_eq!(p.ops().len(), p.imm().len());
        for (i, (op, imm)) in p.ops().iter().zip(p.imm()).enumerate() {
            assert_eq!(op.opcode as usize, Basic::index(BasicOp::Movi));
            assert_eq!(op.operands, Operands::one((i % 4) as u8));
            assert_eq!(imm.as_u64(), i as u64 * 11);
        }
    }

    #[test]
    fn test_push_variants_encode_immediates() {
        let mut p: Program<Basic> = Program::new();
        p.push_op(BasicOp::Movr, Operands::two(1, 2));
        p.push_imm_op(BasicOp::Movi, Operands::one(1), 9);
        p.push_dimm_op(BasicOp::Movd, Operands::one(0), 2.5);
        assert_eq!(p.imm()[0], Value::ZERO);
        assert_eq!(p.imm()[1].as_u64(), 9);
        assert_eq!(p.imm()[2].as_f64(), 2.5);
    }

    #[test]
    fn test_label_does_not_mutate() {
        let mut p: Program<Basic> = Program::new();
        movi(&mut p, 0, 0);
        let l = p.label();
        assert_eq!(l.position(), 1);
        assert_eq!(p.pc(), 1);
        assert_eq!(p.reloc().position(), 1);
    }

    #[test]
    fn test_patch_rewrites_only_the_immediate() {
        let mut p: Program<Basic> = Program::new();
        movi(&mut p, 0, 1);
        let r = p.reloc();
        p.push_imm_op(BasicOp::Jmp, Operands::NONE, 0);
        movi(&mut p, 0, 3);
        let before_ops: Vec<_> = p.ops().iter().map(|t| (t.opcode, t.operands)).collect();

        p.patch(r, Value::from_u64(7));
        p.patch(r, Value::from_u64(2));

        let after_ops: Vec<_> = p.ops().iter().map(|t| (t.opcode, t.operands)).collect();
        assert_eq!(before_ops, after_ops);
        assert_eq!(p.pc(), 3);
        assert_eq!(p.imm()[0].as_u64(), 1);
        assert_eq!(p.imm()[1].as_u64(), 2);
        assert_eq!(p.imm()[2].as_u64(), 3);
    }

    #[test]
    fn test_patch_label() {
        let mut p: Program<Basic> = Program::new();
        let top = p.label();
        movi(&mut p, 0, 1);
        let r = p.reloc();
        p.push_imm_op(BasicOp::Jmp, Operands::NONE, 99);
        p.patch_label(r, top);
        assert_eq!(p.imm()[1].as_position(), 0);
    }

    #[test]
    #[should_panic(expected = "only 0 instructions were appended")]
    fn test_patch_before_append_panics() {
        let mut p: Program<Basic> = Program::new();
        let r = p.reloc();
        p.patch(r, Value::ZERO);
    }

    #[test]
    fn test_append_halt_terminates() {
        let mut p: Program<Basic> = Program::new();
        movi(&mut p, 0, 1);
        assert!(!p.is_terminated());
        p.append_halt();
        assert!(p.is_terminated());
        assert_eq!(p.imm()[1], Value::ZERO);
        assert_eq!(p.ops()[1].opcode, 0);
    }

    #[test]
    fn test_programs_share_one_table() {
        let a: Program<Basic> = Program::new();
        let b: Program<Basic> = Program::new();
        assert!(std::ptr::eq(a.table(), b.table()));
        a.destroy();
        b.destroy();
    }

    #[test]
    fn test_debug_summary() {
        let mut p: Program<Basic> = Program::new();
        p.append_halt();
        assert_eq!(
            format!("{:?}", p),
            "Program { pc: 1, capacity: 16, terminated: true }"
        );
    }
}
