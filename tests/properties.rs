//! Property-based tests for the program buffer and the dispatch loop.
//!
//! Tests the following properties:
//! - Growth keeps every appended slot intact and in order across reallocations
//! - Patching only ever changes the patched immediate
//! - A branch to any captured label resumes at that label

use bcode::bytecode::op::{InstructionSet, Operands};
use bcode::isa::{Basic, BasicOp, Registers, select};
use bcode::{BufferConfig, MachineConfig, Program, Value};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// (register, immediate) pairs for MOVI instructions
fn arb_movis(max: usize) -> impl Strategy<Value = Vec<(u8, u64)>> {
    prop::collection::vec((0u8..8, any::<u64>()), 0..max)
}

fn build_movis(config: BufferConfig, movis: &[(u8, u64)]) -> Program<Basic> {
    let mut p = Program::with_config(config);
    for &(r, imm) in movis {
        select::movi(&mut p, r, imm);
    }
    p
}

// =============================================================================
// Growth
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// N appends leave N slots in append order, whatever the seed capacity
    #[test]
    fn appends_survive_growth(
        movis in arb_movis(600),
        initial_capacity in 0usize..8,
    ) {
        let p = build_movis(BufferConfig { initial_capacity }, &movis);

        prop_assert_eq!(p.pc(), movis.len());
        prop_assert_eq!(p.ops().len(), p.imm().len());
        prop_assert!(p.capacity() >= p.pc());

        let movi = Basic::index(BasicOp::Movi) as u16;
        for (i, &(r, imm)) in movis.iter().enumerate() {
            prop_assert_eq!(p.ops()[i].opcode, movi);
            prop_assert_eq!(p.ops()[i].operands, Operands::one(r));
            prop_assert_eq!(p.imm()[i], Value::from_u64(imm));
        }
    }

    /// Capacity only changes by doubling once the first block is allocated
    #[test]
    fn capacity_doubles(count in 1usize..2000) {
        let mut p: Program<Basic> = Program::new();
        let mut last = 0;
        for i in 0..count {
            select::movi(&mut p, 0, i as u64);
            let cap = p.capacity();
            if cap != last {
                prop_assert!(last == 0 || cap == last * 2);
                last = cap;
            }
        }
        prop_assert!(p.capacity() < 2 * count.max(16));
    }

    // =========================================================================
    // Patching
    // =========================================================================

    /// Patching twice leaves only the second value and touches nothing else
    #[test]
    fn patch_is_local_and_last_wins(
        movis in arb_movis(200).prop_filter("need a slot", |m| !m.is_empty()),
        pick in any::<prop::sample::Index>(),
        first in any::<u64>(),
        second in any::<u64>(),
    ) {
        let mut p: Program<Basic> = Program::new();
        let mut relocs = Vec::new();
        for &(r, imm) in &movis {
            relocs.push(p.reloc());
            select::movi(&mut p, r, imm);
        }
        let at = pick.index(movis.len());
        let r = relocs[at];

        p.patch(r, Value::from_u64(first));
        p.patch(r, Value::from_u64(second));

        prop_assert_eq!(p.pc(), movis.len());
        for (i, &(reg, imm)) in movis.iter().enumerate() {
            prop_assert_eq!(p.ops()[i].operands, Operands::one(reg));
            let expected = if i == at { second } else { imm };
            prop_assert_eq!(p.imm()[i].as_u64(), expected);
        }
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// A backward branch to a label captured at k re-runs instructions k..n
    #[test]
    fn branch_to_label_resumes_there(
        count in 1usize..40,
        pick in any::<prop::sample::Index>(),
    ) {
        // instruction i adds 1 << i to r0, so the result tells which ran twice
        let mut p: Program<Basic> = Program::new();
        select::movi(&mut p, 1, 0);
        let mut labels = Vec::new();
        for i in 0..count {
            labels.push(p.label());
            select::addi(&mut p, 0, 0, 1u64 << i);
        }
        select::addi(&mut p, 1, 1, 1);
        select::movi(&mut p, 2, 2);
        let r = select::bltr(&mut p, 1, 2, 0);
        p.append_halt();

        let k = pick.index(count);
        prop_assert_eq!(labels[k].position(), k + 1);
        p.patch_label(r, labels[k]);

        let mut regs = Registers::new(&MachineConfig::default());
        let result = p.run(&mut regs);

        let once: u64 = (0..count).map(|i| 1u64 << i).sum();
        let again: u64 = (k..count).map(|i| 1u64 << i).sum();
        prop_assert_eq!(result, Some(once + again));
        prop_assert_eq!(regs.general[1], 2);
    }
}
