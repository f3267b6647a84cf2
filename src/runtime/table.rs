//! Opcode table linking enumerant indices to resolved handlers.

use tracing::debug;

use crate::bytecode::op::{Flow, Handler, OpcodeSpec, Operands, Shape, Target};
use crate::lang::value::Carrier;

/// Name of the reserved halt opcode at index 0.
pub const END_NAME: &str = "END";

/// Index of the halt opcode in every table.
pub const END_INDEX: usize = 0;

fn end<S, C>(_state: &mut S, _operands: Operands, _imm: C) -> Flow {
    Flow::Halt
}

struct Entry<S, C> {
    name: &'static str,
    shape: Shape,
    handler: Handler<S, C>,
}

/// Process-wide mapping from opcode index to its handler and metadata.
///
/// Built once per instruction set (see [`crate::bytecode::op::InstructionSet::table`])
/// and immutable afterwards, so it can be read from any number of threads
/// running their own programs. Index 0 always holds the engine's halt handler.
pub struct DispatchTable<S, C> {
    entries: Box<[Entry<S, C>]>,
}

impl<S, C: Carrier> DispatchTable<S, C> {
    /// Build a table from the specs of every opcode except `END`.
    ///
    /// # Panics
    ///
    /// Panics if an index is 0, out of range, registered twice, or missing.
    /// The table is deterministic, so rebuilding it yields the same contents.
    pub fn build(specs: Vec<OpcodeSpec<S, C>>) -> Self {
        let count = specs.len() + 1;
        assert!(
            count <= u16::MAX as usize,
            "too many opcodes for a dispatch table: {}",
            count
        );

        let mut slots: Vec<Option<Entry<S, C>>> = (0..count).map(|_| None).collect();
        slots[END_INDEX] = Some(Entry {
            name: END_NAME,
            shape: Shape::BARE,
            handler: end::<S, C>,
        });

        for spec in specs {
            assert!(
                spec.index != END_INDEX,
                "opcode '{}' uses index 0, which is reserved for {}",
                spec.name,
                END_NAME
            );
            assert!(
                spec.index < count,
                "opcode '{}' has index {} but the table holds {} opcodes",
                spec.name,
                spec.index,
                count
            );
            assert!(
                slots[spec.index].is_none(),
                "duplicate opcode index {} ('{}')",
                spec.index,
                spec.name
            );
            slots[spec.index] = Some(Entry {
                name: spec.name,
                shape: spec.shape,
                handler: spec.handler,
            });
        }

        let entries: Box<[Entry<S, C>]> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| panic!("missing opcode handler for opcode index {}", index))
            })
            .collect();

        debug!(opcodes = entries.len(), width = C::WIDTH, "dispatch table built");
        DispatchTable { entries }
    }

    /// Number of opcodes, including `END`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an opcode index and its register operands into an op slot.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not in the table.
    pub fn target(&self, index: usize, operands: Operands) -> Target<S, C> {
        let entry = self.entry(index);
        Target {
            handler: entry.handler,
            opcode: index as u16,
            operands,
        }
    }

    /// The sentinel op slot that stops the dispatch loop.
    pub fn halt(&self) -> Target<S, C> {
        self.target(END_INDEX, Operands::NONE)
    }

    pub fn name(&self, index: usize) -> &'static str {
        self.entry(index).name
    }

    pub fn shape(&self, index: usize) -> Shape {
        self.entry(index).shape
    }

    /// Look up an opcode index by mnemonic.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// True if `target` is the halt slot of this table.
    pub fn is_halt(&self, target: &Target<S, C>) -> bool {
        target.opcode as usize == END_INDEX
    }

    fn entry(&self, index: usize) -> &Entry<S, C> {
        self.entries.get(index).unwrap_or_else(|| {
            panic!(
                "opcode index {} out of range for a table of {} opcodes",
                index,
                self.entries.len()
            )
        })
    }
}
