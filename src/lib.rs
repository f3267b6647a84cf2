//! # bcode
//!
//! A threaded bytecode engine. Programs are built by appending instructions
//! into a growable buffer whose op slots hold resolved handlers; forward
//! branches are backpatched through relocations; the dispatch loop jumps from
//! handler to handler until the halt instruction.
//!
//! ```
//! use bcode::{Program, isa::{Basic, Registers, select}};
//!
//! let mut p: Program<Basic> = Program::new();
//! select::movi(&mut p, 2, 0); // i
//! select::movi(&mut p, 1, 5); // limit
//! select::movi(&mut p, 0, 0); // total
//! let top = p.label();
//! select::addr(&mut p, 0, 0, 2);
//! select::addi(&mut p, 2, 2, 1);
//! let r = select::bltr(&mut p, 2, 1, 0);
//! p.append_halt();
//! p.patch_label(r, top);
//!
//! let mut regs = Registers::default();
//! assert_eq!(p.run(&mut regs), Some(10));
//! ```

pub mod bytecode;
pub mod config;
pub mod isa;
pub mod lang;
pub mod runtime;

pub use bytecode::{CheckError, Label, Program, Reloc, check_program};
pub use config::{BufferConfig, MachineConfig};
pub use lang::{Carrier, Value, Value32};
