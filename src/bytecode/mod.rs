pub mod check;
pub mod check_error;
pub mod disasm;
pub mod ir;
pub mod op;

pub use check::check_program;
pub use check_error::CheckError;
pub use ir::{Label, Program, Reloc};
pub use op::{Flow, Handler, InstructionSet, Operands, Target};
