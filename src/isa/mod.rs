//! Instruction selection: concrete opcodes, their handlers, the register
//! file they run against, and the emitters that append them to a program.
//!
//! [`Basic`] carries 64-bit immediates and has integer and double banks;
//! [`Narrow`] is the integer-only set over a 32-bit carrier.

pub mod basic;
pub mod narrow;
pub mod regs;

pub use basic::{Basic, BasicOp, select};
pub use narrow::{Narrow, NarrowOp};
pub use regs::Registers;
