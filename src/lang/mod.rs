//! # Operand values
//!
//! The immediate word carried by every instruction, and the interpretations
//! opcodes give it. Values are raw bits; meaning comes from the opcode and
//! the width from the instruction set's carrier.

pub mod value;

pub use value::{Carrier, ImmKind, Value, Value32};
