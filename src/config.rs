use serde::{Deserialize, Serialize};

/// Allocation policy of a program buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Slots allocated up front. Zero defers allocation to the first append.
    pub initial_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            initial_capacity: 0,
        }
    }
}

/// Shape of the register file handed to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub general: usize,
    pub float: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            general: 8,
            float: 4,
        }
    }
}

impl MachineConfig {
    /// Integer-only machine, the layout of the classic counting-loop demo.
    pub fn integer_only(general: usize) -> Self {
        MachineConfig { general, float: 0 }
    }
}
