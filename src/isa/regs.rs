use crate::config::MachineConfig;

/// Register file of the [`crate::isa::basic::Basic`] instruction set.
///
/// General registers hold unsigned words, float registers hold doubles.
/// By convention general register 0 carries the result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Registers {
    pub general: Vec<u64>,
    pub float: Vec<f64>,
}

impl Registers {
    /// Zeroed register file of the configured shape.
    pub fn new(config: &MachineConfig) -> Self {
        Registers {
            general: vec![0; config.general],
            float: vec![0.0; config.float],
        }
    }

    /// The designated result, absent when there are no general registers.
    pub fn result(&self) -> Option<u64> {
        self.general.first().copied()
    }

    pub fn config(&self) -> MachineConfig {
        MachineConfig {
            general: self.general.len(),
            float: self.float.len(),
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(&MachineConfig::default())
    }
}
