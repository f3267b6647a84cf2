use thiserror::Error;

/// A reason a program would misbehave if run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("check error: program is empty")]
    Empty,

    #[error("check error: last instruction at {at} is {found}, expected END")]
    MissingHalt { at: usize, found: &'static str },

    #[error("check error: {op} at {at} branches to {target}, past the end of the program ({len} instructions)")]
    BranchOutOfRange {
        at: usize,
        op: &'static str,
        target: usize,
        len: usize,
    },

    #[error("check error: {op} at {at} uses {bank} register {index}, machine has {available}")]
    RegisterOutOfRange {
        at: usize,
        op: &'static str,
        bank: &'static str,
        index: usize,
        available: usize,
    },
}

impl CheckError {
    pub fn hint(&self) -> &'static str {
        match self {
            CheckError::Empty | CheckError::MissingHalt { .. } => {
                "terminate the program with append_halt() before running it"
            }
            CheckError::BranchOutOfRange { .. } => {
                "a relocation was probably never patched, or was patched with the wrong label"
            }
            CheckError::RegisterOutOfRange { .. } => {
                "grow the machine config or use a lower register index"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_halt_display() {
        let err = CheckError::MissingHalt {
            at: 4,
            found: "ADDI",
        };
        let msg = err.to_string();
        assert!(msg.contains("ADDI"));
        assert!(msg.contains("at 4"));
        assert!(msg.contains("expected END"));
    }

    #[test]
    fn test_branch_display() {
        let err = CheckError::BranchOutOfRange {
            at: 2,
            op: "BLTR",
            target: 99,
            len: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("BLTR at 2 branches to 99"));
        assert!(msg.contains("5 instructions"));
        assert!(err.hint().contains("patched"));
    }

    #[test]
    fn test_register_display() {
        let err = CheckError::RegisterOutOfRange {
            at: 0,
            op: "MOVD",
            bank: "float",
            index: 3,
            available: 0,
        };
        assert_eq!(
            err.to_string(),
            "check error: MOVD at 0 uses float register 3, machine has 0"
        );
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = CheckError::Empty;
        let _: &dyn std::error::Error = &err;
        assert!(err.hint().contains("append_halt"));
    }
}
