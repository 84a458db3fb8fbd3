use thiserror::Error;

use crate::object::SlotKind;

/// Failures of [`ExtensionStore::ensure`](crate::store::ExtensionStore::ensure).
///
/// None of them leave a partially grown buffer behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtError {
    #[error("flow object is already confirmed, too late to attach an extension")]
    TooLateToAttach,

    #[error("prerequisite side slot {kind} could not be registered: {reason}")]
    PrerequisiteFailed { kind: SlotKind, reason: String },

    #[error("extension offset {offset} exceeds the maximum of {max}")]
    CapacityExceeded { offset: usize, max: usize },

    #[error("failed to allocate a {size} byte extension buffer")]
    AllocationFailed { size: usize },

    #[error("invalid extension layout: {0}")]
    InvalidLayout(&'static str),
}

impl ExtError {
    /// Retrying `ensure` on the same object can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ExtError::TooLateToAttach | ExtError::CapacityExceeded { .. }
        )
    }

    /// The failure came from resource pressure and may clear up.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExtError::PrerequisiteFailed { .. } | ExtError::AllocationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ExtError::TooLateToAttach.is_permanent());
        assert!(ExtError::CapacityExceeded { offset: 128, max: 64 }.is_permanent());
        assert!(ExtError::AllocationFailed { size: 64 }.is_transient());
        let prereq = ExtError::PrerequisiteFailed {
            kind: SlotKind::new(1).unwrap(),
            reason: "out of memory".into(),
        };
        assert!(prereq.is_transient());
        assert!(!prereq.is_permanent());
        assert!(!ExtError::InvalidLayout("zero payload").is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = ExtError::CapacityExceeded { offset: 320, max: 256 };
        assert_eq!(
            err.to_string(),
            "extension offset 320 exceeds the maximum of 256"
        );
    }
}
