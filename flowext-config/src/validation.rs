//! Custom validation functions for configuration.

use validator::ValidationError;

use flowext_conntrack::ExtKind;

/// Validate that a value is a power of two.
pub fn validate_power_of_two(value: usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

/// Validate that a side-slot name refers to a known extension kind.
pub fn validate_ext_kind(name: &str) -> Result<(), ValidationError> {
    if name.parse::<ExtKind>().is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_extension_kind"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two() {
        assert!(validate_power_of_two(64).is_ok());
        assert!(validate_power_of_two(48).is_err());
    }

    #[test]
    fn test_ext_kind_names() {
        assert!(validate_ext_kind("nat").is_ok());
        assert!(validate_ext_kind("SeqAdj").is_ok());
        assert!(validate_ext_kind("conntrack").is_err());
    }
}
