//! Validation helpers for request DTOs.

use validator::ValidationError;

/// Validates that a display name or text field is non-blank after trimming.
pub fn validate_non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("non_blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that all four answer options are non-blank.
pub fn validate_options(options: &[String; 4]) -> Result<(), ValidationError> {
    if options.iter().any(|option| option.trim().is_empty()) {
        let mut err = ValidationError::new("options_incomplete");
        err.message = Some("all four options must be filled in".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that the correct-option index points at one of the four options.
pub fn validate_correct_index(index: u8) -> Result<(), ValidationError> {
    if index > 3 {
        let mut err = ValidationError::new("correct_index_range");
        err.message = Some("pick one of the four options as correct".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_rejected() {
        assert!(validate_non_blank("Alice").is_ok());
        assert!(validate_non_blank("").is_err());
        assert!(validate_non_blank("   ").is_err());
    }

    #[test]
    fn options_must_all_be_filled() {
        let full = ["a".into(), "b".into(), "c".into(), "d".into()];
        assert!(validate_options(&full).is_ok());

        let gap = ["a".into(), " ".into(), "c".into(), "d".into()];
        assert!(validate_options(&gap).is_err());
    }

    #[test]
    fn correct_index_bounded_to_four_options() {
        assert!(validate_correct_index(0).is_ok());
        assert!(validate_correct_index(3).is_ok());
        assert!(validate_correct_index(4).is_err());
    }
}
