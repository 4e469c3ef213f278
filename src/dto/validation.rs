//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_NAME_LEN: usize = 64;

/// Validates a phase, group, world or location name: non-blank, no
/// surrounding whitespace, at most 64 characters.
///
/// # Examples
///
/// ```ignore
/// validate_name("lobby_to_game") // Ok
/// validate_name(" lobby")        // Err - surrounding whitespace
/// validate_name("")              // Err - blank
/// ```
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be blank".into());
        return Err(err);
    }

    if name.trim() != name {
        let mut err = ValidationError::new("name_whitespace");
        err.message = Some("Name must not start or end with whitespace".into());
        return Err(err);
    }

    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("Name must be at most {MAX_NAME_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_valid() {
        assert!(validate_name("lobby").is_ok());
        assert!(validate_name("lobby_to_game").is_ok());
        assert!(validate_name("round 2").is_ok());
    }

    #[test]
    fn test_validate_name_blank() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_validate_name_whitespace_and_length() {
        assert!(validate_name(" lobby").is_err());
        assert!(validate_name("lobby\n").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
        assert!(validate_name(&"x".repeat(64)).is_ok());
    }
}
