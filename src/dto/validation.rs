//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_USER_ID_LENGTH: usize = 64;

/// Validates that a user identifier is non-empty, at most 64 characters,
/// and restricted to the characters anonymous ids and wallet addresses use.
///
/// # Examples
///
/// ```ignore
/// validate_user_id("0xb503723bec0e8142")   // Ok
/// validate_user_id("visitor-42")            // Ok
/// validate_user_id("")                      // Err - empty
/// validate_user_id("a b")                   // Err - whitespace
/// ```
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_USER_ID_LENGTH {
        let mut err = ValidationError::new("user_id_length");
        err.message = Some(
            format!(
                "user id must be between 1 and {MAX_USER_ID_LENGTH} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        let mut err = ValidationError::new("user_id_format");
        err.message =
            Some("user id may only contain letters, digits, `-`, `_`, and `.`".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_wallet_and_anonymous_ids() {
        assert!(validate_user_id("0xb503723beC0E8142aC24aCf55Fc11c7fC809e723").is_ok());
        assert!(validate_user_id("visitor-42").is_ok());
        assert!(validate_user_id("a").is_ok());
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn rejects_separator_and_whitespace_characters() {
        assert!(validate_user_id("a b").is_err());
        assert!(validate_user_id("game:user").is_err());
        assert!(validate_user_id("héllo").is_err());
    }
}
