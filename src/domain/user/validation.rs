//! User validation utilities

use thiserror::Error;

/// Errors that can occur during user validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("Invalid user id")]
    InvalidId,

    #[error("Username should have at least {0} characters")]
    UsernameTooShort(u64),

    #[error("Username exceeds maximum length of {0} characters")]
    UsernameTooLong(u64),

    #[error("Email exceeds maximum length of {0} characters")]
    EmailTooLong(u64),
}

/// Bounds enforced on request input; the column allows up to 100.
/// `u64` to match the `validator` length rule.
pub const MIN_USERNAME_LENGTH: u64 = 2;
pub const MAX_USERNAME_LENGTH: u64 = 50;

pub const MAX_EMAIL_LENGTH: u64 = 255;

/// Ids are generated by the store and start at 1
pub fn validate_user_id(id: i64) -> Result<(), UserValidationError> {
    if id <= 0 {
        return Err(UserValidationError::InvalidId);
    }

    Ok(())
}

/// Validate an already-trimmed username
pub fn validate_username(username: &str) -> Result<(), UserValidationError> {
    let len = username.chars().count() as u64;

    if len < MIN_USERNAME_LENGTH {
        return Err(UserValidationError::UsernameTooShort(MIN_USERNAME_LENGTH));
    }

    if len > MAX_USERNAME_LENGTH {
        return Err(UserValidationError::UsernameTooLong(MAX_USERNAME_LENGTH));
    }

    Ok(())
}

pub fn validate_email_length(email: &str) -> Result<(), UserValidationError> {
    if email.chars().count() as u64 > MAX_EMAIL_LENGTH {
        return Err(UserValidationError::EmailTooLong(MAX_EMAIL_LENGTH));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id(1).is_ok());
        assert_eq!(validate_user_id(0), Err(UserValidationError::InvalidId));
        assert_eq!(validate_user_id(-1), Err(UserValidationError::InvalidId));
    }

    #[test]
    fn test_validate_username_bounds() {
        assert!(validate_username("ab").is_ok());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH as usize)).is_ok());

        assert_eq!(
            validate_username("a"),
            Err(UserValidationError::UsernameTooShort(MIN_USERNAME_LENGTH))
        );
        assert_eq!(
            validate_username(&"a".repeat(MAX_USERNAME_LENGTH as usize + 1)),
            Err(UserValidationError::UsernameTooLong(MAX_USERNAME_LENGTH))
        );
    }

    #[test]
    fn test_validate_username_counts_chars() {
        // Multi-byte characters count once each
        assert!(validate_username("éé").is_ok());
    }

    #[test]
    fn test_validate_email_length() {
        assert!(validate_email_length("a@example.com").is_ok());
        assert!(validate_email_length(&"a".repeat(MAX_EMAIL_LENGTH as usize + 1)).is_err());
    }
}
