use crate::error::{MailerError, Result};

/// Plausibility check for a recipient address
///
/// Requires a single `@` with non-empty local and domain parts and no
/// whitespace. Full validation is left to the provider.
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(MailerError::InvalidEmail("Email is empty".to_string()));
    }

    if email.chars().any(char::is_whitespace) {
        return Err(MailerError::InvalidEmail(
            "Email must not contain whitespace".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(MailerError::InvalidEmail(
            "Email must contain @".to_string(),
        ));
    };

    if domain.contains('@') {
        return Err(MailerError::InvalidEmail(
            "Email must contain a single @".to_string(),
        ));
    }

    if local.is_empty() || domain.is_empty() {
        return Err(MailerError::InvalidEmail(
            "Email parts cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("user.name+tag@example.co.uk").is_ok());
        assert!(validate_email("ops@localhost").is_ok());
    }

    #[test]
    fn test_invalid_email() {
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("test@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
        assert!(validate_email("first last@example.com").is_err());
    }

    #[test]
    fn test_error_names_the_problem() {
        let err = validate_email("nobody").unwrap_err();
        assert_eq!(err.to_string(), "Invalid email address: Email must contain @");
    }
}
