use crate::models::IngredientKey;

lazy_static::lazy_static! {
    static ref EMAIL: regex::Regex =
        regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("Invalid email pattern");
}

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Problems caught locally, before anything is sent to storage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A recipe needs a title")]
    MissingTitle,
    #[error("Select at least one cooking method")]
    MissingCookingMethod,
    #[error("Step {step} uses an ingredient that is no longer in the recipe ({key})")]
    UnknownIngredient { step: usize, key: IngredientKey },
    #[error("Enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Check sign-up details. `confirmation` is the repeated password field.
pub fn validate_sign_up(
    email: &str,
    password: &str,
    confirmation: &str,
) -> Result<(), ValidationError> {
    if !EMAIL.is_match(email.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}
