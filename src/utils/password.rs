use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ErrorMessage;

/// Shortest password accepted when a password is set
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Longest password accepted, in characters. Bounds the argon2 work per request.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Check the length bounds a new password must respect.
///
/// Only applied when a password is set; login compares whatever was typed.
pub fn validate(password: &str) -> Result<(), ErrorMessage> {
    let length = password.chars().count();
    if length == 0 {
        return Err(ErrorMessage::EmptyPassword);
    }
    if length < MIN_PASSWORD_LENGTH {
        return Err(ErrorMessage::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Hash a password with Argon2id and a fresh random salt.
///
/// The result is a PHC string (`$argon2id$v=19$...`) that carries its own salt
/// and parameters, so it is the only thing stored per user.
pub fn hash(password: impl Into<String>) -> Result<String, ErrorMessage> {
    let password = password.into();
    validate(&password)?;

    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_password)
}

/// Verify a password against a stored PHC hash in constant time.
pub fn compare(password: &str, hashed_password: &str) -> Result<bool, ErrorMessage> {
    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }

    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    let password_matched = Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok();

    Ok(password_matched)
}
