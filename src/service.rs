//! Business operations. Every function takes the acting user and checks the
//! policy before it reads or writes anything.

pub mod assessment;
pub mod auth;
pub mod note;
pub mod question;
pub mod report;
pub mod user;

use crate::error::ServiceError;

/// Non-managers get `Unauthorized` for foreign and missing ids alike, so ids
/// cannot be guessed.
pub(crate) fn hide_missing(error: sqlx::Error, is_manager: bool) -> ServiceError {
    match error {
        sqlx::Error::RowNotFound if !is_manager => {
            ServiceError::unauthorized("You are not allowed to access this record.")
        }
        other => other.into(),
    }
}
