use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// JSON body of every failed response: `{"status": "fail", "message": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Enumeration of the fixed error messages shared by handlers and utilities
///
/// PartialEq allows comparing error variants (useful in tests)
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password validation errors
    EmptyPassword,
    PasswordTooShort(usize),          // Contains the min length value
    ExceededMaxPasswordLength(usize), // Contains the max length value
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    TokenNotProvided,
    UserNotAuthenticated,

    // Authorization errors
    PermissionDenied,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::PasswordTooShort(min_length) => {
                format!("Password must be at least {} characters", min_length)
            }
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Why a bearer token was rejected.
///
/// Verification fails closed, each cause gets its own variant so the client
/// can tell "log in again" apart from "somebody edited this token".
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TokenError {
    #[error("Token is expired.")]
    Expired,
    #[error("Token is invalid, or has been tampered with.")]
    Invalid,
    #[error("Token does not carry a user id.")]
    MissingClaim,
}

/// Domain error raised by the service layer
///
/// Services never build HTTP responses; the boundary converts these with
/// `From<ServiceError> for HttpError` below. Storage and database variants
/// keep their source for logging but are never shown to clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NotUnique(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    DataMismatch(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("{0}")]
    Integrity(String),
    #[error("snapshot storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ServiceError::Unauthorized(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }

    pub fn data_mismatch(message: impl Into<String>) -> Self {
        ServiceError::DataMismatch(message.into())
    }
}

/// Classify storage failures into domain errors
///
/// - RowNotFound: the `fetch_one` target is absent
/// - unique violation: username or email already taken (the only UNIQUE
///   columns a client can collide on)
/// - foreign key violation: the row is still referenced, e.g. deleting a user
///   who owns assessments
impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => {
                ServiceError::NotFound("Requested record was not found.".to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                let message = db_err.message();
                if message.contains("users.email") {
                    ServiceError::NotUnique(
                        "Email needs to be unique. Provided e-mail is already in use.".to_string(),
                    )
                } else if message.contains("users.username") {
                    ServiceError::NotUnique(
                        "Username needs to be unique. Provided username is used.".to_string(),
                    )
                } else {
                    ServiceError::NotUnique("Record already exists.".to_string())
                }
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                ServiceError::Integrity(
                    "Record is still referenced by other records and cannot be changed."
                        .to_string(),
                )
            }
            other => ServiceError::Database(other),
        }
    }
}

/// Password utilities report through `ErrorMessage`; length problems are the
/// caller's fault, everything else is ours.
impl From<ErrorMessage> for ServiceError {
    fn from(message: ErrorMessage) -> Self {
        match message {
            ErrorMessage::EmptyPassword
            | ErrorMessage::PasswordTooShort(_)
            | ErrorMessage::ExceededMaxPasswordLength(_) => {
                ServiceError::InvalidInput(message.to_string())
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Error returned by handlers and middleware, a client message plus a status.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::CONFLICT)
    }

    /// 401: missing, expired or tampered credentials
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    /// 403: authenticated, but the policy refuses the operation
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::FORBIDDEN)
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

/// Map domain errors onto HTTP statuses
///
/// Internal failures are logged with their source and replaced by the generic
/// `ErrorMessage::ServerError` text, so storage details never reach a client.
impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::NotFound(message) => HttpError::not_found(message),
            ServiceError::NotUnique(message) => HttpError::unique_constraint_violation(message),
            ServiceError::Unauthorized(message) => HttpError::forbidden(message),
            ServiceError::DataMismatch(message) => HttpError::bad_request(message),
            ServiceError::InvalidInput(message) => HttpError::bad_request(message),
            ServiceError::Token(token_error) => HttpError::unauthorized(token_error.to_string()),
            ServiceError::Integrity(message) => HttpError::unique_constraint_violation(message),
            ServiceError::Storage(e) => {
                tracing::error!("Snapshot storage error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
            ServiceError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
            ServiceError::Database(e) => {
                tracing::error!("DB error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }
}
