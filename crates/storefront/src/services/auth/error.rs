//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::validation::FieldErrors;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The submitted form failed validation.
    #[error("validation failed")]
    Validation(FieldErrors),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Session store error.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AuthError {
    /// Message shown above the form.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Please fix the errors below",
            Self::UserAlreadyExists => "An account with this email already exists.",
            Self::InvalidCredentials | Self::UserNotFound => "Invalid email or password.",
            Self::Repository(_) | Self::PasswordHash | Self::Session(_) => {
                "An unexpected error occurred. Please try again."
            }
        }
    }

    /// Whether the failure is ours rather than the visitor's.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Repository(_) | Self::PasswordHash | Self::Session(_)
        )
    }
}
