//! Authentication service.
//!
//! Email and password sign-up and sign-in. Passwords are hashed with
//! Argon2id; the signed-in identity is kept in the tower-sessions session
//! (see [`crate::middleware::auth`]).

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use stride_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;
use crate::services::validation::{FieldErrors, check_length};

/// Full name length bounds, in characters.
const NAME_LENGTH: (usize, usize) = (2, 100);

/// Password length bounds, in characters.
const PASSWORD_LENGTH: (usize, usize) = (8, 100);

/// Submitted sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUpForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Submitted sign-in form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// A sign-up form that passed validation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    pub password: String,
}

/// Outcome of a sign-up or sign-in attempt, rendered back into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthActionState {
    pub success: bool,
    pub error: Option<String>,
    pub field_errors: FieldErrors,
}

impl AuthActionState {
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_error(err: &AuthError) -> Self {
        let field_errors = match err {
            AuthError::Validation(errors) => errors.clone(),
            _ => FieldErrors::new(),
        };

        Self {
            success: false,
            error: Some(err.user_message().to_owned()),
            field_errors,
        }
    }
}

/// Validate and normalize a sign-up form.
///
/// # Errors
///
/// Returns the per-field messages when any field is invalid.
pub fn validate_sign_up(form: &SignUpForm) -> Result<NewAccount, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = form.name.trim();
    check_length(
        &mut errors,
        "name",
        "Full name",
        name,
        NAME_LENGTH.0,
        NAME_LENGTH.1,
    );

    let email = parse_email(&mut errors, &form.email);

    check_length(
        &mut errors,
        "password",
        "Password",
        &form.password,
        PASSWORD_LENGTH.0,
        PASSWORD_LENGTH.1,
    );

    match email {
        Some(email) if errors.is_empty() => Ok(NewAccount {
            name: name.to_owned(),
            email,
            password: form.password.clone(),
        }),
        _ => Err(errors),
    }
}

/// Validate and normalize a sign-in form.
///
/// # Errors
///
/// Returns the per-field messages when any field is invalid.
pub fn validate_sign_in(form: &SignInForm) -> Result<Email, FieldErrors> {
    let mut errors = FieldErrors::new();

    let email = parse_email(&mut errors, &form.email);

    if form.password.is_empty() {
        errors.add("password", "Password is required");
    }

    match email {
        Some(email) if errors.is_empty() => Ok(email),
        _ => Err(errors),
    }
}

fn parse_email(errors: &mut FieldErrors, raw: &str) -> Option<Email> {
    match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(err) => {
            errors.add("email", err.to_string());
            None
        }
    }
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user with name, email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the form is invalid.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<User, AuthError> {
        let account = validate_sign_up(form).map_err(AuthError::Validation)?;

        let password_hash = hash_password(&account.password)?;

        let user = self
            .users
            .create_with_password(&account.name, &account.email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User signed up");

        Ok(user)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the form is invalid.
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn sign_in(&self, form: &SignInForm) -> Result<User, AuthError> {
        let email = validate_sign_in(form).map_err(AuthError::Validation)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&form.password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign_up(name: &str, email: &str, password: &str) -> SignUpForm {
        SignUpForm {
            name: name.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
            redirect: None,
        }
    }

    #[test]
    fn test_sign_up_normalizes() {
        let account =
            validate_sign_up(&sign_up("  Ada Lovelace ", " Ada@Example.COM ", "hunter22!"))
                .unwrap();
        assert_eq!(account.name, "Ada Lovelace");
        assert_eq!(account.email.as_str(), "ada@example.com");
    }

    #[test]
    fn test_sign_up_field_messages() {
        let errors = validate_sign_up(&sign_up("", "", "")).unwrap_err();
        assert_eq!(errors.first("name"), Some("Full name is required"));
        assert_eq!(errors.first("email"), Some("Email is required"));
        assert_eq!(errors.first("password"), Some("Password is required"));

        let errors = validate_sign_up(&sign_up("A", "not-an-email", "short")).unwrap_err();
        assert_eq!(
            errors.first("name"),
            Some("Full name must be at least 2 characters")
        );
        assert_eq!(
            errors.first("email"),
            Some("Please enter a valid email address")
        );
        assert_eq!(
            errors.first("password"),
            Some("Password must be at least 8 characters")
        );
    }

    #[test]
    fn test_sign_up_upper_bounds() {
        let long_name = "a".repeat(101);
        let long_password = "p".repeat(101);
        let errors =
            validate_sign_up(&sign_up(&long_name, "a@b.co", &long_password)).unwrap_err();
        assert_eq!(
            errors.first("name"),
            Some("Full name must be at most 100 characters")
        );
        assert_eq!(
            errors.first("password"),
            Some("Password must be at most 100 characters")
        );
        assert!(!errors.has("email"));
    }

    #[test]
    fn test_sign_in_requires_password_only() {
        let form = SignInForm {
            email: "ada@example.com".to_owned(),
            password: "x".to_owned(),
            redirect: None,
        };
        assert!(validate_sign_in(&form).is_ok());

        let form = SignInForm {
            email: "ada@example.com".to_owned(),
            password: String::new(),
            redirect: None,
        };
        let errors = validate_sign_in(&form).unwrap_err();
        assert_eq!(errors.first("password"), Some("Password is required"));
    }

    #[test]
    fn test_action_state_messages() {
        let mut fields = FieldErrors::new();
        fields.add("email", "Email is required");
        let state = AuthActionState::from_error(&AuthError::Validation(fields));
        assert!(!state.success);
        assert_eq!(state.error.as_deref(), Some("Please fix the errors below"));
        assert!(state.field_errors.has("email"));

        let state = AuthActionState::from_error(&AuthError::UserAlreadyExists);
        assert_eq!(
            state.error.as_deref(),
            Some("An account with this email already exists.")
        );

        let state = AuthActionState::from_error(&AuthError::InvalidCredentials);
        assert_eq!(state.error.as_deref(), Some("Invalid email or password."));

        let state = AuthActionState::from_error(&AuthError::PasswordHash);
        assert_eq!(
            state.error.as_deref(),
            Some("An unexpected error occurred. Please try again.")
        );
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
