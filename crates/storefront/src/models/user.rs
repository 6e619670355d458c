//! User domain types.

use chrono::{DateTime, Utc};

use stride_core::{Email, UserId};

use super::session::CurrentUser;

/// A registered storefront customer.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Normalized (trimmed, lower-cased) email address.
    pub email: Email,
    /// Whether the email has been verified.
    pub email_verified: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Account creation month, e.g. `March 2026`.
    #[must_use]
    pub fn member_since(&self) -> String {
        self.created_at.format("%B %Y").to_string()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}
