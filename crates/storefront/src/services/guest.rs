//! Guest sessions for anonymous shoppers.
//!
//! The cookie carries a random UUID token; the `guests` row decides whether
//! it is still valid.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::RepositoryError;
use crate::db::guests::{Guest, GuestRepository};

/// Guest session operations.
pub struct GuestService<'a> {
    guests: GuestRepository<'a>,
    lifetime: Duration,
}

impl<'a> GuestService<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, lifetime_days: i64) -> Self {
        Self {
            guests: GuestRepository::new(pool),
            lifetime: Duration::days(lifetime_days),
        }
    }

    /// Resolve a cookie token to a live guest.
    ///
    /// Malformed or unknown tokens yield `None`. An expired guest is deleted
    /// (along with its cart) and also yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: Option<&str>) -> Result<Option<Guest>, RepositoryError> {
        let Some(token) = token.filter(|t| is_valid_token(t)) else {
            return Ok(None);
        };

        let Some(guest) = self.guests.get_by_token(token).await? else {
            return Ok(None);
        };

        if guest.is_expired(Utc::now()) {
            debug!(guest_id = %guest.id, "Guest session expired");
            self.guests.delete_by_token(token).await?;
            return Ok(None);
        }

        Ok(Some(guest))
    }

    /// Reuse the guest behind `token` or start a new one.
    ///
    /// The boolean is `true` when a new session was created and the cookie
    /// must be set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip_all)]
    pub async fn get_or_create(
        &self,
        token: Option<&str>,
    ) -> Result<(Guest, bool), RepositoryError> {
        if let Some(guest) = self.validate(token).await? {
            return Ok((guest, false));
        }

        let token = Uuid::new_v4().to_string();
        let guest = self
            .guests
            .create(&token, Utc::now() + self.lifetime)
            .await?;

        debug!(guest_id = %guest.id, "Guest session created");

        Ok((guest, true))
    }

    /// Delete every expired guest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn prune(&self) -> Result<u64, RepositoryError> {
        self.guests.delete_expired().await
    }
}

/// Guest tokens are UUIDs; anything else never reaches the database.
#[must_use]
pub fn is_valid_token(token: &str) -> bool {
    Uuid::parse_str(token).is_ok()
}
