//! Account data: saved addresses, wishlist and product reviews.

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use stride_core::{AddressId, AddressType, ProductId, UserId};

use crate::db::addresses::NewAddress;
use crate::db::{AddressRepository, RepositoryError, ReviewRepository, WishlistRepository};
use crate::models::{Address, WishlistItem};
use crate::services::validation::{FieldErrors, check_length};

/// Longest review comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Errors from account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Please fix the errors below")]
    Validation(FieldErrors),

    #[error("This address is used by an order and cannot be deleted.")]
    AddressInUse,

    #[error("Not found")]
    NotFound,

    #[error("You have already reviewed this product.")]
    AlreadyReviewed,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Submitted address form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub address_type: Option<AddressType>,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
    /// Checkbox: present (`"on"`) when ticked.
    #[serde(default)]
    pub is_default: Option<String>,
}

/// Validate an address form.
///
/// # Errors
///
/// Returns the per-field messages when any field is invalid.
pub fn validate_address(form: &AddressForm) -> Result<NewAddress, FieldErrors> {
    let mut errors = FieldErrors::new();

    if form.address_type.is_none() {
        errors.add("address_type", "Address type is required");
    }

    let line1 = form.line1.trim();
    let line2 = form.line2.trim();
    let city = form.city.trim();
    let state = form.state.trim();
    let country = form.country.trim();
    let postal_code = form.postal_code.trim();

    check_length(&mut errors, "line1", "Address", line1, 2, 200);
    if line2.chars().count() > 200 {
        errors.add("line2", "Address line 2 must be at most 200 characters");
    }
    check_length(&mut errors, "city", "City", city, 2, 100);
    check_length(&mut errors, "state", "State", state, 2, 100);
    check_length(&mut errors, "country", "Country", country, 2, 100);
    check_length(&mut errors, "postal_code", "Postal code", postal_code, 3, 20);

    let Some(address_type) = form.address_type else {
        return Err(errors);
    };

    errors.into_result(NewAddress {
        address_type,
        line1: line1.to_owned(),
        line2: Some(line2.to_owned()).filter(|l| !l.is_empty()),
        city: city.to_owned(),
        state: state.to_owned(),
        country: country.to_owned(),
        postal_code: postal_code.to_owned(),
        is_default: form.is_default.is_some(),
    })
}

/// Submitted review form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

/// A review that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub rating: i32,
    pub comment: Option<String>,
}

/// Validate a review form.
///
/// # Errors
///
/// Returns the per-field messages when any field is invalid.
pub fn validate_review(form: &ReviewForm) -> Result<NewReview, FieldErrors> {
    let mut errors = FieldErrors::new();

    if !(1..=5).contains(&form.rating) {
        errors.add("rating", "Rating must be between 1 and 5");
    }

    let comment = form.comment.trim();
    if comment.chars().count() > MAX_COMMENT_LENGTH {
        errors.add(
            "comment",
            format!("Comment must be at most {MAX_COMMENT_LENGTH} characters"),
        );
    }

    errors.into_result(NewReview {
        rating: form.rating,
        comment: Some(comment.to_owned()).filter(|c| !c.is_empty()),
    })
}

/// Account service.
pub struct AccountService<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `AccountError::Repository` if the query fails.
    pub async fn addresses(&self, user_id: UserId) -> Result<Vec<Address>, AccountError> {
        Ok(AddressRepository::new(self.pool)
            .list_for_user(user_id)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `AccountError::Validation` if the form is invalid.
    #[instrument(skip(self, form))]
    pub async fn create_address(
        &self,
        user_id: UserId,
        form: &AddressForm,
    ) -> Result<Address, AccountError> {
        let address = validate_address(form).map_err(AccountError::Validation)?;
        Ok(AddressRepository::new(self.pool)
            .create(user_id, &address)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `AccountError::AddressInUse` while an order references the
    /// address and `AccountError::NotFound` if the user has no such address.
    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<(), AccountError> {
        match AddressRepository::new(self.pool)
            .delete(user_id, address_id)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(AccountError::NotFound),
            Err(RepositoryError::Conflict(_)) => Err(AccountError::AddressInUse),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `AccountError::NotFound` if the user has no such address.
    #[instrument(skip(self))]
    pub async fn set_default_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<(), AccountError> {
        if AddressRepository::new(self.pool)
            .set_default(user_id, address_id)
            .await?
        {
            Ok(())
        } else {
            Err(AccountError::NotFound)
        }
    }

    /// # Errors
    ///
    /// Returns `AccountError::Repository` if the query fails.
    pub async fn wishlist(&self, user_id: UserId) -> Result<Vec<WishlistItem>, AccountError> {
        Ok(WishlistRepository::new(self.pool)
            .list_for_user(user_id)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `AccountError::Repository` if the insert fails.
    pub async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), AccountError> {
        Ok(WishlistRepository::new(self.pool)
            .add(user_id, product_id)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `AccountError::Repository` if the delete fails.
    pub async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), AccountError> {
        WishlistRepository::new(self.pool)
            .remove(user_id, product_id)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AccountError::Repository` if the query fails.
    pub async fn is_wishlisted(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, AccountError> {
        Ok(WishlistRepository::new(self.pool)
            .contains(user_id, product_id)
            .await?)
    }

    /// Post a review. One review per user per product.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` if the form is invalid and
    /// `AccountError::AlreadyReviewed` on a second review.
    #[instrument(skip(self, form))]
    pub async fn add_review(
        &self,
        user_id: UserId,
        product_id: ProductId,
        form: &ReviewForm,
    ) -> Result<(), AccountError> {
        let review = validate_review(form).map_err(AccountError::Validation)?;

        match ReviewRepository::new(self.pool)
            .create(product_id, user_id, review.rating, review.comment.as_deref())
            .await
        {
            Ok(_) => Ok(()),
            Err(RepositoryError::Conflict(_)) => Err(AccountError::AlreadyReviewed),
            Err(e) => Err(e.into()),
        }
    }
}
