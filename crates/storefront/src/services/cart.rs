//! Cart operations for users and guests.

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use stride_core::{CartItemId, GuestId, UserId, VariantSizeId};

use crate::db::{CartRepository, RepositoryError};
use crate::models::{Cart, CartOwner};

/// Largest quantity a single request may set.
pub const MAX_QUANTITY: i32 = 99;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Quantity must be between 1 and 99")]
    InvalidQuantity,

    #[error("This product is no longer available")]
    Unavailable,

    #[error("Only {available} left in stock")]
    InsufficientStock { available: i32 },

    #[error("Cart item not found")]
    ItemNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// `POST /cart/add` form.
#[derive(Debug, Clone, Deserialize)]
pub struct AddItemForm {
    pub variant_size_id: VariantSizeId,
    #[serde(default = "one")]
    pub quantity: i32,
    /// Page to send the shopper back to when the item cannot be added.
    #[serde(default)]
    pub return_to: Option<String>,
}

const fn one() -> i32 {
    1
}

/// `POST /cart/update` form.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemForm {
    pub item_id: CartItemId,
    pub quantity: i32,
}

/// `POST /cart/remove` form.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveItemForm {
    pub item_id: CartItemId,
}

/// Cart service.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
        }
    }

    /// The owner's cart with its lines, or `None` if they never added anything.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    #[instrument(skip(self))]
    pub async fn view(&self, owner: CartOwner) -> Result<Option<Cart>, CartError> {
        let Some(id) = self.carts.find(owner).await? else {
            return Ok(None);
        };

        let lines = self.carts.lines(id).await?;

        Ok(Some(Cart { id, owner, lines }))
    }

    /// Number of units in the owner's cart, for the header badge.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn item_count(&self, owner: CartOwner) -> Result<i32, CartError> {
        Ok(self.view(owner).await?.map_or(0, |cart| cart.item_count()))
    }

    /// Add units of a variant size. Quantities for the same size accumulate
    /// and may not exceed the stock on hand.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity`, `CartError::Unavailable` or
    /// `CartError::InsufficientStock` when the request cannot be honoured.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: CartOwner,
        variant_size_id: VariantSizeId,
        quantity: i32,
    ) -> Result<i32, CartError> {
        check_quantity(quantity)?;

        let stock = self
            .carts
            .variant_size_stock(variant_size_id)
            .await?
            .filter(|s| s.is_published)
            .ok_or(CartError::Unavailable)?;

        if stock.in_stock < 1 {
            return Err(CartError::Unavailable);
        }
        if quantity > stock.in_stock {
            return Err(CartError::InsufficientStock {
                available: stock.in_stock,
            });
        }

        let cart_id = self.carts.get_or_create(owner).await?;

        self.carts
            .add_item(cart_id, variant_size_id, quantity)
            .await?
            .ok_or(CartError::InsufficientStock {
                available: stock.in_stock,
            })
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the owner's
    /// cart and `CartError::InsufficientStock` if there is not enough stock.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner: CartOwner,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(owner, item_id).await;
        }
        check_quantity(quantity)?;

        let cart_id = self.carts.find(owner).await?.ok_or(CartError::ItemNotFound)?;

        let in_stock = self
            .carts
            .item_stock(cart_id, item_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;

        if quantity > in_stock {
            return Err(CartError::InsufficientStock {
                available: in_stock,
            });
        }

        if self.carts.set_quantity(cart_id, item_id, quantity).await? {
            Ok(())
        } else {
            Err(CartError::ItemNotFound)
        }
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the owner's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, owner: CartOwner, item_id: CartItemId) -> Result<(), CartError> {
        let cart_id = self.carts.find(owner).await?.ok_or(CartError::ItemNotFound)?;

        if self.carts.remove_item(cart_id, item_id).await? {
            Ok(())
        } else {
            Err(CartError::ItemNotFound)
        }
    }

    /// Move a guest's cart into the user's cart and delete the guest.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the merge fails; nothing changes then.
    #[instrument(skip(self))]
    pub async fn merge_guest_into_user(
        &self,
        guest_id: GuestId,
        user_id: UserId,
    ) -> Result<u64, CartError> {
        let moved = self.carts.merge_guest_into_user(guest_id, user_id).await?;
        tracing::info!(%user_id, lines = moved, "Merged guest cart");
        Ok(moved)
    }
}

const fn check_quantity(quantity: i32) -> Result<(), CartError> {
    if quantity < 1 || quantity > MAX_QUANTITY {
        Err(CartError::InvalidQuantity)
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_quantity_bounds() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(MAX_QUANTITY).is_ok());
        assert!(matches!(check_quantity(0), Err(CartError::InvalidQuantity)));
        assert!(matches!(check_quantity(-3), Err(CartError::InvalidQuantity)));
        assert!(matches!(
            check_quantity(MAX_QUANTITY + 1),
            Err(CartError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CartError::InsufficientStock { available: 2 }.to_string(),
            "Only 2 left in stock"
        );
        assert_eq!(
            CartError::InvalidQuantity.to_string(),
            "Quantity must be between 1 and 99"
        );
    }

    #[test]
    fn test_add_form_defaults_quantity() {
        let form: AddItemForm = serde_json::from_str(
            r#"{"variant_size_id": "3f2b8c1e-9d4a-4b7e-8f6a-1c2d3e4f5a6b"}"#,
        )
        .unwrap();
        assert_eq!(form.quantity, 1);
    }
}
