//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Email and password sign-up and sign-in
//! - `guest` - Anonymous guest sessions backing guest carts
//! - `catalog` - Cached product listings, details and filter options
//! - `cart` - Cart operations for users and guests
//! - `checkout` - Order placement and cancellation
//! - `account` - Addresses, wishlist and reviews

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod guest;
pub mod validation;
