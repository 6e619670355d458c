//! Stride Core - Shared domain types.
//!
//! This crate provides the types used across the Stride components:
//! - `storefront` - Public-facing shop (catalog, cart, checkout, accounts)
//! - `cli` - Command-line tools for migrations, seeding and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`catalog`] - Listing filters, price buckets and sort orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod types;

pub use catalog::{Facet, FilterKind, PriceBucket, ProductFilters, ProductQuery, SortOrder};
pub use types::*;
