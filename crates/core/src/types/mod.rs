//! Core types for Stride.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod discount;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use discount::{Discount, DiscountError, DiscountType};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceRange};
pub use status::*;
