//! Domain models for storefront.
//!
//! These are validated domain objects, separate from the row types the
//! repositories decode from `PostgreSQL`.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod session;
pub mod user;

pub use account::{Address, Review, ReviewSummary, WishlistItem};
pub use cart::{Cart, CartLine, CartOwner};
pub use catalog::{
    FilterOption, FilterOptions, Image, Product, ProductListing, Variant, VariantSize,
};
pub use order::{Order, OrderItem, PlacedOrder};
pub use session::CurrentUser;
pub use user::User;
