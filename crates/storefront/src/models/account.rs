//! Account domain types: addresses, reviews, wishlist.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stride_core::{AddressId, AddressType, ProductId, ReviewId};

use super::catalog::product_slug_path;

/// A saved billing or shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    #[sqlx(rename = "type")]
    pub address_type: AddressType,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub is_default: bool,
}

impl Address {
    /// Single-line rendering used in selects and order summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|l| !l.is_empty()) {
            parts.push(line2);
        }
        let locality = format!("{}, {} {}", self.city, self.state, self.postal_code);
        format!("{}, {locality}, {}", parts.join(", "), self.country)
    }
}

/// A product review with the reviewer's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub author: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// `★★★★☆` style rendering.
    #[must_use]
    pub fn stars(&self) -> String {
        let filled = usize::try_from(self.rating.clamp(0, 5)).unwrap_or_default();
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }

    #[must_use]
    pub fn posted_on(&self) -> String {
        self.created_at.format("%b %-d, %Y").to_string()
    }
}

/// Aggregate rating for a product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub count: i64,
    pub average: Option<f64>,
}

impl ReviewSummary {
    /// Average formatted to one decimal, or an empty string with no reviews.
    #[must_use]
    pub fn average_label(&self) -> String {
        self.average.map(|avg| format!("{avg:.1}")).unwrap_or_default()
    }
}

/// A wishlisted product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct WishlistItem {
    pub product_id: ProductId,
    pub slug: String,
    pub name: String,
    pub added_at: DateTime<Utc>,
}

impl WishlistItem {
    /// Product page; it redirects to the default SKU.
    #[must_use]
    pub fn href(&self) -> String {
        product_slug_path(&self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(line2: Option<&str>) -> Address {
        Address {
            id: AddressId::generate(),
            address_type: AddressType::Shipping,
            line1: "1 Main St".to_owned(),
            line2: line2.map(str::to_owned),
            city: "Portland".to_owned(),
            state: "OR".to_owned(),
            country: "US".to_owned(),
            postal_code: "97201".to_owned(),
            is_default: true,
        }
    }

    #[test]
    fn test_one_line() {
        assert_eq!(
            address(None).one_line(),
            "1 Main St, Portland, OR 97201, US"
        );
        assert_eq!(
            address(Some("Apt 4")).one_line(),
            "1 Main St, Apt 4, Portland, OR 97201, US"
        );
    }

    #[test]
    fn test_stars() {
        let review = Review {
            id: ReviewId::generate(),
            author: "Sam".to_owned(),
            rating: 4,
            comment: None,
            created_at: Utc::now(),
        };
        assert_eq!(review.stars(), "★★★★☆");
    }

    #[test]
    fn test_average_label() {
        let summary = ReviewSummary {
            count: 3,
            average: Some(4.333),
        };
        assert_eq!(summary.average_label(), "4.3");
        let empty = ReviewSummary {
            count: 0,
            average: None,
        };
        assert_eq!(empty.average_label(), "");
    }
}
