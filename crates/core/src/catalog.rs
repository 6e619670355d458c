//! Product listing filters.
//!
//! Filters travel in the query string with each facet as a comma-separated
//! list of slugs, e.g. `/products?gender=men,women&price=0-50&sort=newest`.
//! [`ProductQuery`] is the raw deserialized form; [`ProductFilters`] is the
//! normalized form used to build SQL, key the listing cache, and render the
//! filter sidebar.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fixed price buckets offered in the filter sidebar.
///
/// Both bounds are inclusive, so a $50.00 item matches `0-50` and `50-100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceBucket {
    #[serde(rename = "0-50")]
    UpTo50,
    #[serde(rename = "50-100")]
    From50To100,
    #[serde(rename = "100-150")]
    From100To150,
    #[serde(rename = "150-plus")]
    Over150,
}

impl PriceBucket {
    pub const ALL: [Self; 4] = [
        Self::UpTo50,
        Self::From50To100,
        Self::From100To150,
        Self::Over150,
    ];

    /// Upper bound used for the open-ended bucket.
    const CEILING: i64 = 999_999;

    /// Look up a bucket by its query-string value. Unknown values yield `None`
    /// and are ignored by the listing query.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "0-50" => Some(Self::UpTo50),
            "50-100" => Some(Self::From50To100),
            "100-150" => Some(Self::From100To150),
            "150-plus" => Some(Self::Over150),
            _ => None,
        }
    }

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::UpTo50 => "0-50",
            Self::From50To100 => "50-100",
            Self::From100To150 => "100-150",
            Self::Over150 => "150-plus",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UpTo50 => "Under $50",
            Self::From50To100 => "$50 - $100",
            Self::From100To150 => "$100 - $150",
            Self::Over150 => "Over $150",
        }
    }

    /// Inclusive `(min, max)` bounds in dollars.
    #[must_use]
    pub fn bounds(self) -> (Decimal, Decimal) {
        let (min, max) = match self {
            Self::UpTo50 => (0, 50),
            Self::From50To100 => (50, 100),
            Self::From100To150 => (100, 150),
            Self::Over150 => (150, Self::CEILING),
        };
        (Decimal::from(min), Decimal::from(max))
    }

    #[must_use]
    pub fn contains(self, price: Decimal) -> bool {
        let (min, max) = self.bounds();
        price >= min && price <= max
    }
}

/// Listing sort order.
///
/// `Featured` has no ordering of its own and lists newest first, like
/// `Newest`; it is the default and is never written to the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Featured,
    Newest,
    PriceHighToLow,
    PriceLowToHigh,
}

impl SortOrder {
    pub const ALL: [Self; 4] = [
        Self::Featured,
        Self::Newest,
        Self::PriceHighToLow,
        Self::PriceLowToHigh,
    ];

    /// Parse the `sort` query parameter. Missing or unknown values fall back
    /// to [`SortOrder::Featured`].
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("newest") => Self::Newest,
            Some("price-high-to-low") => Self::PriceHighToLow,
            Some("price-low-to-high") => Self::PriceLowToHigh,
            _ => Self::Featured,
        }
    }

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::Newest => "newest",
            Self::PriceHighToLow => "price-high-to-low",
            Self::PriceLowToHigh => "price-low-to-high",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Featured => "Featured",
            Self::Newest => "Newest",
            Self::PriceHighToLow => "Price: High-Low",
            Self::PriceLowToHigh => "Price: Low-High",
        }
    }

    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Featured)
    }
}

/// Lookup tables that feed the filter sidebar. Used as cache tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Genders,
    Categories,
    Brands,
    Colors,
    Sizes,
}

impl FilterKind {
    pub const ALL: [Self; 5] = [
        Self::Genders,
        Self::Categories,
        Self::Brands,
        Self::Colors,
        Self::Sizes,
    ];
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genders => write!(f, "genders"),
            Self::Categories => write!(f, "categories"),
            Self::Brands => write!(f, "brands"),
            Self::Colors => write!(f, "colors"),
            Self::Sizes => write!(f, "sizes"),
        }
    }
}

impl std::str::FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "genders" => Ok(Self::Genders),
            "categories" => Ok(Self::Categories),
            "brands" => Ok(Self::Brands),
            "colors" => Ok(Self::Colors),
            "sizes" => Ok(Self::Sizes),
            _ => Err(format!("invalid filter kind: {s}")),
        }
    }
}

/// A multi-valued facet of the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Gender,
    Category,
    Price,
    Brand,
    Color,
    Size,
    Collection,
}

impl Facet {
    /// Query-string key, also used as the checkbox `name` in templates.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::Category => "category",
            Self::Price => "price",
            Self::Brand => "brand",
            Self::Color => "color",
            Self::Size => "size",
            Self::Collection => "collection",
        }
    }
}

/// Raw listing query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub sort: Option<String>,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub collection: Option<String>,
}

/// Normalized listing filters.
///
/// Every list is trimmed, sorted and deduplicated so that equivalent query
/// strings produce equal (and equally hashed) values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ProductFilters {
    pub search: Option<String>,
    pub genders: Vec<String>,
    pub categories: Vec<String>,
    pub prices: Vec<PriceBucket>,
    pub brands: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub collections: Vec<String>,
    pub sort: SortOrder,
}

/// Maximum accepted length of the free-text search term, in characters.
pub const MAX_SEARCH_LENGTH: usize = 100;

fn split_list(raw: Option<&str>) -> Vec<String> {
    let mut values: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect();
    values.sort();
    values.dedup();
    values
}

fn toggle(values: &mut Vec<String>, value: &str) {
    if let Some(pos) = values.iter().position(|v| v == value) {
        values.remove(pos);
    } else {
        values.push(value.to_owned());
        values.sort();
    }
}

impl ProductFilters {
    /// Normalize a raw query. Unknown price buckets are dropped.
    #[must_use]
    pub fn from_query(query: &ProductQuery) -> Self {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.chars().take(MAX_SEARCH_LENGTH).collect());

        let mut prices: Vec<PriceBucket> = split_list(query.price.as_deref())
            .iter()
            .filter_map(|p| PriceBucket::parse(p))
            .collect();
        prices.sort();
        prices.dedup();

        Self {
            search,
            genders: split_list(query.gender.as_deref()),
            categories: split_list(query.category.as_deref()),
            prices,
            brands: split_list(query.brand.as_deref()),
            colors: split_list(query.color.as_deref()),
            sizes: split_list(query.size.as_deref()),
            collections: split_list(query.collection.as_deref()),
            sort: SortOrder::parse(query.sort.as_deref()),
        }
    }

    /// Selected values of a facet, as query-string slugs.
    #[must_use]
    pub fn values(&self, facet: Facet) -> Vec<&str> {
        match facet {
            Facet::Gender => self.genders.iter().map(String::as_str).collect(),
            Facet::Category => self.categories.iter().map(String::as_str).collect(),
            Facet::Price => self.prices.iter().map(|p| p.slug()).collect(),
            Facet::Brand => self.brands.iter().map(String::as_str).collect(),
            Facet::Color => self.colors.iter().map(String::as_str).collect(),
            Facet::Size => self.sizes.iter().map(String::as_str).collect(),
            Facet::Collection => self.collections.iter().map(String::as_str).collect(),
        }
    }

    #[must_use]
    pub fn is_selected(&self, facet: Facet, value: &str) -> bool {
        self.values(facet).contains(&value)
    }

    /// Number of selected values across the sidebar facets (gender, category, price).
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.genders.len() + self.categories.len() + self.prices.len()
    }

    /// Whether any facet or search term narrows the listing.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.search.is_some()
            || self.active_count() > 0
            || !self.brands.is_empty()
            || !self.colors.is_empty()
            || !self.sizes.is_empty()
            || !self.collections.is_empty()
    }

    /// The filters that result from checking or unchecking `value`.
    #[must_use]
    pub fn toggled(&self, facet: Facet, value: &str) -> Self {
        let mut next = self.clone();
        match facet {
            Facet::Gender => toggle(&mut next.genders, value),
            Facet::Category => toggle(&mut next.categories, value),
            Facet::Brand => toggle(&mut next.brands, value),
            Facet::Color => toggle(&mut next.colors, value),
            Facet::Size => toggle(&mut next.sizes, value),
            Facet::Collection => toggle(&mut next.collections, value),
            Facet::Price => {
                if let Some(bucket) = PriceBucket::parse(value) {
                    if let Some(pos) = next.prices.iter().position(|p| *p == bucket) {
                        next.prices.remove(pos);
                    } else {
                        next.prices.push(bucket);
                        next.prices.sort();
                    }
                }
            }
        }
        next
    }

    #[must_use]
    pub fn with_sort(&self, sort: SortOrder) -> Self {
        Self {
            sort,
            ..self.clone()
        }
    }

    /// Drop every facet and the search term, keeping the sort.
    #[must_use]
    pub fn cleared(&self) -> Self {
        Self {
            sort: self.sort,
            ..Self::default()
        }
    }

    /// Encode as a query string including the leading `?`, or an empty
    /// string when nothing is set. Empty facets and the default sort are
    /// omitted.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        for facet in [
            Facet::Gender,
            Facet::Category,
            Facet::Price,
            Facet::Brand,
            Facet::Color,
            Facet::Size,
            Facet::Collection,
        ] {
            let values = self.values(facet);
            if !values.is_empty() {
                pairs.push((facet.key(), values.join(",")));
            }
        }
        if !self.sort.is_default() {
            pairs.push(("sort", self.sort.slug().to_owned()));
        }

        if pairs.is_empty() {
            return String::new();
        }

        let encoded: Vec<String> = pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        format!("?{}", encoded.join("&"))
    }
}
