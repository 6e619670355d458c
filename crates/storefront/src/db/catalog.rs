//! Filter lookup tables: genders, categories, brands, colors, sizes.

use sqlx::PgPool;

use stride_core::FilterKind;

use super::RepositoryError;
use crate::models::FilterOption;

/// Repository for the filter sidebar lookups.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Options for one lookup table as `{value: slug, label}`, in display order:
    /// genders by label, sizes by `sort_order`, everything else by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn options(&self, kind: FilterKind) -> Result<Vec<FilterOption>, RepositoryError> {
        let sql = match kind {
            FilterKind::Genders => {
                "SELECT slug, label FROM storefront.genders ORDER BY label ASC"
            }
            FilterKind::Categories => {
                "SELECT slug, name AS label FROM storefront.categories ORDER BY name ASC"
            }
            FilterKind::Brands => {
                "SELECT slug, name AS label FROM storefront.brands ORDER BY name ASC"
            }
            FilterKind::Colors => {
                "SELECT slug, name AS label FROM storefront.colors ORDER BY name ASC"
            }
            FilterKind::Sizes => {
                "SELECT slug, name AS label FROM storefront.sizes ORDER BY sort_order ASC"
            }
        };

        let rows: Vec<(String, String)> = sqlx::query_as(sql).fetch_all(self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(value, label)| FilterOption { value, label })
            .collect())
    }
}
