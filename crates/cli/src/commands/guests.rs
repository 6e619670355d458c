//! Guest session maintenance.

use stride_storefront::services::guest::GuestService;

/// Delete expired guest sessions. Their carts go with them.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn prune() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    // The lifetime only matters when creating guests.
    let removed = GuestService::new(&pool, 1).prune().await?;

    tracing::info!(removed, "Expired guest sessions pruned");
    Ok(())
}
