use std::sync::Arc;

use crate::{
    db::ProductStore,
    error::{AppError, AppResult},
    models::{CategoryMatch, Product},
};

/// Number of related products shown on a product page
pub const RELATED_LIMIT: usize = 12;

/// Loads a product together with products related to it.
///
/// Related products come from the same category first, then from categories
/// containing its category name, then from the newest published products.
/// The product itself never appears in the related list.
pub async fn product_with_related(
    store: Arc<dyn ProductStore>,
    product_id: i64,
    limit: usize,
) -> AppResult<(Product, Vec<Product>)> {
    let product = store
        .find_by_id(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", product_id)))?;

    let mut related: Vec<Product> = Vec::with_capacity(limit);
    let mut exclude = vec![product.id];

    let tiers = [
        CategoryMatch::Exact(product.category.clone()),
        CategoryMatch::Contains(product.category.clone()),
        CategoryMatch::Any,
    ];

    for tier in tiers {
        let remaining = limit.saturating_sub(related.len());
        if remaining == 0 {
            break;
        }
        if product.category.is_empty() && !matches!(tier, CategoryMatch::Any) {
            continue;
        }

        let found = store.find_latest(tier, &exclude, remaining as i64).await?;
        for p in found.into_iter().take(remaining) {
            exclude.push(p.id);
            related.push(p);
        }
    }

    tracing::debug!(product_id, related = related.len(), "Related products loaded");

    Ok((product, related))
}
