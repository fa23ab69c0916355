use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;

use crate::{
    error::AppResult,
    models::{CategoryMatch, Eligibility, NewActivity, Product, ProductScore},
};

pub mod activity;
pub mod memory;
pub mod postgres;
pub mod products;

pub use activity::PgActivityStore;
pub use memory::InMemoryStore;
pub use postgres::{create_pool, run_migrations};
pub use products::PgProductStore;

/// Read/write access to shopper interaction history
///
/// Every read used by the recommendation engine lives here so the engine can
/// run against Postgres or an in-memory fake.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ActivityStore: Send + Sync {
    /// Inserts the event, or bumps `click_count` and `last_updated` on the
    /// existing (fingerprint, type, product) row. Returns the new count.
    async fn record_activity(&self, activity: &NewActivity, at: DateTime<Utc>) -> AppResult<i64>;

    /// Registers a device fingerprint; `false` if it was already known
    async fn register_fingerprint(&self, fingerprint_hash: &str) -> AppResult<bool>;

    /// Weighted per-product scores since `since`, highest first, at most `limit`
    async fn activity_scores(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ProductScore>>;

    /// Other fingerprints that touched any of `product_ids`
    async fn fingerprints_for_products(
        &self,
        product_ids: &[i64],
        exclude_fingerprint: &str,
    ) -> AppResult<Vec<String>>;

    /// Products touched by any of `fingerprints`, minus `exclude_product_ids`
    async fn products_for_fingerprints(
        &self,
        fingerprints: &[String],
        exclude_product_ids: &[i64],
    ) -> AppResult<Vec<i64>>;

    /// The caller's most interacted categories since `since`
    async fn top_categories(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<String>>;

    /// The caller's most recent distinct search phrases since `since`
    async fn recent_search_queries(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<String>>;
}

/// Catalog queries
///
/// Unless stated otherwise results are ordered by ranking key descending,
/// ties broken by id ascending.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Product>>;

    async fn find_by_ids(&self, ids: &[i64], filter: Eligibility) -> AppResult<Vec<Product>>;

    async fn find_by_categories(
        &self,
        categories: &[String],
        filter: Eligibility,
    ) -> AppResult<Vec<Product>>;

    /// Products whose title or tags contain any of `terms`, case-insensitive
    async fn find_by_title_or_tags(
        &self,
        terms: &[String],
        filter: Eligibility,
    ) -> AppResult<Vec<Product>>;

    async fn find_best_sellers(&self, filter: Eligibility) -> AppResult<Vec<Product>>;

    /// Up to `limit` products by ranking key with a random tie-break that
    /// changes on every call
    async fn find_top_ranked_randomized(
        &self,
        limit: i64,
        filter: Eligibility,
        exclude_ids: &[i64],
    ) -> AppResult<Vec<Product>>;

    /// Newest published products first
    async fn find_latest(
        &self,
        category: CategoryMatch,
        exclude_ids: &[i64],
        limit: i64,
    ) -> AppResult<Vec<Product>>;
}
