use sqlx::PgPool;

use super::ProductStore;
use crate::{
    error::AppResult,
    models::{CategoryMatch, Eligibility, Product, PUBLISHED},
};

const PRODUCT_COLUMNS: &str = "id, title, category, tags, publish_status, stock_remaining, \
     product_rank, sales, best_seller, created_at";

/// `$2`/`$3` are the two eligibility flags on every filtered query
const ELIGIBLE: &str = "($2 = FALSE OR publish_status = 'publish') AND ($3 = FALSE OR stock_remaining > 0)";

const BY_RANKING: &str = "ORDER BY product_rank::BIGINT * 1000 + sales DESC, id ASC";

/// Postgres-backed [`ProductStore`] over the `products` table
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Builds a `LIKE` pattern matching `term` anywhere, lowercased, with
/// wildcard characters in the term taken literally.
fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait::async_trait]
impl ProductStore for PgProductStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn find_by_ids(&self, ids: &[i64], filter: Eligibility) -> AppResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) AND {ELIGIBLE} {BY_RANKING}"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(ids)
            .bind(filter.published_only)
            .bind(filter.in_stock_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn find_by_categories(
        &self,
        categories: &[String],
        filter: Eligibility,
    ) -> AppResult<Vec<Product>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE category = ANY($1) AND {ELIGIBLE} {BY_RANKING}"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(categories)
            .bind(filter.published_only)
            .bind(filter.in_stock_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn find_by_title_or_tags(
        &self,
        terms: &[String],
        filter: Eligibility,
    ) -> AppResult<Vec<Product>> {
        let patterns: Vec<String> = terms
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| contains_pattern(t.trim()))
            .collect();
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE (LOWER(title) LIKE ANY($1) OR LOWER(tags) LIKE ANY($1)) AND {ELIGIBLE} {BY_RANKING}"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&patterns)
            .bind(filter.published_only)
            .bind(filter.in_stock_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn find_best_sellers(&self, filter: Eligibility) -> AppResult<Vec<Product>> {
        // $1 keeps the shared eligibility clause's placeholder numbering
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE best_seller = $1 AND {ELIGIBLE} {BY_RANKING}"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(true)
            .bind(filter.published_only)
            .bind(filter.in_stock_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn find_top_ranked_randomized(
        &self,
        limit: i64,
        filter: Eligibility,
        exclude_ids: &[i64],
    ) -> AppResult<Vec<Product>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE NOT (id = ANY($1)) AND {ELIGIBLE} \
             ORDER BY product_rank::BIGINT * 1000 + sales DESC, random() \
             LIMIT $4"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(exclude_ids)
            .bind(filter.published_only)
            .bind(filter.in_stock_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn find_latest(
        &self,
        category: CategoryMatch,
        exclude_ids: &[i64],
        limit: i64,
    ) -> AppResult<Vec<Product>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let (clause, value) = match category {
            CategoryMatch::Exact(c) => ("category = $3", Some(c)),
            CategoryMatch::Contains(fragment) => {
                ("LOWER(category) LIKE $3", Some(contains_pattern(&fragment)))
            }
            CategoryMatch::Any => ("$3::TEXT IS NULL", None),
        };

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE publish_status = $1 AND NOT (id = ANY($2)) AND {clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(PUBLISHED)
            .bind(exclude_ids)
            .bind(value)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }
}
