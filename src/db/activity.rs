use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::ActivityStore;
use crate::{
    error::AppResult,
    models::{ActivityType, NewActivity, ProductScore},
};

/// Postgres-backed [`ActivityStore`] over the `user_activities` table
#[derive(Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ActivityStore for PgActivityStore {
    async fn record_activity(&self, activity: &NewActivity, at: DateTime<Utc>) -> AppResult<i64> {
        let click_count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO user_activities
                (fingerprint_hash, activity_type, product_id, category, search_query, click_count, last_updated)
            VALUES ($1, $2, $3, $4, $5, 1, $6)
            ON CONFLICT (fingerprint_hash, activity_type, product_id)
            DO UPDATE SET
                click_count  = user_activities.click_count + 1,
                last_updated = EXCLUDED.last_updated,
                category     = COALESCE(EXCLUDED.category, user_activities.category),
                search_query = COALESCE(EXCLUDED.search_query, user_activities.search_query)
            RETURNING click_count
            "#,
        )
        .bind(&activity.fingerprint_hash)
        .bind(activity.activity_type.as_str())
        .bind(activity.product_id)
        .bind(&activity.category)
        .bind(&activity.search_query)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(click_count)
    }

    async fn register_fingerprint(&self, fingerprint_hash: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO device_fingerprints (fingerprint_hash)
            VALUES ($1)
            ON CONFLICT (fingerprint_hash) DO NOTHING
            "#,
        )
        .bind(fingerprint_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn activity_scores(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ProductScore>> {
        let scores = sqlx::query_as::<_, ProductScore>(
            r#"
            SELECT product_id,
                   SUM(CASE activity_type
                           WHEN 'search' THEN $3
                           WHEN 'click'  THEN $4
                           WHEN 'view'   THEN $5
                           ELSE 0
                       END * click_count)::BIGINT AS score
            FROM user_activities
            WHERE fingerprint_hash = $1
              AND product_id IS NOT NULL
              AND last_updated >= $2
            GROUP BY product_id
            ORDER BY score DESC, product_id ASC
            LIMIT $6
            "#,
        )
        .bind(fingerprint_hash)
        .bind(since)
        .bind(ActivityType::Search.weight())
        .bind(ActivityType::Click.weight())
        .bind(ActivityType::View.weight())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(scores)
    }

    async fn fingerprints_for_products(
        &self,
        product_ids: &[i64],
        exclude_fingerprint: &str,
    ) -> AppResult<Vec<String>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let fingerprints = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT fingerprint_hash
            FROM user_activities
            WHERE product_id = ANY($1)
              AND fingerprint_hash <> $2
            ORDER BY fingerprint_hash
            "#,
        )
        .bind(product_ids)
        .bind(exclude_fingerprint)
        .fetch_all(&self.pool)
        .await?;

        Ok(fingerprints)
    }

    async fn products_for_fingerprints(
        &self,
        fingerprints: &[String],
        exclude_product_ids: &[i64],
    ) -> AppResult<Vec<i64>> {
        if fingerprints.is_empty() {
            return Ok(Vec::new());
        }

        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT product_id
            FROM user_activities
            WHERE fingerprint_hash = ANY($1)
              AND product_id IS NOT NULL
              AND NOT (product_id = ANY($2))
            ORDER BY product_id
            "#,
        )
        .bind(fingerprints)
        .bind(exclude_product_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn top_categories(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>(
            r#"
            SELECT category
            FROM user_activities
            WHERE fingerprint_hash = $1
              AND category IS NOT NULL
              AND category <> ''
              AND last_updated >= $2
            GROUP BY category
            ORDER BY SUM(click_count) DESC, category ASC
            LIMIT $3
            "#,
        )
        .bind(fingerprint_hash)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn recent_search_queries(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        let queries = sqlx::query_scalar::<_, String>(
            r#"
            SELECT search_query
            FROM user_activities
            WHERE fingerprint_hash = $1
              AND activity_type = 'search'
              AND search_query IS NOT NULL
              AND search_query <> ''
              AND last_updated >= $2
            GROUP BY search_query
            ORDER BY MAX(last_updated) DESC, search_query ASC
            LIMIT $3
            "#,
        )
        .bind(fingerprint_hash)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(queries)
    }
}
