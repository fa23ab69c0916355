use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use super::{ActivityStore, ProductStore};
use crate::{
    error::AppResult,
    models::{
        ActivityRecord, ActivityType, CategoryMatch, Eligibility, NewActivity, Product,
        ProductScore,
    },
};

/// In-process store implementing both store traits
///
/// Used by the test suites and for running the service without Postgres.
/// Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<InMemoryStoreInner>>,
}

#[derive(Default)]
struct InMemoryStoreInner {
    products: BTreeMap<i64, Product>,
    activities: Vec<ActivityRecord>,
    fingerprints: HashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product
    pub async fn insert_product(&self, product: Product) {
        let mut inner = self.inner.write().await;
        inner.products.insert(product.id, product);
    }

    /// Stores a raw activity row, replacing any row with the same
    /// (fingerprint, type, product) key
    pub async fn insert_activity(&self, record: ActivityRecord) {
        let mut inner = self.inner.write().await;
        inner.activities.retain(|r| {
            !(r.fingerprint_hash == record.fingerprint_hash
                && r.activity_type == record.activity_type
                && r.product_id == record.product_id)
        });
        inner.activities.push(record);
    }

    pub async fn activities(&self) -> Vec<ActivityRecord> {
        self.inner.read().await.activities.clone()
    }
}

/// Sorts by ranking key descending, then id ascending
fn sort_by_ranking(products: &mut [Product]) {
    products.sort_by(|a, b| {
        b.ranking_key()
            .cmp(&a.ranking_key())
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl InMemoryStoreInner {
    fn ranked<F>(&self, filter: Eligibility, predicate: F) -> Vec<Product>
    where
        F: Fn(&Product) -> bool,
    {
        let mut products: Vec<Product> = self
            .products
            .values()
            .filter(|p| p.is_eligible(filter) && predicate(p))
            .cloned()
            .collect();
        sort_by_ranking(&mut products);
        products
    }

    fn recent<'a>(
        &'a self,
        fingerprint_hash: &'a str,
        since: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a ActivityRecord> + 'a {
        self.activities
            .iter()
            .filter(move |r| r.fingerprint_hash == fingerprint_hash && r.last_updated >= since)
    }
}

#[async_trait::async_trait]
impl ActivityStore for InMemoryStore {
    async fn record_activity(&self, activity: &NewActivity, at: DateTime<Utc>) -> AppResult<i64> {
        let mut inner = self.inner.write().await;

        let existing = inner.activities.iter_mut().find(|r| {
            r.fingerprint_hash == activity.fingerprint_hash
                && r.activity_type == activity.activity_type
                && r.product_id == activity.product_id
        });

        if let Some(record) = existing {
            record.click_count += 1;
            record.last_updated = at;
            if activity.category.is_some() {
                record.category = activity.category.clone();
            }
            if activity.search_query.is_some() {
                record.search_query = activity.search_query.clone();
            }
            return Ok(record.click_count);
        }

        inner.activities.push(ActivityRecord {
            fingerprint_hash: activity.fingerprint_hash.clone(),
            activity_type: activity.activity_type,
            product_id: activity.product_id,
            category: activity.category.clone(),
            search_query: activity.search_query.clone(),
            click_count: 1,
            last_updated: at,
        });
        Ok(1)
    }

    async fn register_fingerprint(&self, fingerprint_hash: &str) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.fingerprints.insert(fingerprint_hash.to_string()))
    }

    async fn activity_scores(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ProductScore>> {
        let inner = self.inner.read().await;

        let mut totals: HashMap<i64, i64> = HashMap::new();
        for record in inner.recent(fingerprint_hash, since) {
            if let Some(product_id) = record.product_id {
                *totals.entry(product_id).or_default() += record.score();
            }
        }

        let mut scores: Vec<ProductScore> = totals
            .into_iter()
            .map(|(product_id, score)| ProductScore { product_id, score })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.product_id.cmp(&b.product_id)));
        scores.truncate(limit.max(0) as usize);
        Ok(scores)
    }

    async fn fingerprints_for_products(
        &self,
        product_ids: &[i64],
        exclude_fingerprint: &str,
    ) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;

        let mut fingerprints: Vec<String> = inner
            .activities
            .iter()
            .filter(|r| r.fingerprint_hash != exclude_fingerprint)
            .filter(|r| r.product_id.is_some_and(|id| product_ids.contains(&id)))
            .map(|r| r.fingerprint_hash.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        fingerprints.sort();
        Ok(fingerprints)
    }

    async fn products_for_fingerprints(
        &self,
        fingerprints: &[String],
        exclude_product_ids: &[i64],
    ) -> AppResult<Vec<i64>> {
        let inner = self.inner.read().await;

        let mut ids: Vec<i64> = inner
            .activities
            .iter()
            .filter(|r| fingerprints.contains(&r.fingerprint_hash))
            .filter_map(|r| r.product_id)
            .filter(|id| !exclude_product_ids.contains(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn top_categories(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;

        let mut totals: HashMap<&str, i64> = HashMap::new();
        for record in inner.recent(fingerprint_hash, since) {
            if let Some(category) = record.category.as_deref().filter(|c| !c.is_empty()) {
                *totals.entry(category).or_default() += record.click_count;
            }
        }

        let mut ranked: Vec<(&str, i64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(category, _)| category.to_string())
            .collect())
    }

    async fn recent_search_queries(
        &self,
        fingerprint_hash: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;

        let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for record in inner.recent(fingerprint_hash, since) {
            if record.activity_type != ActivityType::Search {
                continue;
            }
            if let Some(query) = record.search_query.as_deref().filter(|q| !q.is_empty()) {
                let seen = latest.entry(query).or_insert(record.last_updated);
                if record.last_updated > *seen {
                    *seen = record.last_updated;
                }
            }
        }

        let mut ranked: Vec<(&str, DateTime<Utc>)> = latest.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(query, _)| query.to_string())
            .collect())
    }
}

#[async_trait::async_trait]
impl ProductStore for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64], filter: Eligibility) -> AppResult<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(inner.ranked(filter, |p| ids.contains(&p.id)))
    }

    async fn find_by_categories(
        &self,
        categories: &[String],
        filter: Eligibility,
    ) -> AppResult<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(inner.ranked(filter, |p| categories.contains(&p.category)))
    }

    async fn find_by_title_or_tags(
        &self,
        terms: &[String],
        filter: Eligibility,
    ) -> AppResult<Vec<Product>> {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        Ok(inner.ranked(filter, |p| terms.iter().any(|t| p.matches_term(t))))
    }

    async fn find_best_sellers(&self, filter: Eligibility) -> AppResult<Vec<Product>> {
        let inner = self.inner.read().await;
        Ok(inner.ranked(filter, |p| p.best_seller))
    }

    async fn find_top_ranked_randomized(
        &self,
        limit: i64,
        filter: Eligibility,
        exclude_ids: &[i64],
    ) -> AppResult<Vec<Product>> {
        let inner = self.inner.read().await;

        let mut products: Vec<Product> = inner
            .products
            .values()
            .filter(|p| p.is_eligible(filter) && !exclude_ids.contains(&p.id))
            .cloned()
            .collect();

        // Shuffle first; the stable sort then keeps equal keys in random order
        products.shuffle(&mut rand::rng());
        products.sort_by_key(|p| std::cmp::Reverse(p.ranking_key()));
        products.truncate(limit.max(0) as usize);
        Ok(products)
    }

    async fn find_latest(
        &self,
        category: CategoryMatch,
        exclude_ids: &[i64],
        limit: i64,
    ) -> AppResult<Vec<Product>> {
        let inner = self.inner.read().await;

        let mut products: Vec<Product> = inner
            .products
            .values()
            .filter(|p| p.is_published() && !exclude_ids.contains(&p.id) && category.matches(&p.category))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        products.truncate(limit.max(0) as usize);
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PUBLISHED;
    use chrono::Duration;

    fn product(id: i64, rank: i32, sales: i64) -> Product {
        Product {
            id,
            title: format!("Product {}", id),
            category: "general".to_string(),
            tags: String::new(),
            publish_status: PUBLISHED.to_string(),
            stock_remaining: 3,
            product_rank: rank,
            sales,
            best_seller: false,
            created_at: Utc::now(),
        }
    }

    fn record(
        fingerprint: &str,
        activity_type: ActivityType,
        product_id: Option<i64>,
        click_count: i64,
        age_days: i64,
    ) -> ActivityRecord {
        ActivityRecord {
            fingerprint_hash: fingerprint.to_string(),
            activity_type,
            product_id,
            category: None,
            search_query: None,
            click_count,
            last_updated: Utc::now() - Duration::days(age_days),
        }
    }

    fn view(fingerprint: &str, product_id: i64) -> NewActivity {
        NewActivity {
            fingerprint_hash: fingerprint.to_string(),
            activity_type: ActivityType::View,
            product_id: Some(product_id),
            category: Some("shoes".to_string()),
            search_query: None,
        }
    }

    #[tokio::test]
    async fn test_record_activity_increments_existing_row() {
        let store = InMemoryStore::new();
        let first = Utc::now() - Duration::hours(1);
        let second = Utc::now();

        assert_eq!(store.record_activity(&view("fp", 1), first).await.unwrap(), 1);
        assert_eq!(store.record_activity(&view("fp", 1), second).await.unwrap(), 2);
        assert_eq!(store.record_activity(&view("fp", 2), second).await.unwrap(), 1);

        let rows = store.activities().await;
        assert_eq!(rows.len(), 2);
        let bumped = rows.iter().find(|r| r.product_id == Some(1)).unwrap();
        assert_eq!(bumped.click_count, 2);
        assert_eq!(bumped.last_updated, second);
    }

    #[tokio::test]
    async fn test_register_fingerprint_is_idempotent() {
        let store = InMemoryStore::new();
        assert!(store.register_fingerprint("fp").await.unwrap());
        assert!(!store.register_fingerprint("fp").await.unwrap());
    }

    #[tokio::test]
    async fn test_activity_scores_are_weighted() {
        let store = InMemoryStore::new();
        store.insert_activity(record("u1", ActivityType::Search, Some(1), 1, 0)).await;
        store.insert_activity(record("u1", ActivityType::Click, Some(1), 2, 0)).await;
        store.insert_activity(record("u1", ActivityType::View, Some(1), 1, 0)).await;
        store.insert_activity(record("u1", ActivityType::View, Some(2), 3, 0)).await;

        let scores = store
            .activity_scores("u1", Utc::now() - Duration::days(30), 50)
            .await
            .unwrap();

        assert_eq!(
            scores,
            vec![
                ProductScore { product_id: 1, score: 12 },
                ProductScore { product_id: 2, score: 3 },
            ]
        );
    }

    #[tokio::test]
    async fn test_activity_scores_respect_window_nulls_and_cap() {
        let store = InMemoryStore::new();
        store.insert_activity(record("u1", ActivityType::Click, Some(1), 1, 45)).await;
        store.insert_activity(record("u1", ActivityType::Search, None, 4, 0)).await;
        store.insert_activity(record("u1", ActivityType::View, Some(2), 1, 1)).await;
        store.insert_activity(record("u1", ActivityType::View, Some(3), 2, 1)).await;
        store.insert_activity(record("u2", ActivityType::Click, Some(4), 9, 0)).await;

        let since = Utc::now() - Duration::days(30);
        let scores = store.activity_scores("u1", since, 1).await.unwrap();
        assert_eq!(scores, vec![ProductScore { product_id: 3, score: 2 }]);
    }

    #[tokio::test]
    async fn test_collaborative_lookups() {
        let store = InMemoryStore::new();
        store.insert_activity(record("u1", ActivityType::View, Some(1), 1, 0)).await;
        store.insert_activity(record("u2", ActivityType::View, Some(1), 1, 0)).await;
        store.insert_activity(record("u2", ActivityType::Click, Some(5), 1, 0)).await;
        store.insert_activity(record("u3", ActivityType::View, Some(9), 1, 0)).await;

        let similar = store.fingerprints_for_products(&[1], "u1").await.unwrap();
        assert_eq!(similar, vec!["u2".to_string()]);

        let ids = store.products_for_fingerprints(&similar, &[1]).await.unwrap();
        assert_eq!(ids, vec![5]);
    }

    #[tokio::test]
    async fn test_top_categories_and_search_queries() {
        let store = InMemoryStore::new();
        let mut a = record("u1", ActivityType::View, Some(1), 1, 0);
        a.category = Some("bags".to_string());
        let mut b = record("u1", ActivityType::Click, Some(2), 4, 0);
        b.category = Some("shoes".to_string());
        let mut s1 = record("u1", ActivityType::Search, Some(3), 1, 2);
        s1.search_query = Some("ankara".to_string());
        let mut s2 = record("u1", ActivityType::Search, Some(4), 1, 0);
        s2.search_query = Some("sneakers".to_string());
        for r in [a, b, s1, s2] {
            store.insert_activity(r).await;
        }

        let since = Utc::now() - Duration::days(30);
        assert_eq!(
            store.top_categories("u1", since, 5).await.unwrap(),
            vec!["shoes".to_string(), "bags".to_string()]
        );
        assert_eq!(
            store.recent_search_queries("u1", since, 5).await.unwrap(),
            vec!["sneakers".to_string(), "ankara".to_string()]
        );
    }

    #[tokio::test]
    async fn test_categories_and_queries_ignore_activity_outside_window() {
        let store = InMemoryStore::new();
        let mut old_view = record("u1", ActivityType::View, Some(1), 100, 45);
        old_view.category = Some("hats".to_string());
        let mut old_search = record("u1", ActivityType::Search, Some(2), 1, 45);
        old_search.search_query = Some("boots".to_string());
        let mut recent = record("u1", ActivityType::Search, Some(3), 1, 1);
        recent.category = Some("shoes".to_string());
        recent.search_query = Some("sneakers".to_string());
        for r in [old_view, old_search, recent] {
            store.insert_activity(r).await;
        }

        let since = Utc::now() - Duration::days(30);
        assert_eq!(
            store.top_categories("u1", since, 5).await.unwrap(),
            vec!["shoes".to_string()]
        );
        assert_eq!(
            store.recent_search_queries("u1", since, 5).await.unwrap(),
            vec!["sneakers".to_string()]
        );
    }

    #[tokio::test]
    async fn test_categories_and_queries_are_capped() {
        let store = InMemoryStore::new();
        for i in 0..7 {
            let mut view = record("u1", ActivityType::View, Some(i), 10 - i, 0);
            view.category = Some(format!("cat-{}", i));
            let mut search = record("u1", ActivityType::Search, Some(100 + i), 1, i);
            search.search_query = Some(format!("query-{}", i));
            store.insert_activity(view).await;
            store.insert_activity(search).await;
        }

        let since = Utc::now() - Duration::days(30);
        let categories = store.top_categories("u1", since, 5).await.unwrap();
        assert_eq!(
            categories,
            (0..5).map(|i| format!("cat-{}", i)).collect::<Vec<_>>()
        );

        let queries = store.recent_search_queries("u1", since, 5).await.unwrap();
        assert_eq!(
            queries,
            (0..5).map(|i| format!("query-{}", i)).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_randomized_respects_rank_filter_and_exclusions() {
        let store = InMemoryStore::new();
        store.insert_product(product(1, 5, 0)).await;
        store.insert_product(product(2, 1, 0)).await;
        store.insert_product(product(3, 1, 0)).await;
        let mut sold_out = product(4, 9, 0);
        sold_out.stock_remaining = 0;
        store.insert_product(sold_out).await;

        let top = store
            .find_top_ranked_randomized(10, Eligibility::RECOMMENDABLE, &[3])
            .await
            .unwrap();
        let ids: Vec<i64> = top.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let any_stock = store
            .find_top_ranked_randomized(1, Eligibility::PUBLISHED, &[])
            .await
            .unwrap();
        assert_eq!(any_stock[0].id, 4);
    }

    #[tokio::test]
    async fn test_find_by_title_or_tags_broadens() {
        let store = InMemoryStore::new();
        let mut dress = product(1, 0, 1);
        dress.title = "Ankara Dress".to_string();
        let mut shoe = product(2, 0, 2);
        shoe.tags = "Sneakers,men".to_string();
        store.insert_product(dress).await;
        store.insert_product(shoe).await;
        store.insert_product(product(3, 0, 3)).await;

        let found = store
            .find_by_title_or_tags(&["ANKARA".to_string(), "sneakers".to_string()], Eligibility::RECOMMENDABLE)
            .await
            .unwrap();
        let ids: Vec<i64> = found.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
