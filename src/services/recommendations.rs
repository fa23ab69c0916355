use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use crate::{
    db::{ActivityStore, ProductStore},
    error::{AppError, AppResult},
    models::{Eligibility, PageWindow, Product},
    services::candidates::CandidateSet,
};

/// Tuning knobs for the recommendation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSettings {
    /// Trailing window of activity that counts as "recent"
    pub activity_window: Duration,
    /// Cap on weighted activity candidates seeding collaborative filtering
    pub max_activity_candidates: i64,
    pub max_categories: i64,
    pub max_search_queries: i64,
    /// Anonymous visitors historically see out-of-stock products too;
    /// `true` applies the in-stock filter the personalized stages use.
    pub anonymous_require_stock: bool,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            activity_window: Duration::days(30),
            max_activity_candidates: 50,
            max_categories: 5,
            max_search_queries: 5,
            anonymous_require_stock: false,
        }
    }
}

/// Personalized pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collaborative,
    Category,
    Search,
    BestSeller,
    TopUp,
}

impl Stage {
    pub const PIPELINE: [Stage; 5] = [
        Stage::Collaborative,
        Stage::Category,
        Stage::Search,
        Stage::BestSeller,
        Stage::TopUp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Collaborative => "collaborative",
            Stage::Category => "category",
            Stage::Search => "search",
            Stage::BestSeller => "best_seller",
            Stage::TopUp => "top_up",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-call inputs shared by the personalized stages
struct StageContext<'a> {
    fingerprint: &'a str,
    since: DateTime<Utc>,
    /// Products the caller already engaged with, highest activity score first
    engaged: Vec<i64>,
}

/// Multi-stage product recommender
///
/// Runs the caller's activity through collaborative filtering, then falls back
/// to category, search-term, best-seller and randomized top-up stages until the
/// requested page can be filled. Holds no per-request state; one instance is
/// shared across requests.
#[derive(Clone)]
pub struct Recommender {
    activities: Arc<dyn ActivityStore>,
    products: Arc<dyn ProductStore>,
    settings: RecommendationSettings,
}

impl Recommender {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        products: Arc<dyn ProductStore>,
        settings: RecommendationSettings,
    ) -> Self {
        Self {
            activities,
            products,
            settings,
        }
    }

    /// Returns one page of recommendations for `fingerprint`.
    ///
    /// An empty (or blank) fingerprint is treated as an anonymous visitor.
    /// Any store failure aborts the whole call; an empty page is not an error.
    #[instrument(skip(self), fields(limit = window.limit, offset = window.offset))]
    pub async fn recommend(&self, fingerprint: &str, window: PageWindow) -> AppResult<Vec<Product>> {
        if window.limit == 0 {
            return Ok(Vec::new());
        }

        let fingerprint = fingerprint.trim();
        let mut candidates = CandidateSet::new(window.target());

        if fingerprint.is_empty() {
            self.fill_anonymous(&mut candidates).await?;
            tracing::info!(accumulated = candidates.len(), "Anonymous recommendations built");
            return Ok(candidates.into_page(window));
        }

        let since = Utc::now()
            .checked_sub_signed(self.settings.activity_window)
            .ok_or_else(|| AppError::Internal("activity window out of range".to_string()))?;
        let engaged = self.engaged_products(fingerprint, since).await?;
        candidates.exclude(engaged.iter().copied());

        let ctx = StageContext {
            fingerprint,
            since,
            engaged,
        };

        for stage in Stage::PIPELINE {
            if self.run_stage(stage, &ctx, &mut candidates).await? {
                tracing::debug!(stage = %stage, "Recommendation target reached");
                break;
            }
        }

        tracing::info!(
            engaged = ctx.engaged.len(),
            accumulated = candidates.len(),
            "Personalized recommendations built"
        );

        Ok(candidates.into_page(window))
    }

    /// Weighted activity ranking: the caller's recently engaged products,
    /// strongest signal first.
    async fn engaged_products(&self, fingerprint: &str, since: DateTime<Utc>) -> AppResult<Vec<i64>> {
        let scores = self
            .activities
            .activity_scores(fingerprint, since, self.settings.max_activity_candidates)
            .await?;

        Ok(scores.into_iter().map(|s| s.product_id).collect())
    }

    /// Runs one stage and folds its output into `candidates`.
    /// Returns whether the target has been reached.
    async fn run_stage(
        &self,
        stage: Stage,
        ctx: &StageContext<'_>,
        candidates: &mut CandidateSet,
    ) -> AppResult<bool> {
        if candidates.is_full() {
            return Ok(true);
        }

        let found = match stage {
            Stage::Collaborative => self.collaborative(ctx).await?,
            Stage::Category => self.by_category(ctx).await?,
            Stage::Search => self.by_search_terms(ctx).await?,
            Stage::BestSeller => {
                self.products
                    .find_best_sellers(Eligibility::RECOMMENDABLE)
                    .await?
            }
            Stage::TopUp => {
                self.products
                    .find_top_ranked_randomized(
                        candidates.remaining() as i64,
                        Eligibility::RECOMMENDABLE,
                        &candidates.seen_ids(),
                    )
                    .await?
            }
        };

        let found_count = found.len();
        let full = candidates.extend(found);

        tracing::debug!(
            stage = %stage,
            found = found_count,
            accumulated = candidates.len(),
            "Recommendation stage complete"
        );

        Ok(full)
    }

    /// Products touched by other visitors who engaged with the same products
    async fn collaborative(&self, ctx: &StageContext<'_>) -> AppResult<Vec<Product>> {
        if ctx.engaged.is_empty() {
            return Ok(Vec::new());
        }

        let similar = self
            .activities
            .fingerprints_for_products(&ctx.engaged, ctx.fingerprint)
            .await?;
        if similar.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self
            .activities
            .products_for_fingerprints(&similar, &ctx.engaged)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.products
            .find_by_ids(&ids, Eligibility::RECOMMENDABLE)
            .await
    }

    async fn by_category(&self, ctx: &StageContext<'_>) -> AppResult<Vec<Product>> {
        let categories = self
            .activities
            .top_categories(ctx.fingerprint, ctx.since, self.settings.max_categories)
            .await?;
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        self.products
            .find_by_categories(&categories, Eligibility::RECOMMENDABLE)
            .await
    }

    async fn by_search_terms(&self, ctx: &StageContext<'_>) -> AppResult<Vec<Product>> {
        let queries = self
            .activities
            .recent_search_queries(ctx.fingerprint, ctx.since, self.settings.max_search_queries)
            .await?;
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        self.products
            .find_by_title_or_tags(&queries, Eligibility::RECOMMENDABLE)
            .await
    }

    /// Anonymous path: best-ranked products with a random tie-break
    async fn fill_anonymous(&self, candidates: &mut CandidateSet) -> AppResult<()> {
        let filter = if self.settings.anonymous_require_stock {
            Eligibility::RECOMMENDABLE
        } else {
            Eligibility::PUBLISHED
        };

        let products = self
            .products
            .find_top_ranked_randomized(candidates.remaining() as i64, filter, &[])
            .await?;
        candidates.extend(products);
        Ok(())
    }
}
