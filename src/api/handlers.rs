use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::request_id::RequestId;
use crate::models::{NewActivity, PageWindow, Product};
use crate::services::{activity, related};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    /// Visitor fingerprint; absent or empty means anonymous
    #[serde(default)]
    pub fingerprint: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub products: Vec<Product>,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub click_count: i64,
}

#[derive(Debug, Serialize)]
pub struct FingerprintResponse {
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub product: Product,
    pub related: Vec<Product>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Personalized product recommendations for a visitor
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let window = PageWindow::from_page(
        query.page,
        query.limit,
        state.page_limits.default_limit,
        state.page_limits.max_limit,
    );
    let fingerprint = query.fingerprint.unwrap_or_default();

    let products = state
        .recommender
        .recommend(&fingerprint, window)
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id, error = %e, "Recommendation failed");
            AppError::Internal("Failed to fetch recommendations".to_string())
        })?;

    Ok(Json(RecommendationResponse {
        products,
        page: window.page(),
        limit: window.limit,
    }))
}

/// Record a search, click or view
pub async fn log_activity(
    State(state): State<AppState>,
    Json(request): Json<NewActivity>,
) -> AppResult<Json<ActivityResponse>> {
    let click_count = activity::log_activity(state.activities.clone(), request).await?;
    Ok(Json(ActivityResponse { click_count }))
}

/// Register a device fingerprint
pub async fn register_fingerprint(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> AppResult<(StatusCode, Json<FingerprintResponse>)> {
    let created = activity::register_fingerprint(state.activities.clone(), &fingerprint).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(FingerprintResponse { created })))
}

/// Product detail with related products
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ProductDetailResponse>> {
    let (product, related) =
        related::product_with_related(state.products.clone(), product_id, related::RELATED_LIMIT)
            .await?;
    Ok(Json(ProductDetailResponse { product, related }))
}
