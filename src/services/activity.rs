use std::sync::Arc;

use chrono::Utc;

use crate::{
    db::ActivityStore,
    error::{AppError, AppResult},
    models::{NewActivity, MAX_FINGERPRINT_LEN},
};

/// Validates an interaction event and records it.
///
/// Repeats of the same (fingerprint, type, product) bump the stored count
/// instead of adding rows. Returns the count after this event.
pub async fn log_activity(store: Arc<dyn ActivityStore>, activity: NewActivity) -> AppResult<i64> {
    let activity = activity.validate()?;

    let click_count = store.record_activity(&activity, Utc::now()).await?;

    tracing::debug!(
        activity_type = %activity.activity_type,
        product_id = ?activity.product_id,
        click_count,
        "Activity recorded"
    );

    Ok(click_count)
}

/// Registers a device fingerprint. Returns `true` when it was not known yet.
pub async fn register_fingerprint(store: Arc<dyn ActivityStore>, fingerprint_hash: &str) -> AppResult<bool> {
    let fingerprint_hash = fingerprint_hash.trim();
    if fingerprint_hash.is_empty() || fingerprint_hash.chars().count() > MAX_FINGERPRINT_LEN {
        return Err(AppError::InvalidInput(format!(
            "fingerprint must be 1 to {} characters",
            MAX_FINGERPRINT_LEN
        )));
    }

    store.register_fingerprint(fingerprint_hash).await
}
