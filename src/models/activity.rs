use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Longest fingerprint the activity table accepts
pub const MAX_FINGERPRINT_LEN: usize = 64;

/// Kind of shopper interaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Search,
    Click,
    View,
}

impl ActivityType {
    /// Points one occurrence contributes to a product's activity score
    pub fn weight(self) -> i64 {
        match self {
            ActivityType::Search => 5,
            ActivityType::Click => 3,
            ActivityType::View => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Search => "search",
            ActivityType::Click => "click",
            ActivityType::View => "view",
        }
    }
}

impl Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored interaction row, unique per (fingerprint, type, product)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub fingerprint_hash: String,
    pub activity_type: ActivityType,
    pub product_id: Option<i64>,
    pub category: Option<String>,
    pub search_query: Option<String>,
    pub click_count: i64,
    pub last_updated: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn score(&self) -> i64 {
        self.activity_type.weight() * self.click_count
    }
}

/// Incoming interaction event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewActivity {
    pub fingerprint_hash: String,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search_query: Option<String>,
}

impl NewActivity {
    /// Checks the event and normalizes blank optional text to `None`
    pub fn validate(mut self) -> AppResult<Self> {
        self.fingerprint_hash = self.fingerprint_hash.trim().to_string();
        if self.fingerprint_hash.is_empty() {
            return Err(AppError::InvalidInput(
                "fingerprint_hash is required".to_string(),
            ));
        }
        if self.fingerprint_hash.chars().count() > MAX_FINGERPRINT_LEN {
            return Err(AppError::InvalidInput(format!(
                "fingerprint_hash exceeds {} characters",
                MAX_FINGERPRINT_LEN
            )));
        }

        self.category = non_blank(self.category);
        self.search_query = non_blank(self.search_query);

        let activity_type = self.activity_type;
        match activity_type {
            ActivityType::Search if self.search_query.is_none() => Err(AppError::InvalidInput(
                "search activity requires search_query".to_string(),
            )),
            ActivityType::Click | ActivityType::View if self.product_id.is_none() => Err(
                AppError::InvalidInput(format!("{} activity requires product_id", activity_type)),
            ),
            _ => Ok(self),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Aggregated activity score for one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ProductScore {
    pub product_id: i64,
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(activity_type: ActivityType) -> NewActivity {
        NewActivity {
            fingerprint_hash: "fp-1".to_string(),
            activity_type,
            product_id: None,
            category: None,
            search_query: None,
        }
    }

    #[test]
    fn test_weights() {
        assert_eq!(ActivityType::Search.weight(), 5);
        assert_eq!(ActivityType::Click.weight(), 3);
        assert_eq!(ActivityType::View.weight(), 1);
    }

    #[test]
    fn test_activity_type_serialization() {
        assert_eq!(serde_json::to_string(&ActivityType::Search).unwrap(), "\"search\"");
        let parsed: ActivityType = serde_json::from_str("\"view\"").unwrap();
        assert_eq!(parsed, ActivityType::View);
        assert!(serde_json::from_str::<ActivityType>("\"purchase\"").is_err());
    }

    #[test]
    fn test_record_score_counts_repeats() {
        let record = ActivityRecord {
            fingerprint_hash: "fp".to_string(),
            activity_type: ActivityType::Click,
            product_id: Some(1),
            category: None,
            search_query: None,
            click_count: 2,
            last_updated: Utc::now(),
        };
        assert_eq!(record.score(), 6);
    }

    #[test]
    fn test_validate_requires_fingerprint() {
        let mut e = event(ActivityType::View);
        e.product_id = Some(1);
        e.fingerprint_hash = "   ".to_string();
        assert!(matches!(e.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_long_fingerprint() {
        let mut e = event(ActivityType::View);
        e.product_id = Some(1);
        e.fingerprint_hash = "a".repeat(MAX_FINGERPRINT_LEN + 1);
        assert!(matches!(e.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_counts_fingerprint_characters() {
        let mut e = event(ActivityType::View);
        e.product_id = Some(1);
        e.fingerprint_hash = "é".repeat(40);
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_validate_search_needs_query() {
        let mut e = event(ActivityType::Search);
        e.search_query = Some("  ".to_string());
        assert!(matches!(e.validate(), Err(AppError::InvalidInput(_))));

        let mut e = event(ActivityType::Search);
        e.search_query = Some(" sneakers ".to_string());
        let valid = e.validate().unwrap();
        assert_eq!(valid.search_query.as_deref(), Some("sneakers"));
    }

    #[test]
    fn test_validate_click_needs_product() {
        assert!(event(ActivityType::Click).validate().is_err());

        let mut e = event(ActivityType::Click);
        e.product_id = Some(9);
        e.category = Some(String::new());
        let valid = e.validate().unwrap();
        assert_eq!(valid.category, None);
    }
}
