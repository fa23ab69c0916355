use std::sync::Arc;

use crate::{
    db::{ActivityStore, InMemoryStore, ProductStore},
    services::{RecommendationSettings, Recommender},
};

/// Page sizing applied to listing endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 12,
            max_limit: 50,
        }
    }
}

/// Shared application state
///
/// Holds only shared collaborators; everything request-specific is built
/// inside the handler.
#[derive(Clone)]
pub struct AppState {
    pub activities: Arc<dyn ActivityStore>,
    pub products: Arc<dyn ProductStore>,
    pub recommender: Recommender,
    pub page_limits: PageLimits,
}

impl AppState {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        products: Arc<dyn ProductStore>,
        settings: RecommendationSettings,
        page_limits: PageLimits,
    ) -> Self {
        let recommender = Recommender::new(activities.clone(), products.clone(), settings);
        Self {
            activities,
            products,
            recommender,
            page_limits,
        }
    }

    /// State backed by a single in-memory store
    pub fn in_memory(store: InMemoryStore) -> Self {
        Self::new(
            Arc::new(store.clone()),
            Arc::new(store),
            RecommendationSettings::default(),
            PageLimits::default(),
        )
    }
}
