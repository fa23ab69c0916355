use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publish status value that makes a product visible to shoppers
pub const PUBLISHED: &str = "publish";

/// A catalog product as seen by the recommendation engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub category: String,
    /// Free-form tag text, matched by substring
    pub tags: String,
    /// `publish`, `draft`, ...
    pub publish_status: String,
    pub stock_remaining: i32,
    /// Small importance weight; one tier outweighs up to 999 sales
    pub product_rank: i32,
    /// Cumulative units sold
    pub sales: i64,
    pub best_seller: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Composite ordering score, higher first
    pub fn ranking_key(&self) -> i64 {
        i64::from(self.product_rank) * 1000 + self.sales
    }

    pub fn is_published(&self) -> bool {
        self.publish_status == PUBLISHED
    }

    pub fn in_stock(&self) -> bool {
        self.stock_remaining > 0
    }

    pub fn is_eligible(&self, filter: Eligibility) -> bool {
        (!filter.published_only || self.is_published()) && (!filter.in_stock_only || self.in_stock())
    }

    /// Case-insensitive substring match on title or tags.
    /// `term` must already be lowercase.
    pub fn matches_term(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(term) || self.tags.to_lowercase().contains(term)
    }
}

/// Which products a store query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub published_only: bool,
    pub in_stock_only: bool,
}

impl Eligibility {
    /// Published and in stock: what every personalized stage requires
    pub const RECOMMENDABLE: Eligibility = Eligibility {
        published_only: true,
        in_stock_only: true,
    };

    /// Published regardless of stock
    pub const PUBLISHED: Eligibility = Eligibility {
        published_only: true,
        in_stock_only: false,
    };
}

/// Category constraint for "latest products" lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryMatch {
    /// Exactly this category
    Exact(String),
    /// Category containing this fragment, case-insensitive
    Contains(String),
    Any,
}

impl CategoryMatch {
    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryMatch::Exact(c) => category == c,
            CategoryMatch::Contains(fragment) => category
                .to_lowercase()
                .contains(&fragment.to_lowercase()),
            CategoryMatch::Any => true,
        }
    }
}
