pub mod activity;
pub mod candidates;
pub mod recommendations;
pub mod related;

pub use candidates::CandidateSet;
pub use recommendations::{RecommendationSettings, Recommender, Stage};
