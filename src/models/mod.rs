pub mod activity;
pub mod pagination;
pub mod product;

pub use activity::{ActivityRecord, ActivityType, NewActivity, ProductScore, MAX_FINGERPRINT_LEN};
pub use pagination::PageWindow;
pub use product::{CategoryMatch, Eligibility, Product, PUBLISHED};
