use std::collections::HashSet;

use crate::models::{PageWindow, Product};

/// Ordered, deduplicated accumulator of recommended products
///
/// The first stage to surface a product fixes its position. Ids marked
/// excluded are never accepted.
#[derive(Debug)]
pub struct CandidateSet {
    products: Vec<Product>,
    seen: HashSet<i64>,
    target: usize,
}

impl CandidateSet {
    pub fn new(target: usize) -> Self {
        Self {
            products: Vec::with_capacity(target.min(256)),
            seen: HashSet::new(),
            target,
        }
    }

    /// Marks ids as taken without adding them to the output
    pub fn exclude<I: IntoIterator<Item = i64>>(&mut self, ids: I) {
        self.seen.extend(ids);
    }

    /// Appends unseen products in order, stopping at the target.
    /// Returns whether the target has been reached.
    pub fn extend<I: IntoIterator<Item = Product>>(&mut self, products: I) -> bool {
        for product in products {
            if self.is_full() {
                break;
            }
            if self.seen.insert(product.id) {
                self.products.push(product);
            }
        }
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.products.len() >= self.target
    }

    /// Slots still open before the target is reached
    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.products.len())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Every id accepted or excluded so far
    pub fn seen_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.seen.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Cuts the requested page out of the accumulated list
    pub fn into_page(self, window: PageWindow) -> Vec<Product> {
        window.slice(self.products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PUBLISHED;
    use chrono::Utc;

    fn product(id: i64) -> Product {
        Product {
            id,
            title: format!("Product {}", id),
            category: "general".to_string(),
            tags: String::new(),
            publish_status: PUBLISHED.to_string(),
            stock_remaining: 1,
            product_rank: 0,
            sales: 0,
            best_seller: false,
            created_at: Utc::now(),
        }
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_extend_skips_duplicates_and_keeps_first_position() {
        let mut set = CandidateSet::new(10);
        assert!(!set.extend(vec![product(3), product(1)]));
        assert!(!set.extend(vec![product(1), product(2), product(3)]));
        assert_eq!(ids(&set.into_page(PageWindow::new(10, 0))), vec![3, 1, 2]);
    }

    #[test]
    fn test_extend_stops_at_target() {
        let mut set = CandidateSet::new(2);
        assert!(set.extend((1..=5).map(product)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.remaining(), 0);
        assert!(set.extend(vec![product(9)]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_excluded_ids_never_enter() {
        let mut set = CandidateSet::new(5);
        set.exclude([2, 4]);
        set.extend((1..=5).map(product));
        assert_eq!(set.seen_ids(), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&set.into_page(PageWindow::new(5, 0))), vec![1, 3, 5]);
    }

    #[test]
    fn test_into_page_slices_window() {
        let mut set = CandidateSet::new(6);
        set.extend((1..=6).map(product));
        assert_eq!(ids(&set.into_page(PageWindow::new(3, 3))), vec![4, 5, 6]);
    }

    #[test]
    fn test_zero_target_is_immediately_full() {
        let set = CandidateSet::new(0);
        assert!(set.is_full());
        assert!(set.is_empty());
    }
}
