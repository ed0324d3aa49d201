mod item_similarity;
pub(crate) mod user_similarity;

pub use item_similarity::{item_similarity, ItemSimilarityEngine};
pub use user_similarity::UserSimilarityEngine;

use std::collections::HashSet;

/// Jaccard overlap of two string sets, in [0, 1].
pub(crate) fn jaccard_str(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_set: HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let b_set: HashSet<&str> = b.iter().map(|s| s.as_str()).collect();
    let intersection = a_set.intersection(&b_set).count();
    let union = a_set.union(&b_set).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_basics() {
        let a = vec!["umami".to_string(), "sweet".to_string()];
        let b = vec!["umami".to_string(), "grassy".to_string()];
        assert!((jaccard_str(&a, &a) - 1.0).abs() < 1e-9);
        assert!((jaccard_str(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard_str(&a, &[]), 0.0);
    }
}
