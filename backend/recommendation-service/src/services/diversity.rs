use crate::models::Candidate;
use catalog_core::models::Grade;
use std::collections::HashMap;

/// Greedy diversity filter over score-ordered candidates.
///
/// Walks candidates by descending score, capping how many of the same grade
/// and the same origin may be selected. The caps are soft at the bottom: the
/// result never drops below the `floor` highest-scoring candidates, so a
/// narrow catalog still fills the page.
pub struct DiversityFilter {
    grade_cap: usize,
    origin_cap: usize,
    floor: usize,
}

impl DiversityFilter {
    pub fn new(grade_cap: usize, origin_cap: usize, floor: usize) -> Self {
        Self {
            grade_cap,
            origin_cap,
            floor,
        }
    }

    pub fn apply(&self, mut candidates: Vec<Candidate>, target: usize) -> Vec<Candidate> {
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut grade_counts: HashMap<Grade, usize> = HashMap::new();
        let mut origin_counts: HashMap<String, usize> = HashMap::new();
        let mut selected: Vec<Candidate> = Vec::new();
        let mut skipped: Vec<Candidate> = Vec::new();

        for candidate in candidates {
            if selected.len() >= target {
                break;
            }
            let grade_count = grade_counts.get(&candidate.item.grade).copied().unwrap_or(0);
            let origin_count = origin_counts
                .get(&candidate.item.origin)
                .copied()
                .unwrap_or(0);

            if grade_count >= self.grade_cap || origin_count >= self.origin_cap {
                skipped.push(candidate);
                continue;
            }

            *grade_counts.entry(candidate.item.grade).or_insert(0) += 1;
            *origin_counts
                .entry(candidate.item.origin.clone())
                .or_insert(0) += 1;
            selected.push(candidate);
        }

        // Backfill in pure score order: never drop below the `floor`
        // highest-scoring candidates even when that breaks the caps.
        let min_len = self.floor.min(selected.len() + skipped.len()).min(target);
        let mut backfill = skipped.into_iter();
        while selected.len() < min_len {
            match backfill.next() {
                Some(candidate) => selected.push(candidate),
                None => break,
            }
        }

        selected
    }
}
