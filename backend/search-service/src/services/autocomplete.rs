use crate::index::SearchIndex;
use crate::models::{Suggestion, SuggestionKind};
use crate::services::fuzzy::normalize;
use catalog_core::models::{Grade, SearchQueryStat};
use std::collections::HashMap;

const EXACT_SCORE: f64 = 1.0;
const PREFIX_SCORE: f64 = 0.8;
const SUBSTRING_SCORE: f64 = 0.6;
const POPULARITY_BONUS: f64 = 0.2;

/// Searches a query count saturates the popularity signal at.
const HISTORY_SATURATION: f64 = 10.0;

/// Ranked suggestions for a partial query, drawn from index-derived
/// vocabularies plus historically popular queries. Deduplicated by
/// (text, kind), top `limit` by score.
pub fn suggestions(
    index: &SearchIndex,
    history: &[SearchQueryStat],
    fragment: &str,
    limit: usize,
) -> Vec<Suggestion> {
    let fragment = normalize(fragment);
    if fragment.is_empty() {
        return Vec::new();
    }

    let mut best: HashMap<(String, SuggestionKind), f64> = HashMap::new();
    let mut add = |text: &str, kind: SuggestionKind, signal: f64| {
        let Some(base) = match_score(&normalize(text), &fragment) else {
            return;
        };
        let score = base + POPULARITY_BONUS * signal.min(1.0);
        let entry = best.entry((text.to_string(), kind)).or_insert(0.0);
        if score > *entry {
            *entry = score;
        }
    };

    for entry in &index.entries {
        add(&entry.item.name, SuggestionKind::ItemName, entry.popularity);
    }
    for entry in &index.entries {
        add(&entry.item.provider, SuggestionKind::Provider, 0.0);
        add(&entry.item.origin, SuggestionKind::Origin, 0.0);
        for flavor in &entry.item.flavor_tags {
            add(flavor, SuggestionKind::Flavor, 0.0);
        }
    }
    for grade in Grade::ALL {
        add(grade.as_str(), SuggestionKind::Grade, 0.0);
    }
    for stat in history {
        add(
            &stat.query,
            SuggestionKind::History,
            stat.count as f64 / HISTORY_SATURATION,
        );
    }

    let mut ranked: Vec<Suggestion> = best
        .into_iter()
        .map(|((text, kind), score)| Suggestion { text, kind, score })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    ranked.truncate(limit);
    ranked
}

fn match_score(candidate: &str, fragment: &str) -> Option<f64> {
    if candidate == fragment {
        Some(EXACT_SCORE)
    } else if candidate.starts_with(fragment) {
        Some(PREFIX_SCORE)
    } else if candidate.contains(fragment) {
        Some(SUBSTRING_SCORE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::models::CatalogItem;
    use chrono::Utc;

    fn item(name: &str, origin: &str, flavors: &[&str], purchases: i64) -> CatalogItem {
        CatalogItem {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            provider: "Steepery".to_string(),
            origin: origin.to_string(),
            grade: Grade::Ceremonial,
            flavor_tags: flavors.iter().map(|f| f.to_string()).collect(),
            price: 30.0,
            size: "30g".to_string(),
            in_stock: true,
            view_count: 0,
            purchase_count: purchases,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn prefix_beats_substring_and_popularity_breaks_ties() {
        let index = SearchIndex::build(vec![
            item("Uji Reserve", "Uji", &[], 5),
            item("Classic Uji", "Uji", &[], 0),
        ]);

        let results = suggestions(&index, &[], "uji", 10);
        assert!(!results.is_empty());
        // Prefixed popular name: 0.8 + 0.2*1.0 = 1.0, origin exact also 1.0.
        assert!(results
            .iter()
            .any(|s| s.text == "Uji Reserve" && (s.score - 1.0).abs() < 1e-9));
        let classic = results.iter().find(|s| s.text == "Classic Uji").unwrap();
        assert!((classic.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn draws_from_vocabularies_and_history() {
        let index = SearchIndex::build(vec![item("Morning Blend", "Yame", &["umami"], 0)]);
        let history = vec![SearchQueryStat {
            query: "umami matcha".to_string(),
            count: 20,
        }];

        let results = suggestions(&index, &history, "uma", 10);
        assert!(results
            .iter()
            .any(|s| s.kind == SuggestionKind::Flavor && s.text == "umami"));
        let hist = results
            .iter()
            .find(|s| s.kind == SuggestionKind::History)
            .unwrap();
        // Prefix 0.8 plus a saturated history signal.
        assert!((hist.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn grade_vocabulary_is_always_available() {
        let index = SearchIndex::build(Vec::new());
        let results = suggestions(&index, &[], "cere", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, SuggestionKind::Grade);
        assert_eq!(results[0].text, "ceremonial");
    }

    #[test]
    fn empty_fragment_returns_nothing() {
        let index = SearchIndex::build(vec![item("Uji Reserve", "Uji", &[], 0)]);
        assert!(suggestions(&index, &[], "  ", 10).is_empty());
    }
}
