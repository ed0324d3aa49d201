//! Query normalization and token-level fuzzy field matching.

use crate::index::IndexEntry;

const NAME_WEIGHT: f64 = 0.4;
const DESCRIPTION_WEIGHT: f64 = 0.2;
const PROVIDER_WEIGHT: f64 = 0.2;
const ORIGIN_WEIGHT: f64 = 0.1;
const COMBINED_WEIGHT: f64 = 0.1;

/// Lowercase, strip punctuation to spaces, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Classic two-row edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity of one query token against one field token, in [0, 1].
/// Containment short-circuits; otherwise edit distance within a
/// length-dependent tolerance.
fn token_similarity(query: &str, token: &str) -> f64 {
    if query == token {
        return 1.0;
    }
    if token.contains(query) || query.contains(token) {
        return 0.9;
    }

    let max_len = query.chars().count().max(token.chars().count());
    let tolerance = if max_len <= 4 { 1 } else { 2 };
    let distance = levenshtein(query, token);
    if distance <= tolerance {
        1.0 - distance as f64 / max_len as f64
    } else {
        0.0
    }
}

/// Field score: full-query containment short-circuits to 1.0, otherwise the
/// mean of each query token's best match among field tokens.
fn field_score(query: &str, query_tokens: &[&str], field: &str) -> f64 {
    if field.is_empty() || query_tokens.is_empty() {
        return 0.0;
    }
    if field.contains(query) {
        return 1.0;
    }

    let field_tokens: Vec<&str> = field.split_whitespace().collect();
    let total: f64 = query_tokens
        .iter()
        .map(|qt| {
            field_tokens
                .iter()
                .map(|ft| token_similarity(qt, ft))
                .fold(0.0, f64::max)
        })
        .sum();
    total / query_tokens.len() as f64
}

/// Weighted multi-field relevance of a normalized query against one entry.
pub fn relevance(query: &str, entry: &IndexEntry) -> f64 {
    let tokens: Vec<&str> = query.split_whitespace().collect();

    NAME_WEIGHT * field_score(query, &tokens, &entry.name)
        + DESCRIPTION_WEIGHT * field_score(query, &tokens, &entry.description)
        + PROVIDER_WEIGHT * field_score(query, &tokens, &entry.provider)
        + ORIGIN_WEIGHT * field_score(query, &tokens, &entry.origin)
        + COMBINED_WEIGHT * field_score(query, &tokens, &entry.combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchIndex;
    use catalog_core::models::{CatalogItem, Grade};
    use chrono::Utc;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Ceremonial-Grade, Uji!  "), "ceremonial grade uji");
        assert_eq!(normalize("MATCHA"), "matcha");
        assert_eq!(normalize("..."), "");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("matcha", "matcha"), 0);
        assert_eq!(levenshtein("mtcha", "matcha"), 1);
        assert_eq!(levenshtein("", "uji"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn token_similarity_tolerates_typos() {
        assert_eq!(token_similarity("uji", "uji"), 1.0);
        assert!((token_similarity("mtcha", "matcha") - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
        // "uji" vs "blend" is beyond tolerance.
        assert_eq!(token_similarity("uji", "blend"), 0.0);
    }

    fn entry(name: &str, origin: &str, grade: Grade) -> IndexEntry {
        let item = CatalogItem {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            provider: "Steepery".to_string(),
            origin: origin.to_string(),
            grade,
            flavor_tags: Vec::new(),
            price: 30.0,
            size: "30g".to_string(),
            in_stock: true,
            view_count: 0,
            purchase_count: 0,
            created_at: Utc::now(),
        };
        SearchIndex::build(vec![item]).entries.remove(0)
    }

    #[test]
    fn name_containment_dominates_relevance() {
        let exact = entry("Ceremonial Uji Matcha", "Uji", Grade::Ceremonial);
        let partial = entry("Ceremonial Blend", "Yame", Grade::Ceremonial);
        let unrelated = entry("Hojicha Roast", "Shizuoka", Grade::Kitchen);

        let q = "ceremonial uji";
        let exact_score = relevance(q, &exact);
        let partial_score = relevance(q, &partial);
        let unrelated_score = relevance(q, &unrelated);

        assert!(exact_score > partial_score);
        assert!(partial_score > unrelated_score);
        assert!(unrelated_score < 0.2);
    }
}
