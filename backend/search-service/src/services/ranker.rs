use crate::index::IndexEntry;
use crate::models::SearchFilters;

const EXACT_NAME_BOOST: f64 = 2.0;
const NAME_CONTAINS_BOOST: f64 = 1.8;
const DESCRIPTION_CONTAINS_BOOST: f64 = 1.2;
const PROVIDER_CONTAINS_BOOST: f64 = 1.5;
const IN_STOCK_BOOST: f64 = 1.3;
const POPULARITY_FACTOR: f64 = 1.1;
const PRICE_RANGE_BOOST: f64 = 1.1;

/// Composite score for one entry: fuzzy relevance (or the browse baseline)
/// multiplied by each boost that applies independently.
pub fn composite_score(
    relevance: f64,
    entry: &IndexEntry,
    query: &str,
    filters: &SearchFilters,
) -> f64 {
    let mut score = relevance;

    if !query.is_empty() {
        if entry.name == query {
            score *= EXACT_NAME_BOOST;
        }
        if entry.name.contains(query) {
            score *= NAME_CONTAINS_BOOST;
        }
        if entry.description.contains(query) {
            score *= DESCRIPTION_CONTAINS_BOOST;
        }
        if entry.provider.contains(query) {
            score *= PROVIDER_CONTAINS_BOOST;
        }
    }

    if entry.item.in_stock {
        score *= IN_STOCK_BOOST;
    }

    score *= 1.0 + entry.popularity * POPULARITY_FACTOR;

    if filters.has_price_range() {
        let above_min = filters.price_min.map_or(true, |min| entry.item.price >= min);
        let below_max = filters.price_max.map_or(true, |max| entry.item.price <= max);
        if above_min && below_max {
            score *= PRICE_RANGE_BOOST;
        }
    }

    score
}

/// Sorts scored entries descending and applies offset/limit pagination.
pub fn rank_and_paginate<T>(
    mut scored: Vec<(T, f64)>,
    offset: usize,
    limit: usize,
) -> (Vec<T>, usize) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let total = scored.len();
    let page = scored
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(entry, _)| entry)
        .collect();
    (page, total)
}
