use crate::index::{price_band, IndexEntry};
use crate::models::{FacetCount, Facets};
use std::collections::HashMap;

/// Facet counts over the filtered, pre-ranking entry set.
pub fn compute(entries: &[&IndexEntry]) -> Facets {
    let mut providers: HashMap<String, usize> = HashMap::new();
    let mut grades: HashMap<String, usize> = HashMap::new();
    let mut origins: HashMap<String, usize> = HashMap::new();
    let mut flavors: HashMap<String, usize> = HashMap::new();
    let mut price_bands: HashMap<String, usize> = HashMap::new();
    let mut stock: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        *providers.entry(entry.item.provider.clone()).or_insert(0) += 1;
        *grades
            .entry(entry.item.grade.as_str().to_string())
            .or_insert(0) += 1;
        *origins.entry(entry.item.origin.clone()).or_insert(0) += 1;
        for flavor in &entry.item.flavor_tags {
            *flavors.entry(flavor.clone()).or_insert(0) += 1;
        }
        *price_bands
            .entry(price_band(entry.item.price).to_string())
            .or_insert(0) += 1;
        let stock_key = if entry.item.in_stock {
            "in_stock"
        } else {
            "out_of_stock"
        };
        *stock.entry(stock_key.to_string()).or_insert(0) += 1;
    }

    Facets {
        providers: sorted(providers),
        grades: sorted(grades),
        origins: sorted(origins),
        flavors: sorted(flavors),
        price_bands: sorted(price_bands),
        stock: sorted(stock),
    }
}

fn sorted(counts: HashMap<String, usize>) -> Vec<FacetCount> {
    let mut facets: Vec<FacetCount> = counts
        .into_iter()
        .map(|(value, count)| FacetCount { value, count })
        .collect();
    facets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    facets
}
