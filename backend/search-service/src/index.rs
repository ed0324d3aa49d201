use crate::services::fuzzy::normalize;
use arc_swap::ArcSwapOption;
use catalog_core::models::CatalogItem;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// One indexed catalog item with denormalized, pre-normalized search fields.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub item: CatalogItem,
    pub name: String,
    pub description: String,
    pub provider: String,
    pub origin: String,
    /// Everything searchable concatenated: name, description, provider,
    /// origin, grade, flavors, size.
    pub combined: String,
    /// `0.1*views + 1.0*purchases`.
    pub popularity: f64,
    pub tags: Vec<String>,
}

/// Immutable snapshot of the searchable catalog. Rebuilt wholesale and
/// published through [`IndexHandle`]; entries are never mutated in place.
#[derive(Debug)]
pub struct SearchIndex {
    pub entries: Vec<IndexEntry>,
    pub built_at: DateTime<Utc>,
}

impl SearchIndex {
    pub fn build(items: Vec<CatalogItem>) -> Self {
        let entries: Vec<IndexEntry> = items.into_iter().map(index_entry).collect();
        info!(entries = entries.len(), "built search index");
        Self {
            entries,
            built_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_entry(item: CatalogItem) -> IndexEntry {
    let name = normalize(&item.name);
    let description = normalize(&item.description);
    let provider = normalize(&item.provider);
    let origin = normalize(&item.origin);
    let flavors = item
        .flavor_tags
        .iter()
        .map(|f| normalize(f))
        .collect::<Vec<_>>();

    let combined = [
        name.as_str(),
        description.as_str(),
        provider.as_str(),
        origin.as_str(),
        item.grade.as_str(),
        &flavors.join(" "),
        &normalize(&item.size),
    ]
    .join(" ");

    let popularity = 0.1 * item.view_count as f64 + 1.0 * item.purchase_count as f64;

    let mut tags = vec![item.grade.as_str().to_string()];
    tags.extend(flavors);
    tags.push(origin.clone());
    tags.push(price_band(item.price).to_string());
    tags.push(size_tier(&item.size).to_string());

    IndexEntry {
        name,
        description,
        provider,
        origin,
        combined,
        popularity,
        tags,
        item,
    }
}

/// Five fixed price bands, shared by index tags and facet counting.
pub fn price_band(price: f64) -> &'static str {
    if price < 15.0 {
        "under_15"
    } else if price < 30.0 {
        "15_30"
    } else if price < 50.0 {
        "30_50"
    } else if price < 80.0 {
        "50_80"
    } else {
        "80_plus"
    }
}

fn size_tier(size: &str) -> &'static str {
    let grams: f64 = size
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect::<String>()
        .parse()
        .unwrap_or(30.0);
    if grams <= 20.0 {
        "small_tin"
    } else if grams <= 50.0 {
        "standard"
    } else {
        "bulk"
    }
}

/// Atomically swappable index handle. Readers take a full snapshot; the
/// rebuild constructs a new index off to the side and publishes it in one
/// swap, so a concurrent search sees either the old or the new index, never
/// a mix.
#[derive(Default)]
pub struct IndexHandle {
    current: ArcSwapOption<SearchIndex>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<SearchIndex>> {
        self.current.load_full()
    }

    pub fn publish(&self, index: SearchIndex) {
        self.current.store(Some(Arc::new(index)));
    }
}
