use crate::error::{Result, SearchError};
use crate::index::IndexEntry;
use crate::models::SearchFilters;
use crate::services::fuzzy::normalize;

/// Boundary validation. Malformed filters never reach scoring.
pub fn validate(filters: &SearchFilters) -> Result<()> {
    if let (Some(min), Some(max)) = (filters.price_min, filters.price_max) {
        if min > max {
            return Err(SearchError::Validation(format!(
                "inverted price range: {} > {}",
                min, max
            )));
        }
    }
    if filters.price_min.is_some_and(|p| p < 0.0) || filters.price_max.is_some_and(|p| p < 0.0) {
        return Err(SearchError::Validation("negative price bound".to_string()));
    }
    Ok(())
}

/// Whether one entry passes every requested predicate.
pub fn matches(entry: &IndexEntry, filters: &SearchFilters) -> bool {
    if !filters.providers.is_empty()
        && !filters
            .providers
            .iter()
            .any(|p| normalize(p) == entry.provider)
    {
        return false;
    }

    if let Some(min) = filters.price_min {
        if entry.item.price < min {
            return false;
        }
    }
    if let Some(max) = filters.price_max {
        if entry.item.price > max {
            return false;
        }
    }

    if !filters.grades.is_empty() && !filters.grades.contains(&entry.item.grade) {
        return false;
    }

    if let Some(in_stock) = filters.in_stock {
        if entry.item.in_stock != in_stock {
            return false;
        }
    }

    // Origin is a substring match, any of.
    if !filters.origins.is_empty()
        && !filters
            .origins
            .iter()
            .any(|o| entry.origin.contains(&normalize(o)))
    {
        return false;
    }

    // Flavor is a set intersection, any of.
    if !filters.flavors.is_empty() {
        let wanted: Vec<String> = filters.flavors.iter().map(|f| normalize(f)).collect();
        if !entry
            .item
            .flavor_tags
            .iter()
            .any(|tag| wanted.contains(&normalize(tag)))
        {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchIndex;
    use catalog_core::models::{CatalogItem, Grade};
    use chrono::Utc;

    fn entry(grade: Grade, price: f64, origin: &str, flavors: &[&str], in_stock: bool) -> IndexEntry {
        let item = CatalogItem {
            id: uuid::Uuid::new_v4(),
            name: "matcha".to_string(),
            description: String::new(),
            provider: "Steepery".to_string(),
            origin: origin.to_string(),
            grade,
            flavor_tags: flavors.iter().map(|f| f.to_string()).collect(),
            price,
            size: "30g".to_string(),
            in_stock,
            view_count: 0,
            purchase_count: 0,
            created_at: Utc::now(),
        };
        SearchIndex::build(vec![item]).entries.remove(0)
    }

    #[test]
    fn rejects_inverted_price_range() {
        let filters = SearchFilters {
            price_min: Some(50.0),
            price_max: Some(20.0),
            ..Default::default()
        };
        assert!(matches!(
            validate(&filters),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn empty_filters_match_everything() {
        let e = entry(Grade::Kitchen, 9.0, "Nishio", &["bitter"], false);
        assert!(matches(&e, &SearchFilters::default()));
    }

    #[test]
    fn each_predicate_can_exclude() {
        let e = entry(Grade::Premium, 30.0, "Uji", &["umami"], true);

        let wrong_grade = SearchFilters {
            grades: vec![Grade::Ceremonial],
            ..Default::default()
        };
        assert!(!matches(&e, &wrong_grade));

        let too_cheap = SearchFilters {
            price_min: Some(40.0),
            ..Default::default()
        };
        assert!(!matches(&e, &too_cheap));

        let out_of_stock_only = SearchFilters {
            in_stock: Some(false),
            ..Default::default()
        };
        assert!(!matches(&e, &out_of_stock_only));

        let other_origin = SearchFilters {
            origins: vec!["Yame".to_string()],
            ..Default::default()
        };
        assert!(!matches(&e, &other_origin));
    }

    #[test]
    fn origin_matches_on_substring_any() {
        let e = entry(Grade::Premium, 30.0, "Uji, Kyoto", &["umami"], true);
        let filters = SearchFilters {
            origins: vec!["kyoto".to_string(), "Yame".to_string()],
            ..Default::default()
        };
        assert!(matches(&e, &filters));
    }

    #[test]
    fn flavor_intersects_case_insensitively() {
        let e = entry(Grade::Premium, 30.0, "Uji", &["Umami", "sweet"], true);
        let filters = SearchFilters {
            flavors: vec!["UMAMI".to_string()],
            ..Default::default()
        };
        assert!(matches(&e, &filters));
    }
}
