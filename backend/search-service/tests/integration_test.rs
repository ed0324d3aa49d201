use catalog_core::models::{CatalogItem, Grade};
use catalog_core::{CatalogStore, InMemoryStore, MemoryCache};
use chrono::Utc;
use search_service::{SearchConfig, SearchError, SearchFilters, SearchService, SuggestionKind};
use std::sync::Arc;
use uuid::Uuid;

fn item(name: &str, grade: Grade, origin: &str, flavors: &[&str], price: f64) -> CatalogItem {
    CatalogItem {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: "stone-ground matcha".to_string(),
        provider: "Steepery".to_string(),
        origin: origin.to_string(),
        grade,
        flavor_tags: flavors.iter().map(|f| f.to_string()).collect(),
        price,
        size: "30g".to_string(),
        in_stock: true,
        view_count: 0,
        purchase_count: 0,
        created_at: Utc::now(),
    }
}

fn service(store: Arc<InMemoryStore>) -> SearchService {
    SearchService::new(
        store,
        Arc::new(MemoryCache::new()),
        SearchConfig::default(),
    )
}

fn three_item_catalog(store: &InMemoryStore) -> (Uuid, Uuid) {
    let exact = item(
        "Ceremonial Uji Matcha",
        Grade::Ceremonial,
        "Uji",
        &["umami"],
        42.0,
    );
    let partial = item("Ceremonial Blend", Grade::Ceremonial, "Yame", &["sweet"], 28.0);
    let unrelated = item("Hojicha Roast", Grade::Kitchen, "Shizuoka", &["bitter"], 9.0);
    let ids = (exact.id, partial.id);
    store.add_item(exact);
    store.add_item(partial);
    store.add_item(unrelated);
    ids
}

#[tokio::test]
async fn ceremonial_uji_query_orders_by_match_quality() {
    let store = Arc::new(InMemoryStore::new());
    let (exact_id, partial_id) = three_item_catalog(&store);

    let svc = service(store);
    let results = svc
        .search("ceremonial uji", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap();

    // The unrelated item falls below the similarity floor.
    assert_eq!(results.total, 2);
    assert_eq!(results.results[0].id, exact_id);
    assert_eq!(results.results[1].id, partial_id);
    assert_eq!(results.analytics.normalized_query, "ceremonial uji");
    assert_eq!(results.analytics.result_count, 2);
}

#[tokio::test]
async fn exact_name_match_ranks_first() {
    let store = Arc::new(InMemoryStore::new());
    let exact = item("Uji Matcha", Grade::Premium, "Uji", &["umami"], 30.0);
    let longer = item("Uji Matcha Reserve", Grade::Premium, "Uji", &["umami"], 30.0);
    let exact_id = exact.id;
    store.add_item(exact);
    store.add_item(longer);

    let svc = service(store);
    let results = svc
        .search("uji matcha", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap();

    assert_eq!(results.total, 2);
    assert_eq!(results.results[0].id, exact_id);
}

#[tokio::test]
async fn empty_query_browses_whole_catalog() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);

    let svc = service(store);
    let results = svc
        .search("", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(results.total, 3);
}

#[tokio::test]
async fn short_query_returns_empty_results_and_facets() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);

    let svc = service(store);
    let results = svc
        .search("u", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(results.total, 0);
    assert!(results.results.is_empty());

    // Facet counts describe that same (empty) result set.
    let facets = svc.get_facets("u", &SearchFilters::default()).await.unwrap();
    assert!(facets.grades.is_empty());
    assert!(facets.providers.is_empty());
    assert!(facets.stock.is_empty());
}

#[tokio::test]
async fn filters_narrow_results_and_pagination_applies() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);

    let svc = service(store.clone());
    let ceremonial_only = SearchFilters {
        grades: vec![Grade::Ceremonial],
        ..Default::default()
    };
    let results = svc
        .search("", &ceremonial_only, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(results.total, 2);

    let second_page = svc.search("", &ceremonial_only, None, 1, 1).await.unwrap();
    assert_eq!(second_page.total, 2);
    assert_eq!(second_page.results.len(), 1);
}

#[tokio::test]
async fn rejects_invalid_limit_and_inverted_price_range() {
    let svc = service(Arc::new(InMemoryStore::new()));

    let err = svc
        .search("matcha", &SearchFilters::default(), None, 0, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Validation(_)));

    let inverted = SearchFilters {
        price_min: Some(50.0),
        price_max: Some(10.0),
        ..Default::default()
    };
    let err = svc
        .search("matcha", &inverted, None, 10, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Validation(_)));
}

#[tokio::test]
async fn unreadable_store_surfaces_index_unavailable() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);
    store.set_fail_reads(true);

    // No index has been built, and the synchronous rebuild cannot read the
    // catalog either.
    let svc = service(store.clone());
    let err = svc
        .search("ceremonial", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::IndexUnavailable));

    store.set_fail_reads(false);
    let results = svc
        .search("ceremonial", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(results.total, 2);
}

#[tokio::test]
async fn facet_counts_sum_over_the_filtered_set() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);

    let svc = service(store);
    let facets = svc
        .get_facets("", &SearchFilters::default())
        .await
        .unwrap();

    let grade_total: usize = facets.grades.iter().map(|f| f.count).sum();
    assert_eq!(grade_total, 3);
    let flavor_total_max = facets.flavors.iter().map(|f| f.count).max().unwrap();
    assert!(flavor_total_max <= 3);
    assert_eq!(facets.stock[0].value, "in_stock");
    assert_eq!(facets.stock[0].count, 3);
}

#[tokio::test]
async fn rebuild_publishes_new_catalog_and_clears_result_cache() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);

    let svc = service(store.clone());
    let before = svc
        .search("", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(before.total, 3);

    store.add_item(item(
        "Shincha Special",
        Grade::Premium,
        "Kagoshima",
        &["grassy"],
        25.0,
    ));
    let entries = svc.rebuild_index().await.unwrap();
    assert_eq!(entries, 4);

    // The rebuild cleared the cached result page.
    let after = svc
        .search("", &SearchFilters::default(), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(after.total, 4);
}

#[tokio::test]
async fn autocomplete_draws_from_index_and_history() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);
    for _ in 0..12 {
        store.record_search_query("ceremonial gift set").await.unwrap();
    }

    let svc = service(store);
    let suggestions = svc.get_autocomplete("cere", 10).await.unwrap();

    assert!(suggestions
        .iter()
        .any(|s| s.kind == SuggestionKind::ItemName && s.text == "Ceremonial Uji Matcha"));
    assert!(suggestions
        .iter()
        .any(|s| s.kind == SuggestionKind::Grade && s.text == "ceremonial"));
    let history = suggestions
        .iter()
        .find(|s| s.kind == SuggestionKind::History)
        .expect("popular query suggested");
    assert!((history.score - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn health_reports_index_state() {
    let store = Arc::new(InMemoryStore::new());
    three_item_catalog(&store);

    let svc = service(store);
    let before = svc.health_check().await;
    assert!(before.healthy());
    assert_eq!(
        before.details.get("index").map(String::as_str),
        Some("not built")
    );

    svc.rebuild_index().await.unwrap();
    let after = svc.health_check().await;
    assert_eq!(
        after.details.get("index").map(String::as_str),
        Some("3 entries")
    );
}
