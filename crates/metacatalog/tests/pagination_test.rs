mod common;

use common::*;
use metacatalog::{
    CatalogError, CompoundQuery, InvalidQuery, MetadataPredicate, SearchConfig, SearchOptions,
};

fn bulk_query() -> CompoundQuery {
    MetadataPredicate::equal("kind", "bulk").into()
}

fn bulk_path(i: usize) -> String {
    format!("/Bulk/file{i:02}")
}

#[test]
fn test_offset_ten_limit_five_returns_items_eleven_to_fifteen() {
    let search = bulk();
    let query = bulk_query();

    let everything = search
        .data_object_paths(None, &query, &SearchOptions::default())
        .unwrap();
    let page = search
        .data_object_paths(None, &query, &SearchOptions::default().page(10, 5))
        .unwrap();

    assert_eq!(everything.len(), 20);
    assert_eq!(page, everything[10..15].to_vec());
    assert_eq!(page, (10..15).map(bulk_path).collect::<Vec<_>>());
}

#[test]
fn test_pages_concatenate_without_gaps_or_duplicates() {
    let search = bulk();
    let query = bulk_query();
    let everything = search
        .data_object_paths(None, &query, &SearchOptions::default())
        .unwrap();

    let limit = 7;
    let mut pages = Vec::new();
    let mut offset = 0;
    loop {
        let page = search
            .data_object_paths(None, &query, &SearchOptions::default().page(offset, limit))
            .unwrap();
        if page.is_empty() {
            break;
        }
        pages.extend(page);
        offset += limit;
    }

    assert_eq!(pages, everything);
}

#[test]
fn test_page_past_the_end_is_empty() {
    let search = bulk();
    let page = search
        .data_object_paths(None, &bulk_query(), &SearchOptions::default().page(40, 5))
        .unwrap();
    assert!(page.is_empty());
}

#[test]
fn test_offset_without_limit_is_invalid() {
    let search = bulk();
    let options = SearchOptions {
        offset: Some(10),
        ..SearchOptions::default()
    };

    let err = search
        .data_object_paths(None, &bulk_query(), &options)
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::InvalidQuery(InvalidQuery::PartialPagination)
    ));

    let options = SearchOptions {
        limit: Some(5),
        ..SearchOptions::default()
    };
    let err = search
        .detailed_collection_paths(&bulk_query(), &options)
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::InvalidQuery(InvalidQuery::PartialPagination)
    ));
}

#[test]
fn test_detailed_pages_match_path_pages() {
    let search = bulk();
    let options = SearchOptions::default().page(3, 4);

    let paths = search
        .data_object_paths(None, &bulk_query(), &options)
        .unwrap();
    let detailed = search
        .detailed_data_object_paths(None, &bulk_query(), &options)
        .unwrap();

    let detailed_paths: Vec<String> = detailed.iter().map(|e| e.path().to_string()).collect();
    assert_eq!(detailed_paths, paths);
}

#[test]
fn test_default_page_limit_applies_only_without_pagination() {
    let config = SearchConfig {
        default_page_limit: Some(7),
        ..SearchConfig::default()
    };
    let search = bulk_with_config(&config);
    let query = bulk_query();

    let first_page = search
        .data_object_paths(None, &query, &SearchOptions::default())
        .unwrap();
    let explicit = search
        .data_object_paths(None, &query, &SearchOptions::default().page(0, 20))
        .unwrap();

    assert_eq!(first_page, (0..7).map(bulk_path).collect::<Vec<_>>());
    assert_eq!(explicit.len(), 20);
    assert_eq!(
        search
            .data_object_count(None, &query, &SearchOptions::default())
            .unwrap(),
        20
    );
}
