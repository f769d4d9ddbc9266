mod common;

use common::*;
use metacatalog::{
    CatalogBackend, CompoundQuery, EntityKind, MaintenancePhase, MetadataPredicate, MetadataSearch,
    SearchConfig, SearchOptions, SqliteBackend,
};
use tempfile::TempDir;

fn fastq() -> CompoundQuery {
    MetadataPredicate::equal("type", "fastq").into()
}

#[test]
fn test_searches_before_first_refresh_are_empty() {
    let backend = SqliteBackend::open_temporary().unwrap();
    seed_archive(&backend);
    let search = MetadataSearch::new(backend);

    assert!(search
        .data_object_paths(None, &fastq(), &SearchOptions::default())
        .unwrap()
        .is_empty());

    search.refresh_index().unwrap();
    assert_eq!(
        search
            .data_object_paths(None, &fastq(), &SearchOptions::default())
            .unwrap(),
        strings(&[RUN1, RUN3, RUN4])
    );
}

#[test]
fn test_new_metadata_is_visible_after_refresh() {
    let search = archive();
    let new_run = "/Archive/ProjectY/SampleC/run5.fastq";
    add_data_object(search.backend(), new_run, 80, &[("type", "fastq")]);

    let stale = search
        .data_object_paths(None, &fastq(), &SearchOptions::default())
        .unwrap();
    assert_eq!(stale, strings(&[RUN1, RUN3, RUN4]));

    search.refresh_index().unwrap();
    let fresh = search
        .data_object_paths(None, &fastq(), &SearchOptions::default())
        .unwrap();
    assert_eq!(fresh, strings(&[RUN1, RUN3, RUN4, new_run]));
    assert_eq!(search.maintenance_phase(), MaintenancePhase::Idle);
}

#[test]
fn test_leftover_staging_is_cleaned_by_next_refresh() {
    let search = archive();

    // An interrupted run: staging built but never published.
    search.backend().prepare_staging().unwrap();
    search
        .backend()
        .add_metadata(EntityKind::Collection, SAMPLE_C, "tissue", "liver", None)
        .unwrap();

    let tissue = CompoundQuery::from(MetadataPredicate::equal("tissue", "liver"));
    assert!(search
        .collection_paths(&tissue, &SearchOptions::default())
        .unwrap()
        .is_empty());

    search.refresh_index().unwrap();
    assert_eq!(
        search
            .collection_paths(&tissue, &SearchOptions::default())
            .unwrap(),
        strings(&[SAMPLE_C])
    );
    assert_eq!(
        search
            .data_object_paths(None, &tissue, &SearchOptions::default())
            .unwrap(),
        strings(&[RUN4])
    );
}

#[test]
fn test_repeated_refresh_is_stable() {
    let search = archive();
    let before = search
        .detailed_data_object_paths(None, &fastq(), &SearchOptions::default())
        .unwrap();

    search.refresh_index().unwrap();
    search.refresh_index().unwrap();

    let after = search
        .detailed_data_object_paths(None, &fastq(), &SearchOptions::default())
        .unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_on_disk_catalog_keeps_published_index() {
    let dir = TempDir::new().unwrap();
    let config = SearchConfig {
        database: dir.path().join("catalog.db"),
        ..SearchConfig::default()
    };

    {
        let search = MetadataSearch::open(&config).unwrap();
        seed_archive(search.backend());
        search.refresh_index().unwrap();
    }

    let reopened = MetadataSearch::open(&config).unwrap();
    assert_eq!(
        reopened
            .data_object_count(None, &fastq(), &SearchOptions::default())
            .unwrap(),
        3
    );
}
