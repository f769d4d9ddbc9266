mod common;

use std::collections::BTreeSet;

use common::*;
use metacatalog::{EntityKind, LevelAttributes};

fn level(label: &str, attributes: &[&str]) -> LevelAttributes {
    LevelAttributes {
        level_label: Some(label.to_string()),
        attributes: attributes.iter().map(|a| a.to_string()).collect::<BTreeSet<_>>(),
    }
}

#[test]
fn test_data_object_attributes_grouped_by_label() {
    let search = archive();
    let groups = search.data_object_metadata_attributes(None, None).unwrap();

    assert_eq!(
        groups,
        vec![
            level("Archive", &["collection_type"]),
            level("DataObject", &["collected", "size", "species", "type"]),
            level("Project", &["collection_type", "project_name"]),
            level("Sample", &["collection_type", "species"]),
        ]
    );
}

#[test]
fn test_single_label_filter() {
    let search = archive();

    assert_eq!(
        search
            .data_object_metadata_attributes(Some("Sample"), None)
            .unwrap(),
        vec![level("Sample", &["collection_type", "species"])]
    );
    assert_eq!(
        search
            .collection_metadata_attributes(Some("Project"), None)
            .unwrap(),
        vec![level("Project", &["collection_type", "project_name"])]
    );
    assert!(search
        .collection_metadata_attributes(Some("Nothing"), None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_attributes_respect_access() {
    let search = archive();

    let carol = search
        .data_object_metadata_attributes(None, Some("carol"))
        .unwrap();
    assert_eq!(
        carol,
        vec![
            level("Archive", &["collection_type"]),
            level("DataObject", &["size", "type"]),
            level("Project", &["collection_type", "project_name"]),
            level("Sample", &["collection_type", "species"]),
        ]
    );

    assert!(search
        .data_object_metadata_attributes(None, Some("bob"))
        .unwrap()
        .is_empty());
    assert!(search
        .collection_metadata_attributes(Some("Sample"), Some("bob"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_collection_labels_come_from_collection_type() {
    let search = archive();
    let groups = search.collection_metadata_attributes(None, None).unwrap();
    let labels: Vec<Option<&str>> = groups.iter().map(|g| g.level_label.as_deref()).collect();
    assert_eq!(labels, vec![Some("Archive"), Some("Project"), Some("Sample")]);
}

#[test]
fn test_unlabeled_rows_form_their_own_group() {
    let search = archive();
    add_collection(search.backend(), "/Scratch", &[("owner_note", "tmp")]);
    search.refresh_index().unwrap();

    let groups = search.collection_metadata_attributes(None, None).unwrap();
    assert_eq!(
        groups[0],
        LevelAttributes {
            level_label: None,
            attributes: BTreeSet::from(["owner_note".to_string()]),
        }
    );
    assert!(search
        .backend()
        .resolve_path(EntityKind::Collection, "/Scratch")
        .unwrap()
        .is_some());
}
