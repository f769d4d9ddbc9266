#![allow(dead_code)]

use chrono::DateTime;
use metacatalog::{
    EntityKind, MetadataSearch, NewCollection, NewDataObject, SearchConfig, SqliteBackend,
};

pub const ARCHIVE: &str = "/Archive";
pub const PROJECT_X: &str = "/Archive/ProjectX";
pub const SAMPLE_A: &str = "/Archive/ProjectX/SampleA";
pub const SAMPLE_B: &str = "/Archive/ProjectX/SampleB";
pub const PROJECT_Y: &str = "/Archive/ProjectY";
pub const SAMPLE_C: &str = "/Archive/ProjectY/SampleC";

pub const RUN1: &str = "/Archive/ProjectX/SampleA/run1.fastq";
pub const RUN2: &str = "/Archive/ProjectX/SampleA/run2.bam";
pub const NOTES: &str = "/Archive/ProjectX/SampleB/notes.txt";
pub const RUN3: &str = "/Archive/ProjectX/SampleB/run3.fastq";
pub const RUN4: &str = "/Archive/ProjectY/SampleC/run4.fastq";

pub const PROJECT_Y_CREATED: i64 = 1_700_000_000;

pub fn add_collection(backend: &SqliteBackend, path: &str, attrs: &[(&str, &str)]) {
    backend
        .add_collection(&NewCollection::new(path, "admin"))
        .unwrap();
    for (attr, value) in attrs {
        backend
            .add_metadata(EntityKind::Collection, path, attr, value, None)
            .unwrap();
    }
}

pub fn add_data_object(backend: &SqliteBackend, path: &str, size: i64, attrs: &[(&str, &str)]) {
    backend
        .add_data_object(&NewDataObject::new(path, "admin").with_size(size))
        .unwrap();
    let size = size.to_string();
    backend
        .add_metadata(EntityKind::DataObject, path, "size", &size, Some("bytes"))
        .unwrap();
    for (attr, value) in attrs {
        backend
            .add_metadata(EntityKind::DataObject, path, attr, value, None)
            .unwrap();
    }
}

/// Two projects, three samples, five data objects.
///
/// Access: `alice` is in group `lab`, which holds everything under ProjectX;
/// alice also holds run1 directly. `carol` holds SampleC and run4. `bob`
/// holds nothing.
pub fn seed_archive(backend: &SqliteBackend) {
    add_collection(backend, ARCHIVE, &[("collection_type", "Archive")]);
    add_collection(
        backend,
        PROJECT_X,
        &[("collection_type", "Project"), ("project_name", "X")],
    );
    add_collection(
        backend,
        SAMPLE_A,
        &[("collection_type", "Sample"), ("species", "Mouse")],
    );
    add_collection(
        backend,
        SAMPLE_B,
        &[("collection_type", "Sample"), ("species", "Human")],
    );
    backend
        .add_collection(&NewCollection {
            created_at: DateTime::from_timestamp(PROJECT_Y_CREATED, 0),
            comments: Some("second project".to_string()),
            ..NewCollection::new(PROJECT_Y, "admin")
        })
        .unwrap();
    for (attr, value) in [("collection_type", "Project"), ("project_name", "Y")] {
        backend
            .add_metadata(EntityKind::Collection, PROJECT_Y, attr, value, None)
            .unwrap();
    }
    add_collection(
        backend,
        SAMPLE_C,
        &[("collection_type", "Sample"), ("species", "Rat")],
    );

    add_data_object(
        backend,
        RUN1,
        150,
        &[("type", "fastq"), ("collected", "2024-03-15")],
    );
    add_data_object(backend, RUN2, 50, &[("type", "bam")]);
    add_data_object(
        backend,
        RUN3,
        500,
        &[
            ("type", "fastq"),
            ("species", "Mouse"),
            ("collected", "2023-11-02"),
        ],
    );
    add_data_object(backend, NOTES, 5, &[("type", "text")]);
    add_data_object(backend, RUN4, 300, &[("type", "fastq")]);

    backend.add_user("alice").unwrap();
    backend.add_user("bob").unwrap();
    backend.add_user("carol").unwrap();
    backend.add_group("lab").unwrap();
    backend.add_group_member("lab", "alice").unwrap();

    for path in [PROJECT_X, SAMPLE_A, SAMPLE_B] {
        backend
            .grant_access(EntityKind::Collection, path, "lab")
            .unwrap();
    }
    for path in [RUN1, RUN2, RUN3, NOTES] {
        backend
            .grant_access(EntityKind::DataObject, path, "lab")
            .unwrap();
    }
    backend
        .grant_access(EntityKind::DataObject, RUN1, "alice")
        .unwrap();
    backend
        .grant_access(EntityKind::Collection, SAMPLE_C, "carol")
        .unwrap();
    backend
        .grant_access(EntityKind::DataObject, RUN4, "carol")
        .unwrap();
}

/// The archive fixture, indexed and ready to search.
pub fn archive() -> MetadataSearch<SqliteBackend> {
    let backend = SqliteBackend::open_temporary().unwrap();
    seed_archive(&backend);
    let search = MetadataSearch::new(backend);
    search.refresh_index().unwrap();
    search
}

/// `/Bulk` holding `file00` .. `file19`, each tagged `kind=bulk`.
pub fn bulk() -> MetadataSearch<SqliteBackend> {
    bulk_with_config(&SearchConfig::default())
}

pub fn bulk_with_config(config: &SearchConfig) -> MetadataSearch<SqliteBackend> {
    let backend = SqliteBackend::open_temporary().unwrap();
    add_collection(&backend, "/Bulk", &[("collection_type", "Batch")]);
    for i in 0..20 {
        add_data_object(&backend, &format!("/Bulk/file{i:02}"), i, &[("kind", "bulk")]);
    }
    let search = MetadataSearch::with_config(backend, config);
    search.refresh_index().unwrap();
    search
}

pub fn strings(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}
