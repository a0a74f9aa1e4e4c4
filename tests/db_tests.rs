//! Catalog tests: schema, upsert semantics, file-DB fixture, flush path end to end.

use smbspider::engine::db_ops::{
    AttributeType, attribute_values, entry_count, file_entry, get_or_create_attribute,
    upsert_attribute_value, upsert_file_entry,
};
use smbspider::engine::{Catalog, CatalogWriter, SqliteCatalog, open_db, open_db_in_memory};
use smbspider::pipeline::{BatchSink, DetectContentType};
use smbspider::{CatalogRecord, DiscoveredPath};

struct Label(&'static str);

impl DetectContentType for Label {
    fn detect(&self, _path: &DiscoveredPath) -> String {
        self.0.to_string()
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[test]
fn test_entry_count_empty() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(entry_count(&conn).unwrap(), 0);
}

#[test]
fn test_upsert_file_entry_keeps_one_row_per_server_path() {
    let conn = open_db_in_memory().unwrap();
    let a = upsert_file_entry(&conn, "srv", "docs/a", "a", 1).unwrap();
    let b = upsert_file_entry(&conn, "other", "docs/a", "a", 1).unwrap();
    let a2 = upsert_file_entry(&conn, "srv", "docs/a", "renamed", 5).unwrap();
    assert_ne!(a, b);
    assert_eq!(a, a2);
    assert_eq!(entry_count(&conn).unwrap(), 2);

    let e = file_entry(&conn, "srv", "docs/a").unwrap().unwrap();
    assert_eq!(e.name, "renamed");
    assert_eq!(e.timestamp, 5);
    assert!(file_entry(&conn, "srv", "docs/missing").unwrap().is_none());
}

#[test]
fn test_single_valued_attribute_is_replaced() {
    let conn = open_db_in_memory().unwrap();
    let attr = get_or_create_attribute(&conn, "content-type", AttributeType::String).unwrap();
    let id = upsert_file_entry(&conn, "srv", "f", "f", 1).unwrap();
    upsert_attribute_value(&conn, id, attr, "text/plain", false).unwrap();
    upsert_attribute_value(&conn, id, attr, "application/pdf", false).unwrap();
    assert_eq!(
        attribute_values(&conn, id, attr).unwrap(),
        vec!["application/pdf"]
    );
}

#[test]
fn test_file_db_persists_across_opens() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("catalog.db");
    {
        let mut cat = SqliteCatalog::open(&db, None).unwrap();
        cat.begin_batch().unwrap();
        cat.upsert_file(&CatalogRecord {
            server: "srv".into(),
            path: "share/report.pdf".into(),
            name: "report.pdf".into(),
            content_type: "application/pdf".into(),
            timestamp: 42,
        })
        .unwrap();
        cat.commit_batch().unwrap();
    }
    let cat = SqliteCatalog::from_connection(open_db(&db, None).unwrap()).unwrap();
    assert_eq!(entry_count(cat.conn()).unwrap(), 1);
    assert_eq!(
        cat.content_type_of("srv", "share/report.pdf")
            .unwrap()
            .as_deref(),
        Some("application/pdf")
    );
}

#[test]
fn test_flush_batch_records_server_path_name_timestamp() {
    let mut writer = CatalogWriter::new(SqliteCatalog::in_memory().unwrap(), Label("text/plain"));
    let batch = vec![
        DiscoveredPath::parse("smb://srv/path/to/file1").unwrap(),
        DiscoveredPath::parse("smb://srv/path/to/file2").unwrap(),
    ];
    let before = now();
    let report = writer.flush_batch(&batch).unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.written, 2);

    let conn = writer.catalog().conn();
    assert_eq!(entry_count(conn).unwrap(), 2);
    for (path, name) in [("path/to/file1", "file1"), ("path/to/file2", "file2")] {
        let e = file_entry(conn, "srv", path).unwrap().unwrap();
        assert_eq!(e.server, "srv");
        assert_eq!(e.name, name);
        assert!(e.timestamp >= before);
    }
}

#[test]
fn test_reflush_updates_instead_of_duplicating() {
    let mut writer = CatalogWriter::new(SqliteCatalog::in_memory().unwrap(), Label("x/y"));
    let batch = vec![DiscoveredPath::parse("smb://srv/a/b_c").unwrap()];
    writer.flush_batch(&batch).unwrap();
    writer.flush_batch(&batch).unwrap();
    let conn = writer.catalog().conn();
    assert_eq!(entry_count(conn).unwrap(), 1);
    assert_eq!(file_entry(conn, "srv", "a/b_c").unwrap().unwrap().name, "b c");
}
