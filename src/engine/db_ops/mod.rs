//! Catalog store: schema, connection setup, entry/attribute/parameter upserts.

mod catalog;
mod connection;

pub use catalog::{
    AttributeType, Catalog, SqliteCatalog, StoredEntry, attribute_values, entry_count,
    file_entry, get_or_create_attribute, upsert_attribute_value, upsert_file_entry,
};
pub use connection::{open_db, open_db_in_memory};

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        PRAGMA busy_timeout = 5000;
        "#;

/// Entries keyed by (server, path); attributes keyed by (name, type); parameters hold values.
pub(crate) const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY,
    server TEXT NOT NULL,
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    UNIQUE (server, path)
);

CREATE TABLE IF NOT EXISTS attributes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    UNIQUE (name, type)
);

CREATE TABLE IF NOT EXISTS parameters (
    entry_id INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    attribute_id INTEGER NOT NULL REFERENCES attributes(id),
    value TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_parameters_entry ON parameters(entry_id, attribute_id);
"#;

pub(crate) const UPSERT_ENTRY_SQL: &str = r#"
INSERT INTO entries (server, path, name, timestamp) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (server, path) DO UPDATE SET name = excluded.name, timestamp = excluded.timestamp
RETURNING id
"#;
