//! Entry/attribute/parameter operations and the batch-oriented [`Catalog`] seam.

use log::{debug, error};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::CatalogRecord;
use crate::error::{CrawlError, Result};
use crate::utils::config::CONTENT_TYPE_ATTRIBUTE;

use super::{UPSERT_ENTRY_SQL, open_db, open_db_in_memory};

/// Value type recorded alongside an attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Integer,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

/// One row of `entries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: i64,
    pub server: String,
    pub path: String,
    pub name: String,
    pub timestamp: i64,
}

/// Insert or refresh the entry for `(server, path)` and return its id.
pub fn upsert_file_entry(
    conn: &Connection,
    server: &str,
    path: &str,
    name: &str,
    timestamp: i64,
) -> Result<i64> {
    let mut stmt = conn.prepare_cached(UPSERT_ENTRY_SQL)?;
    let id = stmt.query_row(params![server, path, name, timestamp], |row| row.get(0))?;
    Ok(id)
}

pub fn get_or_create_attribute(conn: &Connection, name: &str, ty: AttributeType) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO attributes (name, type) VALUES (?1, ?2)",
        params![name, ty.as_str()],
    )?;
    let id = conn.query_row(
        "SELECT id FROM attributes WHERE name = ?1 AND type = ?2",
        params![name, ty.as_str()],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Single-valued attributes are replaced; multivalued ones gain `value` unless already present.
pub fn upsert_attribute_value(
    conn: &Connection,
    entry_id: i64,
    attribute_id: i64,
    value: &str,
    multivalued: bool,
) -> Result<()> {
    if multivalued {
        conn.prepare_cached(
            "INSERT INTO parameters (entry_id, attribute_id, value)
             SELECT ?1, ?2, ?3 WHERE NOT EXISTS (
                SELECT 1 FROM parameters WHERE entry_id = ?1 AND attribute_id = ?2 AND value = ?3
             )",
        )?
        .execute(params![entry_id, attribute_id, value])?;
    } else {
        conn.prepare_cached("DELETE FROM parameters WHERE entry_id = ?1 AND attribute_id = ?2")?
            .execute(params![entry_id, attribute_id])?;
        conn.prepare_cached(
            "INSERT INTO parameters (entry_id, attribute_id, value) VALUES (?1, ?2, ?3)",
        )?
        .execute(params![entry_id, attribute_id, value])?;
    }
    Ok(())
}

pub fn file_entry(conn: &Connection, server: &str, path: &str) -> Result<Option<StoredEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, server, path, name, timestamp FROM entries WHERE server = ?1 AND path = ?2",
            params![server, path],
            |row| {
                Ok(StoredEntry {
                    id: row.get(0)?,
                    server: row.get(1)?,
                    path: row.get(2)?,
                    name: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

/// Values in insertion order.
pub fn attribute_values(conn: &Connection, entry_id: i64, attribute_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT value FROM parameters WHERE entry_id = ?1 AND attribute_id = ?2 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![entry_id, attribute_id], |row| row.get(0))?;
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}

pub fn entry_count(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    Ok(n.max(0) as usize)
}

/// What the flush path needs from a catalog: one transaction per batch, one upsert per file.
pub trait Catalog {
    fn begin_batch(&mut self) -> Result<()>;
    /// Upsert one file record. A failed upsert leaves nothing of that record behind and
    /// keeps the open batch usable.
    fn upsert_file(&mut self, record: &CatalogRecord) -> Result<i64>;
    fn commit_batch(&mut self) -> Result<()>;
}

/// SQLite catalog. The `content-type` attribute id is resolved once at open.
pub struct SqliteCatalog {
    conn: Connection,
    content_type_attr: i64,
}

impl SqliteCatalog {
    pub fn open(path: &Path, passphrase: Option<&str>) -> Result<Self> {
        Self::from_connection(open_db(path, passphrase)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    /// Wrap a connection that already has the schema applied.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let content_type_attr =
            get_or_create_attribute(&conn, CONTENT_TYPE_ATTRIBUTE, AttributeType::String)?;
        debug!("content-type attribute id {}", content_type_attr);
        Ok(Self {
            conn,
            content_type_attr,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn content_type_attribute(&self) -> i64 {
        self.content_type_attr
    }

    pub fn in_batch(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Stored content type of `(server, path)`, if the entry exists.
    pub fn content_type_of(&self, server: &str, path: &str) -> Result<Option<String>> {
        let Some(entry) = file_entry(&self.conn, server, path)? else {
            return Ok(None);
        };
        let values = attribute_values(&self.conn, entry.id, self.content_type_attr)?;
        Ok(values.into_iter().next())
    }

    fn upsert_inner(&self, record: &CatalogRecord) -> Result<i64> {
        let id = upsert_file_entry(
            &self.conn,
            &record.server,
            &record.path,
            &record.name,
            record.timestamp,
        )?;
        upsert_attribute_value(
            &self.conn,
            id,
            self.content_type_attr,
            &record.content_type,
            false,
        )?;
        Ok(id)
    }
}

impl Catalog for SqliteCatalog {
    fn begin_batch(&mut self) -> Result<()> {
        if self.in_batch() {
            return Err(CrawlError::CatalogState(
                "batch already open".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn upsert_file(&mut self, record: &CatalogRecord) -> Result<i64> {
        self.conn.execute_batch("SAVEPOINT upsert_file")?;
        match self.upsert_inner(record) {
            Ok(id) => {
                self.conn.execute_batch("RELEASE upsert_file")?;
                Ok(id)
            }
            Err(e) => {
                if let Err(rb) = self
                    .conn
                    .execute_batch("ROLLBACK TO upsert_file; RELEASE upsert_file")
                {
                    error!("rollback of {}/{} failed: {}", record.server, record.path, rb);
                }
                Err(e)
            }
        }
    }

    fn commit_batch(&mut self) -> Result<()> {
        if !self.in_batch() {
            return Err(CrawlError::CatalogState("no batch to commit".to_string()));
        }
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            if self.in_batch()
                && let Err(rb) = self.conn.execute_batch("ROLLBACK")
            {
                error!("rollback after failed commit: {}", rb);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, ct: &str, ts: i64) -> CatalogRecord {
        CatalogRecord {
            server: "srv".into(),
            path: path.into(),
            name: path.rsplit('/').next().unwrap().into(),
            content_type: ct.into(),
            timestamp: ts,
        }
    }

    #[test]
    fn upsert_updates_instead_of_duplicating() {
        let mut cat = SqliteCatalog::in_memory().unwrap();
        cat.begin_batch().unwrap();
        let a = cat.upsert_file(&record("d/f", "text/plain", 10)).unwrap();
        let b = cat.upsert_file(&record("d/f", "application/pdf", 20)).unwrap();
        cat.commit_batch().unwrap();
        assert_eq!(a, b);
        assert_eq!(entry_count(cat.conn()).unwrap(), 1);
        let stored = file_entry(cat.conn(), "srv", "d/f").unwrap().unwrap();
        assert_eq!(stored.timestamp, 20);
        assert_eq!(
            cat.content_type_of("srv", "d/f").unwrap().as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn attribute_is_created_once() {
        let cat = SqliteCatalog::in_memory().unwrap();
        let again =
            get_or_create_attribute(cat.conn(), CONTENT_TYPE_ATTRIBUTE, AttributeType::String)
                .unwrap();
        assert_eq!(again, cat.content_type_attribute());
        let other =
            get_or_create_attribute(cat.conn(), CONTENT_TYPE_ATTRIBUTE, AttributeType::Integer)
                .unwrap();
        assert_ne!(other, again);
    }

    #[test]
    fn multivalued_appends_without_duplicates() {
        let conn = open_db_in_memory().unwrap();
        let attr = get_or_create_attribute(&conn, "tag", AttributeType::String).unwrap();
        let id = upsert_file_entry(&conn, "srv", "a", "a", 1).unwrap();
        upsert_attribute_value(&conn, id, attr, "x", true).unwrap();
        upsert_attribute_value(&conn, id, attr, "y", true).unwrap();
        upsert_attribute_value(&conn, id, attr, "x", true).unwrap();
        assert_eq!(attribute_values(&conn, id, attr).unwrap(), vec!["x", "y"]);
        upsert_attribute_value(&conn, id, attr, "z", false).unwrap();
        assert_eq!(attribute_values(&conn, id, attr).unwrap(), vec!["z"]);
    }

    #[test]
    fn batch_state_is_checked() {
        let mut cat = SqliteCatalog::in_memory().unwrap();
        assert!(cat.commit_batch().is_err());
        cat.begin_batch().unwrap();
        assert!(cat.begin_batch().is_err());
        cat.commit_batch().unwrap();
        assert!(!cat.in_batch());
    }
}
