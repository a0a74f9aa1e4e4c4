//! Flush path: turn a buffered batch of paths into catalog records inside one transaction.

use log::{debug, error, warn};

use crate::engine::db_ops::Catalog;
use crate::engine::tools::{split_server_path, unix_now};
use crate::error::{CrawlError, Result};
use crate::pipeline::{BatchSink, DetectContentType, FlushReport};
use crate::{CatalogRecord, DiscoveredPath};

/// Writes batches from a [`crate::pipeline::ResultBuffer`] into a [`Catalog`].
///
/// Per-entry failures are collected and the batch goes on; the commit runs after every entry
/// has been attempted. Begin or commit failures fail the whole batch.
pub struct CatalogWriter<C, D> {
    catalog: C,
    detector: D,
}

impl<C: Catalog, D: DetectContentType> CatalogWriter<C, D> {
    pub fn new(catalog: C, detector: D) -> Self {
        Self { catalog, detector }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn into_parts(self) -> (C, D) {
        (self.catalog, self.detector)
    }

    fn write_one(&mut self, host: &str, path: &DiscoveredPath) -> Result<i64> {
        if path.host() != host {
            return Err(CrawlError::Validation(format!(
                "{path} does not belong to batch host {host}"
            )));
        }
        let (server_path, name) = split_server_path(path)?;
        let content_type = self.detector.detect(path);
        let record = CatalogRecord {
            server: host.to_string(),
            path: server_path,
            name,
            content_type,
            timestamp: unix_now(),
        };
        self.catalog.upsert_file(&record)
    }
}

impl<C: Catalog, D: DetectContentType> BatchSink for CatalogWriter<C, D> {
    fn flush_batch(&mut self, batch: &[DiscoveredPath]) -> Result<FlushReport> {
        let Some(first) = batch.first() else {
            return Ok(FlushReport::default());
        };
        let host = first.host().to_string();

        if let Err(e) = self.catalog.begin_batch() {
            error!("cannot begin batch for {}: {}", host, e);
            return Err(e);
        }

        let mut report = FlushReport {
            attempted: batch.len(),
            ..Default::default()
        };
        for path in batch {
            match self.write_one(&host, path) {
                Ok(_) => report.written += 1,
                Err(e) => {
                    warn!("not cataloged {}: {}", path, e);
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        if let Err(e) = self.catalog.commit_batch() {
            error!(
                "commit of {} entr(ies) for {} failed: {}",
                report.written, host, e
            );
            return Err(e);
        }
        debug!(
            "{}: committed {}/{} entries",
            host, report.written, report.attempted
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::db_ops::{SqliteCatalog, file_entry};

    struct FixedType(&'static str);

    impl DetectContentType for FixedType {
        fn detect(&self, _path: &DiscoveredPath) -> String {
            self.0.to_string()
        }
    }

    fn paths(urls: &[&str]) -> Vec<DiscoveredPath> {
        urls.iter()
            .map(|u| DiscoveredPath::parse(u).unwrap())
            .collect()
    }

    #[test]
    fn batch_is_written_with_split_fields() {
        let mut w = CatalogWriter::new(SqliteCatalog::in_memory().unwrap(), FixedType("text/plain"));
        let before = unix_now();
        let report = w
            .flush_batch(&paths(&["smb://srv/path/to/file_1", "smb://srv/path/to/file2"]))
            .unwrap();
        assert_eq!(report.written, 2);
        assert!(report.failed.is_empty());

        let conn = w.catalog().conn();
        let e = file_entry(conn, "srv", "path/to/file_1").unwrap().unwrap();
        assert_eq!(e.name, "file 1");
        assert!(e.timestamp >= before);
        assert_eq!(
            w.catalog().content_type_of("srv", "path/to/file2").unwrap().as_deref(),
            Some("text/plain")
        );
    }

    #[test]
    fn foreign_host_entry_fails_alone() {
        let mut w = CatalogWriter::new(SqliteCatalog::in_memory().unwrap(), FixedType("x/y"));
        let report = w
            .flush_batch(&paths(&["smb://a/s/f1", "smb://b/s/f2", "smb://a/s/f3"]))
            .unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.written, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.as_str(), "smb://b/s/f2");
        assert!(!w.catalog().in_batch());
    }

    #[derive(Default)]
    struct BrokenCommit {
        upserts: usize,
    }

    impl Catalog for BrokenCommit {
        fn begin_batch(&mut self) -> Result<()> {
            Ok(())
        }
        fn upsert_file(&mut self, _record: &CatalogRecord) -> Result<i64> {
            self.upserts += 1;
            Ok(self.upserts as i64)
        }
        fn commit_batch(&mut self) -> Result<()> {
            Err(CrawlError::CatalogState("disk full".into()))
        }
    }

    #[test]
    fn commit_failure_fails_batch_after_all_entries() {
        let mut w = CatalogWriter::new(BrokenCommit::default(), FixedType("x/y"));
        let err = w
            .flush_batch(&paths(&["smb://a/s/f1", "smb://a/s/f2"]))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Catalog);
        assert_eq!(w.catalog().upserts, 2);
    }

    #[test]
    fn empty_batch_touches_nothing() {
        let mut w = CatalogWriter::new(BrokenCommit::default(), FixedType("x/y"));
        assert_eq!(w.flush_batch(&[]).unwrap(), FlushReport::default());
    }
}
