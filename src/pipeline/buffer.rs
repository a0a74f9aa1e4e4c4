//! Fixed-capacity buffer of discovered paths with flush-when-full semantics.

use log::debug;

use crate::DiscoveredPath;
use crate::error::Result;

/// Per-batch outcome of a flush. Entry-level failures are collected, not raised.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub attempted: usize,
    pub written: usize,
    pub failed: Vec<(DiscoveredPath, String)>,
}

/// Consumer of a full (or force-flushed) buffer. `Err` means the batch as a whole failed
/// (transaction begin/commit), not that some entries did.
pub trait BatchSink {
    fn flush_batch(&mut self, batch: &[DiscoveredPath]) -> Result<FlushReport>;
}

/// Append-only buffer of at most `capacity` paths. The cursor is the number of filled slots;
/// the buffer is dirty while it is above zero.
pub struct ResultBuffer<S> {
    slots: Vec<DiscoveredPath>,
    capacity: usize,
    sink: S,
    flushes: usize,
}

impl<S: BatchSink> ResultBuffer<S> {
    pub fn new(capacity: usize, sink: S) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            sink,
            flushes: 0,
        }
    }

    /// Add one path. When the buffer is already full it is flushed first, so it never holds
    /// more than `capacity` entries. Returns the report when a flush ran.
    pub fn append(&mut self, path: DiscoveredPath) -> Option<Result<FlushReport>> {
        let flushed = (self.slots.len() >= self.capacity).then(|| self.flush_now());
        self.slots.push(path);
        flushed
    }

    /// Flush whatever is buffered. An empty buffer is a no-op and never reaches the sink.
    pub fn force_flush(&mut self) -> Result<FlushReport> {
        if !self.is_dirty() {
            debug!("no results to flush");
            return Ok(FlushReport::default());
        }
        self.flush_now()
    }

    /// The cursor is reset once the sink returns, whatever it returned.
    fn flush_now(&mut self) -> Result<FlushReport> {
        debug!("flushing {} result(s)", self.slots.len());
        let res = self.sink.flush_batch(&self.slots);
        self.slots.clear();
        self.flushes += 1;
        res
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Flushes that reached the sink since construction.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn pending(&self) -> &[DiscoveredPath] {
        &self.slots
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrawlError;

    #[derive(Default)]
    struct Recording {
        batches: Vec<Vec<DiscoveredPath>>,
        fail: bool,
    }

    impl BatchSink for Recording {
        fn flush_batch(&mut self, batch: &[DiscoveredPath]) -> Result<FlushReport> {
            self.batches.push(batch.to_vec());
            if self.fail {
                return Err(CrawlError::CatalogState("begin failed".into()));
            }
            Ok(FlushReport {
                attempted: batch.len(),
                written: batch.len(),
                failed: Vec::new(),
            })
        }
    }

    fn p(n: usize) -> DiscoveredPath {
        DiscoveredPath::host_root("h").join(&format!("f{n}"))
    }

    #[test]
    fn overflow_append_flushes_exactly_once_first() {
        let mut buf = ResultBuffer::new(3, Recording::default());
        for n in 0..3 {
            assert!(buf.append(p(n)).is_none());
        }
        assert_eq!(buf.len(), 3);
        assert!(buf.sink().batches.is_empty());

        let report = buf.append(p(3)).unwrap().unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(buf.sink().batches.len(), 1);
        assert_eq!(buf.sink().batches[0], vec![p(0), p(1), p(2)]);
        assert_eq!(buf.pending(), &[p(3)]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = ResultBuffer::new(4, Recording::default());
        for n in 0..41 {
            buf.append(p(n));
            assert!(buf.len() <= buf.capacity());
        }
        assert_eq!(buf.flushes(), 10);
    }

    #[test]
    fn force_flush_on_empty_does_not_touch_sink() {
        let mut buf = ResultBuffer::new(4, Recording::default());
        let report = buf.force_flush().unwrap();
        assert_eq!(report, FlushReport::default());
        assert!(buf.sink().batches.is_empty());
        assert_eq!(buf.flushes(), 0);
    }

    #[test]
    fn force_flush_drains_partial_batch() {
        let mut buf = ResultBuffer::new(4, Recording::default());
        buf.append(p(0));
        buf.append(p(1));
        buf.force_flush().unwrap();
        assert!(!buf.is_dirty());
        assert_eq!(buf.sink().batches[0].len(), 2);
        buf.force_flush().unwrap();
        assert_eq!(buf.sink().batches.len(), 1);
    }

    #[test]
    fn cursor_resets_after_failed_flush() {
        let mut buf = ResultBuffer::new(2, Recording {
            fail: true,
            ..Default::default()
        });
        buf.append(p(0));
        assert!(buf.force_flush().is_err());
        assert!(buf.is_empty());
    }
}
