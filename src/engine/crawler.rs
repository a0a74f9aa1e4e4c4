//! The standing crawl loop: acquire host, walk, release, flush, repeat.

use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::engine::db_ops::{Catalog, SqliteCatalog};
use crate::engine::flush::CatalogWriter;
use crate::engine::progress::WalkProgress;
use crate::engine::scheduler::HostScheduler;
use crate::error::{CrawlError, Result};
use crate::pipeline::{
    ContentTypeDetector, FlushReport, ResultBuffer, TreeWalker, log_skipped_subtrees,
};
use crate::remote::RemoteNamespace;
use crate::utils::ScratchDir;
use crate::utils::config::IDLE_WAIT;
use crate::{DiscoveredPath, ErrorKind};

/// What one host cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub host: String,
    pub files: usize,
    /// Directories (root included) whose listing failed and whose subtree was dropped.
    pub skipped_dirs: usize,
    pub flushes: usize,
    pub failed_entries: usize,
    /// Flushes whose transaction could not begin or commit.
    pub failed_batches: usize,
}

impl HostReport {
    fn tally(&mut self, flushed: Result<FlushReport>) {
        self.flushes += 1;
        match flushed {
            Ok(report) => self.failed_entries += report.failed.len(),
            Err(e) => {
                error!("flush for {} failed: {}", self.host, e);
                self.failed_batches += 1;
            }
        }
    }
}

type Writer<C> = CatalogWriter<C, ContentTypeDetector>;

/// One crawler instance: a walker, a result buffer and the catalog writer behind it.
///
/// The scratch directory and the cached catalog attribute live on the instance, so several
/// crawlers can run side by side with their own.
pub struct Crawler<C: Catalog> {
    id: usize,
    scheduler: Arc<HostScheduler>,
    walker: TreeWalker,
    buffer: ResultBuffer<Writer<C>>,
    show_progress: bool,
}

impl<C: Catalog> Crawler<C> {
    pub fn new(
        id: usize,
        scheduler: Arc<HostScheduler>,
        ns: Arc<dyn RemoteNamespace>,
        catalog: C,
        scratch: ScratchDir,
        capacity: usize,
    ) -> Self {
        let detector = ContentTypeDetector::new(ns.clone(), scratch);
        Self {
            id,
            scheduler,
            walker: TreeWalker::new(ns),
            buffer: ResultBuffer::new(capacity, CatalogWriter::new(catalog, detector)),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn catalog(&self) -> &C {
        self.buffer.sink().catalog()
    }

    pub fn scheduler(&self) -> &Arc<HostScheduler> {
        &self.scheduler
    }

    /// Walk one host into the buffer. Full batches flush along the way; the tail stays
    /// buffered. Only a protocol violation is returned as an error.
    fn walk_host(&mut self, host: &str, report: &mut HostReport) -> Result<()> {
        let root = DiscoveredPath::host_root(host);
        let mut progress = WalkProgress::for_host(self.show_progress, host, self.id as u16);
        let buffer = &mut self.buffer;
        let walked = self.walker.walk(&root, |path| {
            report.files += 1;
            progress.tick();
            if let Some(flushed) = buffer.append(path) {
                report.tally(flushed);
            }
        });
        progress.finish();

        match walked {
            Ok(summary) => {
                report.skipped_dirs += summary.skipped.len();
                log_skipped_subtrees(host, &summary.skipped);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::Protocol => Err(e),
            Err(e) => {
                warn!("cannot walk {}: {}", host, e);
                report.skipped_dirs += 1;
                Ok(())
            }
        }
    }

    /// One loop iteration: lease a host (waiting up to `wait`), walk it, give it back, then
    /// force-flush whatever the walk left in the buffer.
    ///
    /// `Ok(None)` when no host was free. On a protocol violation the gathered paths are still
    /// flushed before the error is returned.
    pub fn run_once(&mut self, wait: Duration) -> Result<Option<HostReport>> {
        let scheduler = Arc::clone(&self.scheduler);
        let Some(lease) = scheduler.acquire_timeout(wait) else {
            return Ok(None);
        };
        let host = lease.host().to_string();
        info!("crawling {}", host);

        let mut report = HostReport {
            host: host.clone(),
            ..Default::default()
        };
        let walked = self.walk_host(&host, &mut report);
        lease.release();

        if self.buffer.is_dirty() {
            let flushed = self.buffer.force_flush();
            report.tally(flushed);
        }
        walked?;
        Ok(Some(report))
    }

    /// Crawl until `stop` is set. The flag is checked between hosts only; the host list file
    /// is re-read there when it changed on disk.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        while !stop.load(Ordering::Relaxed) {
            match self.scheduler.reload_if_changed() {
                Ok(true) => debug!("worker {} sees updated host list", self.id),
                Ok(false) => {}
                Err(e) => warn!("host list reload failed: {}", e),
            }
            match self.run_once(IDLE_WAIT)? {
                Some(r) => info!(
                    "{}: {} file(s), {} flush(es), {} skipped dir(s), {} failed entr(ies), {} failed batch(es)",
                    r.host, r.files, r.flushes, r.skipped_dirs, r.failed_entries, r.failed_batches
                ),
                None => debug!("worker {}: no host free", self.id),
            }
        }
        debug!("worker {} stopping", self.id);
        Ok(())
    }

    /// Flush anything left and remove this crawler's scratch directory.
    pub fn shutdown(mut self) -> Result<()> {
        let flushed = self.buffer.force_flush();
        if let Err(e) = &flushed {
            error!("final flush failed: {}", e);
        }
        let (_catalog, detector) = self.buffer.into_sink().into_parts();
        detector.into_scratch().remove()?;
        flushed.map(|_| ())
    }
}

/// Everything a pool of crawler workers shares.
pub struct CrawlSetup {
    pub scheduler: Arc<HostScheduler>,
    pub ns: Arc<dyn RemoteNamespace>,
    pub db_path: PathBuf,
    pub passphrase: Option<String>,
    pub scratch_dir: PathBuf,
    pub capacity: usize,
    pub workers: usize,
    pub show_progress: bool,
}

fn worker_main(mut crawler: Crawler<SqliteCatalog>, stop: &AtomicBool) -> Result<()> {
    let ran = crawler.run(stop);
    if ran.is_err() {
        // A protocol violation on one worker ends the whole service.
        stop.store(true, Ordering::Relaxed);
    }
    let closed = crawler.shutdown();
    ran.and(closed)
}

/// Run `setup.workers` crawlers on their own threads until `stop` is set.
///
/// Each worker gets its own catalog connection and its own `worker-<id>` scratch
/// subdirectory. The first worker error is returned after all workers have stopped.
pub fn run_workers(setup: &CrawlSetup, stop: &AtomicBool) -> Result<()> {
    let root = ScratchDir::create(&setup.scratch_dir)?;
    let workers = setup.workers.max(1);

    let mut crawlers = Vec::with_capacity(workers);
    for id in 0..workers {
        let scratch = root.child(&format!("worker-{id}"))?;
        let catalog = SqliteCatalog::open(&setup.db_path, setup.passphrase.as_deref())?;
        crawlers.push(
            Crawler::new(
                id,
                Arc::clone(&setup.scheduler),
                Arc::clone(&setup.ns),
                catalog,
                scratch,
                setup.capacity,
            )
            .with_progress(setup.show_progress),
        );
    }
    info!("starting {} worker(s)", workers);

    let results: Vec<Result<()>> = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for crawler in crawlers {
            let name = format!("worker-{}", crawler.id());
            let spawned = thread::Builder::new()
                .name(name)
                .spawn_scoped(scope, move || worker_main(crawler, stop));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    error!("cannot spawn worker: {}", e);
                    stop.store(true, Ordering::Relaxed);
                }
            }
        }
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(CrawlError::CatalogState("worker panicked".to_string()))
                })
            })
            .collect()
    });

    let removed = root.remove();
    for r in results {
        r?;
    }
    removed
}
