//! Round-robin host rotation over a persisted, editable host list.
//!
//! The list lives in a plain text file (one host per line). Every add/remove rewrites the
//! file and then updates memory under the same lock, so the two never disagree. Workers take
//! a [`HostLease`] for the duration of one walk; a leased host is not handed to anyone else.

use log::{debug, info, warn};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use crate::engine::tools::{file_mtime, validate_host};
use crate::error::{CrawlError, Result};
use crate::utils::write_atomic;

/// Parse host-list text: lines trimmed, blank lines ignored, duplicates collapsed (first wins).
pub fn parse_host_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match validate_host(line) {
            Ok(host) => {
                if seen.insert(host.clone()) {
                    hosts.push(host);
                }
            }
            Err(e) => warn!("ignoring host list line {:?}: {}", line, e),
        }
    }
    hosts
}

fn render_host_list(hosts: &[String]) -> String {
    let mut out = String::new();
    for h in hosts {
        out.push_str(h);
        out.push('\n');
    }
    out
}

fn read_host_file(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_host_list(&text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("host list {} does not exist yet", path.display());
            Ok(Vec::new())
        }
        Err(source) => Err(CrawlError::HostList {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[derive(Default)]
struct State {
    hosts: Vec<String>,
    leased: HashSet<String>,
    /// Hosts still due in the current rotation. Refilled from `hosts` only when drained.
    rotation: VecDeque<String>,
    file_mtime: Option<SystemTime>,
}

impl State {
    /// Next host of the current rotation that is still listed and not leased. Starts one new
    /// rotation at most.
    fn pick(&mut self) -> Option<String> {
        for _ in 0..2 {
            if self.rotation.is_empty() {
                self.rotation = self.hosts.iter().cloned().collect();
            }
            while let Some(host) = self.rotation.pop_front() {
                if self.leased.contains(&host) || !self.hosts.contains(&host) {
                    continue;
                }
                return Some(host);
            }
        }
        None
    }
}

/// Shared host rotation. Safe to use from several crawler threads at once.
pub struct HostScheduler {
    file: PathBuf,
    state: Mutex<State>,
    freed: Condvar,
}

impl HostScheduler {
    /// Load the host list from `file`. A missing file is an empty list.
    pub fn load(file: impl Into<PathBuf>) -> Result<Self> {
        let file = file.into();
        let hosts = read_host_file(&file)?;
        info!("{} host(s) loaded from {}", hosts.len(), file.display());
        let state = State {
            hosts,
            file_mtime: file_mtime(&file),
            ..Default::default()
        };
        Ok(Self {
            file,
            state: Mutex::new(state),
            freed: Condvar::new(),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Snapshot of the current host set, in list order.
    pub fn hosts(&self) -> Vec<String> {
        self.state().hosts.clone()
    }

    pub fn len(&self) -> usize {
        self.state().hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().hosts.is_empty()
    }

    /// Hosts currently leased to a walk.
    pub fn leased(&self) -> Vec<String> {
        let mut v: Vec<_> = self.state().leased.iter().cloned().collect();
        v.sort();
        v
    }

    /// Next free host, or `None` right away if every host is leased (or there are none).
    pub fn try_acquire(&self) -> Option<HostLease<'_>> {
        let mut state = self.state();
        let host = state.pick()?;
        state.leased.insert(host.clone());
        debug!("leased {}", host);
        Some(HostLease {
            scheduler: self,
            host: Some(host),
        })
    }

    /// Wait up to `timeout` for a host to become free.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<HostLease<'_>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            if let Some(host) = state.pick() {
                state.leased.insert(host.clone());
                debug!("leased {}", host);
                return Some(HostLease {
                    scheduler: self,
                    host: Some(host),
                });
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return None;
            }
            state = self
                .freed
                .wait_timeout(state, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Return a leased host to the rotation. Releasing a host that is not leased is a no-op.
    pub fn release(&self, host: &str) {
        let mut state = self.state();
        if state.leased.remove(host) {
            debug!("released {}", host);
            self.freed.notify_all();
        }
    }

    /// Append `name` to the list (file first, then memory). `Ok(false)` if already present.
    /// The new host is offered from the next rotation on.
    pub fn add_host(&self, name: &str) -> Result<bool> {
        let host = validate_host(name)?;
        let mut state = self.state();
        if state.hosts.contains(&host) {
            return Ok(false);
        }
        let mut next = state.hosts.clone();
        next.push(host.clone());
        self.persist(&mut state, next)?;
        info!("added host {}", host);
        self.freed.notify_all();
        Ok(true)
    }

    /// Drop `name` from the list (file first, then memory). `Ok(false)` if it was not listed.
    /// A walk already holding it finishes; it is never offered again.
    pub fn remove_host(&self, name: &str) -> Result<bool> {
        let host = validate_host(name)?;
        let mut state = self.state();
        if !state.hosts.contains(&host) {
            return Ok(false);
        }
        let next: Vec<String> = state.hosts.iter().filter(|h| **h != host).cloned().collect();
        self.persist(&mut state, next)?;
        state.rotation.retain(|h| *h != host);
        info!("removed host {}", host);
        Ok(true)
    }

    /// Re-read the backing file, e.g. after another process edited it.
    pub fn reload(&self) -> Result<()> {
        let hosts = read_host_file(&self.file)?;
        let mut state = self.state();
        info!("host list reloaded: {} host(s)", hosts.len());
        state.hosts = hosts;
        state.file_mtime = file_mtime(&self.file);
        self.freed.notify_all();
        Ok(())
    }

    /// Reload if the backing file's modification time moved since the last read or write.
    pub fn reload_if_changed(&self) -> Result<bool> {
        let now = file_mtime(&self.file);
        if now == self.state().file_mtime {
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    fn persist(&self, state: &mut State, hosts: Vec<String>) -> Result<()> {
        write_atomic(&self.file, &render_host_list(&hosts)).map_err(|source| {
            CrawlError::HostList {
                path: self.file.clone(),
                source,
            }
        })?;
        state.hosts = hosts;
        state.file_mtime = file_mtime(&self.file);
        Ok(())
    }
}

/// A host handed out by [`HostScheduler`]; released when dropped.
pub struct HostLease<'a> {
    scheduler: &'a HostScheduler,
    host: Option<String>,
}

impl HostLease<'_> {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or_default()
    }

    /// Release now instead of at drop.
    pub fn release(mut self) {
        if let Some(host) = self.host.take() {
            self.scheduler.release(&host);
        }
    }
}

impl Drop for HostLease<'_> {
    fn drop(&mut self) {
        if let Some(host) = self.host.take() {
            self.scheduler.release(&host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler_with(text: &str) -> (tempfile::TempDir, HostScheduler) {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("hosts");
        std::fs::write(&file, text).unwrap();
        let s = HostScheduler::load(&file).unwrap();
        (tmp, s)
    }

    fn next(s: &HostScheduler) -> String {
        let lease = s.try_acquire().unwrap();
        lease.host().to_string()
    }

    #[test]
    fn load_dedupes_and_skips_blank_lines() {
        let (_tmp, s) = scheduler_with("test.server\nanother.test.server\n\ntest.server\n");
        assert_eq!(s.hosts(), vec!["test.server", "another.test.server"]);
    }

    #[test]
    fn rotation_is_round_robin() {
        let (_tmp, s) = scheduler_with("a\nb\nc\n");
        let order: Vec<String> = (0..6).map(|_| next(&s)).collect();
        assert_eq!(order, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn leased_host_is_not_handed_out_twice() {
        let (_tmp, s) = scheduler_with("a\nb\n");
        let first = s.try_acquire().unwrap();
        let second = s.try_acquire().unwrap();
        assert_ne!(first.host(), second.host());
        assert!(s.try_acquire().is_none());
        drop(first);
        assert!(s.try_acquire().is_some());
    }

    #[test]
    fn added_host_joins_next_rotation() {
        let (_tmp, s) = scheduler_with("a\nb\n");
        assert_eq!(next(&s), "a");
        assert!(s.add_host("c").unwrap());
        assert!(!s.add_host("c").unwrap());
        assert_eq!(next(&s), "b");
        assert_eq!(next(&s), "a");
        assert_eq!(next(&s), "b");
        assert_eq!(next(&s), "c");
    }

    #[test]
    fn add_then_remove_is_never_yielded() {
        let (_tmp, s) = scheduler_with("a\n");
        s.add_host("x").unwrap();
        s.remove_host("x").unwrap();
        for _ in 0..4 {
            assert_eq!(next(&s), "a");
        }
    }

    #[test]
    fn removing_leased_host_lets_walk_finish() {
        let (_tmp, s) = scheduler_with("a\nx\n");
        let _a = s.try_acquire().unwrap();
        let x = s.try_acquire().unwrap();
        assert_eq!(x.host(), "x");
        assert!(s.remove_host("x").unwrap());
        assert_eq!(x.host(), "x");
        x.release();
        drop(_a);
        for _ in 0..3 {
            assert_eq!(next(&s), "a");
        }
        assert!(s.leased().is_empty());
    }

    #[test]
    fn edits_are_written_through() {
        let (tmp, s) = scheduler_with("a\n");
        s.add_host("b").unwrap();
        s.remove_host("a").unwrap();
        let text = std::fs::read_to_string(tmp.path().join("hosts")).unwrap();
        assert_eq!(text, "b\n");
        let reloaded = HostScheduler::load(tmp.path().join("hosts")).unwrap();
        assert_eq!(reloaded.hosts(), vec!["b"]);
    }

    #[test]
    fn failed_write_leaves_memory_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("missing-dir").join("hosts");
        let s = HostScheduler::load(&file).unwrap();
        assert!(s.add_host("a").is_err());
        assert!(s.hosts().is_empty());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let (_tmp, s) = scheduler_with("");
        assert!(s.add_host("").is_err());
        assert!(s.add_host("two words").is_err());
        assert!(s.add_host("..").is_err());
        assert!(s.hosts().is_empty());
    }

    #[test]
    fn relative_names_in_file_are_skipped() {
        let (_tmp, s) = scheduler_with("..
srv
.
");
        assert_eq!(s.hosts(), vec!["srv"]);
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let (tmp, s) = scheduler_with("a\n");
        std::fs::write(tmp.path().join("hosts"), "a\nb\n").unwrap();
        s.reload().unwrap();
        assert_eq!(s.hosts(), vec!["a", "b"]);
    }

    #[test]
    fn acquire_timeout_waits_for_release() {
        let (_tmp, s) = scheduler_with("only\n");
        let held = s.try_acquire().unwrap();
        assert!(s.acquire_timeout(Duration::from_millis(20)).is_none());
        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(30));
                drop(held);
            });
            let lease = s.acquire_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(lease.host(), "only");
        });
    }
}
