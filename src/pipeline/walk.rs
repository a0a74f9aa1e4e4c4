//! Depth-first walk over a remote share tree.
//!
//! The walk keeps an explicit stack of open directory frames instead of recursing, so stack
//! usage does not grow with the remote tree's depth. Each frame holds the entries of one
//! directory listing; entries are dispatched in listing order and a container child is pushed
//! (and fully walked) before its next sibling, which is the same visit order as recursion.

use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{CrawlError, Result};
use crate::remote::RemoteNamespace;
use crate::{DiscoveredPath, EntryKind, RemoteDirEntry};

/// One result from a walk: a discovered file, or a directory whose subtree was cut short.
#[derive(Debug, PartialEq, Eq)]
pub enum WalkOutcome {
    File(DiscoveredPath),
    Skipped { url: DiscoveredPath, msg: String },
}

/// Totals for one walk.
#[derive(Debug, Default)]
pub struct WalkSummary {
    pub files: usize,
    pub dirs: usize,
    pub skipped: Vec<(DiscoveredPath, String)>,
}

/// Entries of one directory. `error` is set when a chunk read failed part-way; entries from
/// earlier chunks are still walked.
struct Listing {
    entries: Vec<RemoteDirEntry>,
    error: Option<CrawlError>,
}

fn read_listing(ns: &dyn RemoteNamespace, url: &DiscoveredPath) -> Result<Listing> {
    let mut listing = ns
        .open_dir(url)
        .map_err(|e| CrawlError::remote(url.as_str(), e))?;
    let mut entries = Vec::new();
    loop {
        match listing.next_chunk() {
            Ok(chunk) if chunk.is_empty() => break,
            Ok(chunk) => entries.extend(chunk),
            Err(e) => {
                return Ok(Listing {
                    entries,
                    error: Some(CrawlError::remote(url.as_str(), e)),
                });
            }
        }
    }
    Ok(Listing {
        entries,
        error: None,
    })
}

struct Frame {
    dir: DiscoveredPath,
    entries: std::vec::IntoIter<RemoteDirEntry>,
}

/// Iterator over [`WalkOutcome`]s. Yields `Err` once (then ends) on an unknown entry kind.
pub struct Walk<'a> {
    ns: &'a dyn RemoteNamespace,
    stack: Vec<Frame>,
    pending: VecDeque<WalkOutcome>,
    dirs_listed: usize,
    aborted: bool,
}

impl<'a> Walk<'a> {
    fn new(ns: &'a dyn RemoteNamespace, root: &DiscoveredPath) -> Result<Self> {
        let mut walk = Walk {
            ns,
            stack: Vec::new(),
            pending: VecDeque::new(),
            dirs_listed: 0,
            aborted: false,
        };
        let listing = read_listing(ns, root)?;
        walk.push_frame(root.clone(), listing);
        Ok(walk)
    }

    /// Directories whose listing was opened, root included.
    pub fn dirs_listed(&self) -> usize {
        self.dirs_listed
    }

    fn push_frame(&mut self, dir: DiscoveredPath, listing: Listing) {
        self.dirs_listed += 1;
        if let Some(e) = listing.error {
            self.pending.push_back(WalkOutcome::Skipped {
                url: dir.clone(),
                msg: e.to_string(),
            });
        }
        self.stack.push(Frame {
            dir,
            entries: listing.entries.into_iter(),
        });
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<WalkOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.aborted {
            return None;
        }
        loop {
            if let Some(outcome) = self.pending.pop_front() {
                return Some(Ok(outcome));
            }
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            if entry.is_dot() {
                continue;
            }
            let child = frame.dir.join(&entry.name);
            match entry.kind {
                EntryKind::Workgroup
                | EntryKind::Server
                | EntryKind::FileShare
                | EntryKind::Dir => match read_listing(self.ns, &child) {
                    Ok(listing) => self.push_frame(child, listing),
                    Err(e) => {
                        self.pending.push_back(WalkOutcome::Skipped {
                            url: child,
                            msg: e.to_string(),
                        });
                    }
                },
                EntryKind::File => return Some(Ok(WalkOutcome::File(child))),
                EntryKind::PrinterShare
                | EntryKind::CommsShare
                | EntryKind::IpcShare
                | EntryKind::Link => {
                    debug!("not following {:?} {}", entry.kind, child);
                }
                EntryKind::Unknown(code) => {
                    self.aborted = true;
                    return Some(Err(CrawlError::Protocol {
                        url: child.to_string(),
                        code,
                    }));
                }
            }
        }
    }
}

/// Walks remote trees through a [`RemoteNamespace`].
#[derive(Clone)]
pub struct TreeWalker {
    ns: Arc<dyn RemoteNamespace>,
}

impl TreeWalker {
    pub fn new(ns: Arc<dyn RemoteNamespace>) -> Self {
        Self { ns }
    }

    pub fn namespace(&self) -> &Arc<dyn RemoteNamespace> {
        &self.ns
    }

    /// Lazily walk everything under `root`. Fails only if `root` itself cannot be listed.
    pub fn iter(&self, root: &DiscoveredPath) -> Result<Walk<'_>> {
        Walk::new(self.ns.as_ref(), root)
    }

    /// Walk `root`, calling `on_file` once per regular file in depth-first order.
    ///
    /// Listing failures below the root prune that subtree only; they are logged and returned
    /// in [`WalkSummary::skipped`]. An unknown entry kind aborts the whole walk.
    pub fn walk<F>(&self, root: &DiscoveredPath, mut on_file: F) -> Result<WalkSummary>
    where
        F: FnMut(DiscoveredPath),
    {
        let mut summary = WalkSummary::default();
        let mut walk = self.iter(root)?;
        for outcome in walk.by_ref() {
            match outcome? {
                WalkOutcome::File(path) => {
                    summary.files += 1;
                    on_file(path);
                }
                WalkOutcome::Skipped { url, msg } => {
                    warn!("skipping subtree {}: {}", url, msg);
                    summary.skipped.push((url, msg));
                }
            }
        }
        summary.dirs = walk.dirs_listed();
        Ok(summary)
    }

    /// Immediate files and walkable directories of `dir` (no recursion).
    pub fn list_children(&self, dir: &DiscoveredPath) -> Result<Vec<DiscoveredPath>> {
        let listing = read_listing(self.ns.as_ref(), dir)?;
        if let Some(e) = listing.error {
            return Err(e);
        }
        let mut out = Vec::new();
        for entry in listing.entries {
            if entry.is_dot() || entry.kind.is_excluded() {
                continue;
            }
            if let EntryKind::Unknown(code) = entry.kind {
                return Err(CrawlError::Protocol {
                    url: dir.join(&entry.name).to_string(),
                    code,
                });
            }
            out.push(dir.join(&entry.name));
        }
        Ok(out)
    }
}
