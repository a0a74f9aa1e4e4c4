//! In-process remote namespace: a tree of directories and byte files keyed by URL.
//!
//! Listings start with `.` and `..` like the real protocol, are served in fixed-size chunks,
//! and can be told to fail (at open or after N chunks) to exercise error paths.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{DirListing, RemoteNamespace, is_a_directory};
use crate::{DiscoveredPath, EntryKind, RemoteDirEntry};

enum Node {
    Dir(Vec<RemoteDirEntry>),
    File(Vec<u8>),
}

/// Test fixture for walker and crawl tests; not reachable from the CLI. Builder methods
/// panic on malformed URLs.
pub struct MemoryNamespace {
    nodes: BTreeMap<String, Node>,
    chunk_size: usize,
    /// url -> number of chunks served before the listing errors (0 = fail at open).
    listing_failures: HashMap<String, usize>,
    dir_opens: AtomicUsize,
    file_opens: AtomicUsize,
}

impl Default for MemoryNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNamespace {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            chunk_size: 2,
            listing_failures: HashMap::new(),
            dir_opens: AtomicUsize::new(0),
            file_opens: AtomicUsize::new(0),
        }
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    fn parse(url: &str) -> DiscoveredPath {
        DiscoveredPath::parse(url).unwrap_or_else(|_| panic!("bad test url {url:?}"))
    }

    /// Create `url` as a directory, along with its ancestors. Ancestors one level below the
    /// host are shares, deeper ones plain directories.
    pub fn add_dir(&mut self, url: &str) -> &mut Self {
        let url = Self::parse(url);
        self.ensure_dir(&url);
        self
    }

    /// Create a regular file with `contents`, creating parent directories as needed.
    pub fn add_file(&mut self, url: &str, contents: &[u8]) -> &mut Self {
        let url = Self::parse(url);
        let parent = Self::parent_of(&url);
        self.ensure_dir(&parent);
        self.push_entry(&parent, RemoteDirEntry::new(url.file_name(), EntryKind::File));
        self.nodes
            .insert(url.as_str().to_string(), Node::File(contents.to_vec()));
        self
    }

    /// Add a raw listing entry (printer share, link, unknown code...) with no backing node.
    pub fn add_entry(&mut self, parent: &str, name: &str, kind: EntryKind) -> &mut Self {
        let parent = Self::parse(parent);
        self.ensure_dir(&parent);
        self.push_entry(&parent, RemoteDirEntry::new(name, kind));
        self
    }

    /// Make listing `url` fail after serving `after_chunks` chunks (0 = fail at open).
    pub fn fail_listing(&mut self, url: &str, after_chunks: usize) -> &mut Self {
        self.listing_failures
            .insert(url.trim_end_matches('/').to_string(), after_chunks);
        self
    }

    pub fn dir_opens(&self) -> usize {
        self.dir_opens.load(Ordering::Relaxed)
    }

    pub fn file_opens(&self) -> usize {
        self.file_opens.load(Ordering::Relaxed)
    }

    fn parent_of(url: &DiscoveredPath) -> DiscoveredPath {
        match url.as_str().rsplit_once('/') {
            Some((parent, _)) if url.depth() > 0 => Self::parse(parent),
            _ => url.clone(),
        }
    }

    fn ensure_dir(&mut self, url: &DiscoveredPath) {
        if self.nodes.contains_key(url.as_str()) {
            return;
        }
        let dot = vec![
            RemoteDirEntry::new(".", EntryKind::Dir),
            RemoteDirEntry::new("..", EntryKind::Dir),
        ];
        self.nodes.insert(url.as_str().to_string(), Node::Dir(dot));
        if url.depth() == 0 {
            return;
        }
        let parent = Self::parent_of(url);
        self.ensure_dir(&parent);
        let kind = if url.depth() == 1 {
            EntryKind::FileShare
        } else {
            EntryKind::Dir
        };
        self.push_entry(&parent, RemoteDirEntry::new(url.file_name(), kind));
    }

    fn push_entry(&mut self, parent: &DiscoveredPath, entry: RemoteDirEntry) {
        if let Some(Node::Dir(entries)) = self.nodes.get_mut(parent.as_str())
            && !entries.contains(&entry)
        {
            entries.push(entry);
        }
    }
}

struct MemoryListing {
    entries: Vec<RemoteDirEntry>,
    pos: usize,
    chunk_size: usize,
    served: usize,
    fail_after: Option<usize>,
}

impl DirListing for MemoryListing {
    fn next_chunk(&mut self) -> io::Result<Vec<RemoteDirEntry>> {
        if self.fail_after.is_some_and(|n| self.served >= n) {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "listing dropped"));
        }
        let end = (self.pos + self.chunk_size).min(self.entries.len());
        let chunk = self.entries[self.pos..end].to_vec();
        self.pos = end;
        self.served += 1;
        Ok(chunk)
    }
}

impl RemoteNamespace for MemoryNamespace {
    fn open_dir(&self, url: &DiscoveredPath) -> io::Result<Box<dyn DirListing + '_>> {
        self.dir_opens.fetch_add(1, Ordering::Relaxed);
        let fail_after = self.listing_failures.get(url.as_str()).copied();
        if fail_after == Some(0) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, url.to_string()));
        }
        match self.nodes.get(url.as_str()) {
            Some(Node::Dir(entries)) => Ok(Box::new(MemoryListing {
                entries: entries.clone(),
                pos: 0,
                chunk_size: self.chunk_size,
                served: 0,
                fail_after,
            })),
            Some(Node::File(_)) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                url.to_string(),
            )),
            None => Err(io::Error::new(io::ErrorKind::NotFound, url.to_string())),
        }
    }

    fn open_file(&self, url: &DiscoveredPath) -> io::Result<Box<dyn Read + '_>> {
        self.file_opens.fetch_add(1, Ordering::Relaxed);
        match self.nodes.get(url.as_str()) {
            Some(Node::File(bytes)) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            Some(Node::Dir(_)) => Err(is_a_directory(url)),
            None => Err(io::Error::new(io::ErrorKind::NotFound, url.to_string())),
        }
    }
}
