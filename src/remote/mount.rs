//! Remote namespace backed by a local mount tree (`<root>/<host>/<share>/...`).

use log::{debug, warn};
use std::fs::{self, File, ReadDir};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::{DirListing, RemoteNamespace, is_a_directory};
use crate::error::{CrawlError, Result};
use crate::utils::config::DIR_CHUNK_ENTRIES;
use crate::{DiscoveredPath, EntryKind, GuestCredentials, RemoteDirEntry};

/// Serves `smb://host/share/path` from `<root>/host/share/path`, e.g. a CIFS automount tree
/// mounted with guest credentials.
pub struct MountNamespace {
    root: PathBuf,
    credentials: GuestCredentials,
    chunk_entries: usize,
}

impl MountNamespace {
    /// Open the session. The mount root must be an existing directory.
    pub fn open_session(root: impl Into<PathBuf>, credentials: GuestCredentials) -> Result<Self> {
        let root = root.into();
        let meta = fs::metadata(&root).map_err(|e| CrawlError::local(&root, e))?;
        if !meta.is_dir() {
            return Err(CrawlError::local(
                &root,
                io::Error::new(io::ErrorKind::NotADirectory, "mount root is not a directory"),
            ));
        }
        debug!(
            "session on {} as {:?} (workgroup {:?})",
            root.display(),
            credentials.username,
            credentials.workgroup
        );
        Ok(Self {
            root,
            credentials,
            chunk_entries: DIR_CHUNK_ENTRIES,
        })
    }

    pub fn with_chunk_entries(mut self, n: usize) -> Self {
        self.chunk_entries = n.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn credentials(&self) -> &GuestCredentials {
        &self.credentials
    }

    /// Local path for `url`. Rejects `.` and `..` in the host and path so a listing can
    /// never escape the mount root.
    fn local_path(&self, url: &DiscoveredPath) -> io::Result<PathBuf> {
        let mut path = self.root.clone();
        let segments = std::iter::once(url.host())
            .chain(url.server_path().split('/').filter(|s| !s.is_empty()));
        for seg in segments {
            if seg == ".." || seg == "." {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{url}: relative segment"),
                ));
            }
            path.push(seg);
        }
        Ok(path)
    }
}

struct MountListing {
    dir: PathBuf,
    iter: ReadDir,
    share_level: bool,
    chunk_entries: usize,
}

impl MountListing {
    fn classify(&self, entry: &fs::DirEntry) -> io::Result<Option<EntryKind>> {
        let ft = entry.file_type()?;
        let kind = if ft.is_symlink() {
            EntryKind::Link
        } else if ft.is_dir() {
            if !self.share_level {
                EntryKind::Dir
            } else if entry.file_name().eq_ignore_ascii_case("IPC$") {
                EntryKind::IpcShare
            } else {
                EntryKind::FileShare
            }
        } else if ft.is_file() {
            EntryKind::File
        } else {
            debug!("not reporting special file {}", entry.path().display());
            return Ok(None);
        };
        Ok(Some(kind))
    }
}

impl DirListing for MountListing {
    fn next_chunk(&mut self) -> io::Result<Vec<RemoteDirEntry>> {
        let mut chunk = Vec::with_capacity(self.chunk_entries);
        while chunk.len() < self.chunk_entries {
            let Some(entry) = self.iter.next() else {
                break;
            };
            let entry = entry?;
            // Emitted names must open again, so no lossy conversion.
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("skipping non-UTF-8 name {:?} in {}", raw, self.dir.display());
                    continue;
                }
            };
            if let Some(kind) = self.classify(&entry)? {
                chunk.push(RemoteDirEntry::new(name, kind));
            }
        }
        Ok(chunk)
    }
}

impl RemoteNamespace for MountNamespace {
    fn open_dir(&self, url: &DiscoveredPath) -> io::Result<Box<dyn DirListing + '_>> {
        let path = self.local_path(url)?;
        Ok(Box::new(MountListing {
            iter: fs::read_dir(&path)?,
            dir: path,
            share_level: url.depth() == 0,
            chunk_entries: self.chunk_entries,
        }))
    }

    fn open_file(&self, url: &DiscoveredPath) -> io::Result<Box<dyn Read + '_>> {
        let path = self.local_path(url)?;
        if fs::metadata(&path)?.is_dir() {
            return Err(is_a_directory(url));
        }
        Ok(Box::new(File::open(path)?))
    }
}
