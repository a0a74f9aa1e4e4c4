//! Remote namespace primitives the crawler consumes.
//!
//! The wire protocol itself lives outside this crate. A [`RemoteNamespace`] hands out chunked,
//! kind-tagged directory listings and readable file handles; handles close on drop.
//! [`mount::MountNamespace`] serves hosts mounted under a local directory, and
//! [`memory::MemoryNamespace`] is an in-process tree used by the tests.

use std::io::{self, Read};

use crate::{DiscoveredPath, RemoteDirEntry};

pub mod memory;
pub mod mount;

pub use memory::MemoryNamespace;
pub use mount::MountNamespace;

/// An open directory listing.
pub trait DirListing {
    /// Next batch of entries. An empty batch marks end-of-directory.
    fn next_chunk(&mut self) -> io::Result<Vec<RemoteDirEntry>>;
}

/// Listing and read access to a remote share tree.
pub trait RemoteNamespace: Send + Sync {
    fn open_dir(&self, url: &DiscoveredPath) -> io::Result<Box<dyn DirListing + '_>>;

    /// Open a file for reading. Opening a directory fails with [`io::ErrorKind::IsADirectory`].
    fn open_file(&self, url: &DiscoveredPath) -> io::Result<Box<dyn Read + '_>>;
}

/// Error returned when a directory is opened as a file.
pub fn is_a_directory(url: &DiscoveredPath) -> io::Error {
    io::Error::new(io::ErrorKind::IsADirectory, url.to_string())
}
