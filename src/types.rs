//! Public and internal types for the crawler API and pipeline.

use std::fmt;
use std::path::PathBuf;

use crate::error::{CrawlError, Result};
use crate::utils::config::{DEFAULT_BUFFER_CAPACITY, PackagePaths};

/// Fully-qualified address of a remote file or directory: `<scheme>://<host>/<path...>`.
///
/// Immutable once built. The host segment is always non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscoveredPath(String);

impl DiscoveredPath {
    pub const SCHEME: &'static str = "smb";

    /// Root address of one host, e.g. `smb://fileserver`.
    pub fn host_root(host: &str) -> Self {
        Self(format!("{}://{}", Self::SCHEME, host))
    }

    /// Parse and validate an address. Trailing slashes are dropped.
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| CrawlError::Validation(format!("{url:?} has no scheme")))?;
        if scheme.is_empty() {
            return Err(CrawlError::Validation(format!("{url:?} has an empty scheme")));
        }
        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(CrawlError::Validation(format!("{url:?} has no host")));
        }
        Ok(Self(url.trim_end_matches('/').to_string()))
    }

    /// Child address `self + "/" + name`.
    pub fn join(&self, name: &str) -> Self {
        Self(format!("{}/{}", self.0, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn after_scheme(&self) -> &str {
        self.0
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.0)
    }

    pub fn scheme(&self) -> &str {
        self.0.split_once("://").map(|(s, _)| s).unwrap_or_default()
    }

    /// `"smb://some.server/path/to/file"` -> `"some.server"`.
    pub fn host(&self) -> &str {
        let rest = self.after_scheme();
        rest.split_once('/').map(|(h, _)| h).unwrap_or(rest)
    }

    /// `"smb://some.server/path/to/file"` -> `"path/to/file"`; empty for a host root.
    pub fn server_path(&self) -> &str {
        self.after_scheme()
            .split_once('/')
            .map(|(_, p)| p)
            .unwrap_or_default()
    }

    /// Last path segment (empty for a host root).
    pub fn file_name(&self) -> &str {
        let path = self.server_path();
        path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path)
    }

    /// Number of segments below the host (0 for the host root).
    pub fn depth(&self) -> usize {
        let path = self.server_path();
        if path.is_empty() {
            0
        } else {
            path.split('/').count()
        }
    }
}

impl fmt::Display for DiscoveredPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DiscoveredPath> for String {
    fn from(p: DiscoveredPath) -> Self {
        p.0
    }
}

/// Tag attached to each child in a remote directory listing.
///
/// Codes follow the SMB client library numbering; anything else is kept as [`EntryKind::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Workgroup,
    Server,
    FileShare,
    PrinterShare,
    CommsShare,
    IpcShare,
    Dir,
    File,
    Link,
    Unknown(u32),
}

impl EntryKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Workgroup,
            2 => Self::Server,
            3 => Self::FileShare,
            4 => Self::PrinterShare,
            5 => Self::CommsShare,
            6 => Self::IpcShare,
            7 => Self::Dir,
            8 => Self::File,
            9 => Self::Link,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Workgroup => 1,
            Self::Server => 2,
            Self::FileShare => 3,
            Self::PrinterShare => 4,
            Self::CommsShare => 5,
            Self::IpcShare => 6,
            Self::Dir => 7,
            Self::File => 8,
            Self::Link => 9,
            Self::Unknown(code) => *code,
        }
    }

    /// Kinds whose children are walked.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Workgroup | Self::Server | Self::FileShare | Self::Dir
        )
    }

    /// Kinds that are never visited nor recursed into.
    pub fn is_excluded(&self) -> bool {
        matches!(
            self,
            Self::PrinterShare | Self::CommsShare | Self::IpcShare | Self::Link
        )
    }
}

/// One child reported by a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteDirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl RemoteDirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// `.` and `..` carry no information and are never followed.
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Credentials handed to the remote session. The crawler only ever authenticates as guest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestCredentials {
    pub username: String,
    pub password: String,
    pub workgroup: String,
}

impl Default for GuestCredentials {
    fn default() -> Self {
        Self {
            username: "Guest".to_string(),
            password: String::new(),
            workgroup: String::new(),
        }
    }
}

/// Row written to the catalog for one discovered file, keyed by `(server, path)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogRecord {
    pub server: String,
    /// Server-relative path including the file name (`path/to/file`).
    pub path: String,
    /// Display name: last path segment with underscores turned into spaces.
    pub name: String,
    pub content_type: String,
    /// Unix seconds at upsert time.
    pub timestamp: i64,
}

/// Full options for a crawler run (CLI, settings file, lib callers).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Persisted host list, one hostname per line.
    pub hosts_file: PathBuf,
    /// Catalog name (SQLite database file).
    pub db_path: PathBuf,
    /// Catalog address, recorded for diagnostics only.
    pub db_server: Option<String>,
    /// Catalog user, recorded for diagnostics only.
    pub db_user: Option<String>,
    /// Protect the catalog with a password (SQLCipher key).
    pub encrypt: bool,
    /// Local directory where remote hosts are mounted as `<mount_root>/<host>/<share>/...`.
    pub mount_root: PathBuf,
    /// Scratch directory for staged file headers.
    pub scratch_dir: PathBuf,
    /// Result buffer capacity (paths per catalog transaction).
    pub buffer_capacity: usize,
    /// Number of crawler instances sharing one scheduler.
    pub workers: usize,
    /// Show progress and debug logs.
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        let paths = PackagePaths::get();
        Self {
            hosts_file: PathBuf::from(paths.hosts_filename()),
            db_path: PathBuf::from(paths.catalog_filename()),
            db_server: None,
            db_user: None,
            encrypt: false,
            mount_root: PathBuf::from(paths.mount_root()),
            scratch_dir: std::env::temp_dir().join(paths.scratch_dir_name()),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            workers: 1,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_host_and_path() {
        let p = DiscoveredPath::parse("smb://some.server/path/to/file").unwrap();
        assert_eq!(p.scheme(), "smb");
        assert_eq!(p.host(), "some.server");
        assert_eq!(p.server_path(), "path/to/file");
        assert_eq!(p.file_name(), "file");
        assert_eq!(p.depth(), 3);
    }

    #[test]
    fn host_root_has_no_server_path() {
        let p = DiscoveredPath::host_root("srv");
        assert_eq!(p.as_str(), "smb://srv");
        assert_eq!(p.host(), "srv");
        assert_eq!(p.server_path(), "");
        assert_eq!(p.file_name(), "");
        assert_eq!(p.depth(), 0);
    }

    #[test]
    fn parse_rejects_missing_host() {
        assert!(DiscoveredPath::parse("smb:///share").is_err());
        assert!(DiscoveredPath::parse("no-scheme/path").is_err());
    }

    #[test]
    fn join_appends_segment() {
        let p = DiscoveredPath::host_root("srv").join("share").join("a_b.txt");
        assert_eq!(p.as_str(), "smb://srv/share/a_b.txt");
        assert_eq!(p.file_name(), "a_b.txt");
    }

    #[test]
    fn entry_kind_codes() {
        assert_eq!(EntryKind::from_code(8), EntryKind::File);
        assert_eq!(EntryKind::from_code(77), EntryKind::Unknown(77));
        assert_eq!(EntryKind::Link.code(), 9);
        assert!(EntryKind::FileShare.is_container());
        assert!(EntryKind::IpcShare.is_excluded());
        assert!(!EntryKind::File.is_container());
    }
}
