//! Tagged error type for crawler operations.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Coarse category of a [`CrawlError`], for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input (empty name, malformed URL, invalid host).
    Validation,
    /// Remote listing/open/read failed.
    RemoteIo,
    /// Local filesystem failure (scratch dir, staged file, host list).
    LocalIo,
    /// Catalog store failure.
    Catalog,
    /// The remote reported something the walker does not understand.
    Protocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::RemoteIo => "remote_io",
            Self::LocalIo => "local_io",
            Self::Catalog => "catalog",
            Self::Protocol => "protocol",
        };
        write!(f, "{label}")
    }
}

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("remote I/O on {url}: {source}")]
    RemoteIo {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("local I/O on {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("host list {}: {source}", path.display())]
    HostList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("catalog state: {0}")]
    CatalogState(String),

    #[error("unknown entry kind {code} in listing of {url}")]
    Protocol { url: String, code: u32 },
}

impl CrawlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RemoteIo { .. } => ErrorKind::RemoteIo,
            Self::LocalIo { .. } | Self::HostList { .. } => ErrorKind::LocalIo,
            Self::Catalog(_) | Self::CatalogState(_) => ErrorKind::Catalog,
            Self::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    pub(crate) fn remote(url: impl Into<String>, source: io::Error) -> Self {
        Self::RemoteIo {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn local(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CrawlError>;
