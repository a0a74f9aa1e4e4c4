//! smbspider: standing crawler that catalogs every file on a set of SMB hosts.
//!
//! A [`HostScheduler`] hands hosts out in rotation; a [`TreeWalker`] turns each host's share
//! tree into a stream of [`DiscoveredPath`]s; a [`ResultBuffer`] batches them into the catalog
//! through a [`CatalogWriter`], which tags each file with a sniffed content type.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::{CatalogWriter, Crawler, HostReport, HostScheduler, SqliteCatalog};
pub use error::{CrawlError, ErrorKind, Result};
pub use pipeline::{ContentTypeDetector, ResultBuffer, TreeWalker};
pub use remote::{MemoryNamespace, MountNamespace, RemoteNamespace};
