//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived paths: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    hosts_filename: String,
    catalog_filename: String,
    scratch_dir_name: String,
    settings_filename: String,
    mount_root: String,
    key_env_var: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache paths from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                hosts_filename: format!("{pkg}.hosts"),
                catalog_filename: format!("{pkg}.db"),
                scratch_dir_name: format!("{pkg}-scratch"),
                settings_filename: format!("{pkg}.toml"),
                mount_root: format!("/mnt/{pkg}"),
                key_env_var: format!("{}_DB_KEY", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn hosts_filename(&self) -> &str {
        &self.hosts_filename
    }

    pub fn catalog_filename(&self) -> &str {
        &self.catalog_filename
    }

    pub fn scratch_dir_name(&self) -> &str {
        &self.scratch_dir_name
    }

    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }

    pub fn mount_root(&self) -> &str {
        &self.mount_root
    }

    pub fn key_env_var(&self) -> &str {
        &self.key_env_var
    }
}

// ---- Content-type detection ----

/// Bytes of each remote file staged locally for sniffing. 8 KB covers the magic offsets of
/// the common container/document formats.
pub const HEADER_SIZE: u64 = 8 * 1024;

/// Label for remote paths that turn out to be directories.
pub const DIRECTORY_CONTENT_TYPE: &str = "inode/directory";

/// Label when detection fails for any reason.
pub const UNKNOWN_CONTENT_TYPE: &str = "unknown";

/// Name of the single catalog attribute the crawler maintains.
pub const CONTENT_TYPE_ATTRIBUTE: &str = "content-type";

// ---- Remote listing ----

/// Entries returned per directory-listing chunk.
pub const DIR_CHUNK_ENTRIES: usize = 64;

// ---- Buffering ----

/// Default result buffer capacity (paths per catalog transaction).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

// ---- Scheduling ----

/// How long an idle worker waits for a free host before rechecking the stop flag.
pub const IDLE_WAIT: Duration = Duration::from_secs(5);

// ---- Progress ----

/// Files discovered between progress bar updates (reduce lock contention).
pub const PROGRESS_UPDATE_BATCH_SIZE: usize = 100;

// ---- Permissions ----

/// rwxr--r-- for the scratch directory and staged headers.
pub const SCRATCH_MODE: u32 = 0o744;
