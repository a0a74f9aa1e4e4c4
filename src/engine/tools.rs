//! Name and path helpers for catalog records and host files.

use std::path::Path;
use std::time::SystemTime;

use crate::DiscoveredPath;
use crate::error::{CrawlError, Result};

/// Display form of a remote file name: every `_` becomes a space.
///
/// `"some_short_string"` -> `"some short string"`. An empty name is an input error.
pub fn normalize_display_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(CrawlError::Validation("empty file name".to_string()));
    }
    Ok(name.replace('_', " "))
}

/// Split a discovered path into `(server_relative_path, display_name)` at the last separator.
pub fn split_server_path(path: &DiscoveredPath) -> Result<(String, String)> {
    let server_path = path.server_path();
    if server_path.is_empty() {
        return Err(CrawlError::Validation(format!("{path} names a host, not a file")));
    }
    let name = normalize_display_name(path.file_name())?;
    Ok((server_path.to_string(), name))
}

/// Host names go into a line-oriented file and into URLs: no separators, no whitespace.
pub fn validate_host(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CrawlError::Validation("empty host name".to_string()));
    }
    if name == "."
        || name == ".."
        || name.contains('/')
        || name.chars().any(char::is_whitespace)
    {
        return Err(CrawlError::Validation(format!("invalid host name {name:?}")));
    }
    Ok(name.to_string())
}

/// Modification time of `path`, `None` if it cannot be read.
pub fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Seconds since the Unix epoch; 0 if the clock is before it.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// True if the process is running with effective uid 0 (e.g. via sudo).
#[cfg(unix)]
pub fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscores_become_spaces() {
        assert_eq!(
            normalize_display_name("some_short_string").unwrap(),
            "some short string"
        );
        assert_eq!(normalize_display_name("__").unwrap(), "  ");
        assert_eq!(normalize_display_name("plain").unwrap(), "plain");
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = normalize_display_name("").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn split_uses_last_separator() {
        let p = DiscoveredPath::parse("smb://srv/path/to/my_file1").unwrap();
        let (path, name) = split_server_path(&p).unwrap();
        assert_eq!(path, "path/to/my_file1");
        assert_eq!(name, "my file1");
        assert!(split_server_path(&DiscoveredPath::host_root("srv")).is_err());
    }

    #[test]
    fn host_validation() {
        assert_eq!(validate_host("  test.server ").unwrap(), "test.server");
        assert!(validate_host("").is_err());
        assert!(validate_host("a b").is_err());
        assert!(validate_host("a/b").is_err());
        assert!(validate_host("..").is_err());
        assert!(validate_host(" . ").is_err());
        assert_eq!(validate_host("..srv").unwrap(), "..srv");
    }
}
