//! Scratch directory lifecycle and atomic whole-file rewrites.

use log::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::DiscoveredPath;
use crate::error::{CrawlError, Result};
use crate::utils::config::SCRATCH_MODE;

/// Sibling temp path used while rewriting `path` (`<name>.tmp`).
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rewrite".to_string());
    path.parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.tmp"))
}

/// Replace `path` with `contents` by writing a sibling temp file and renaming it over the target.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, contents)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Write one path per line to `file`.
pub fn dump_paths(file: &Path, paths: &[DiscoveredPath]) -> Result<()> {
    let mut out = String::new();
    for p in paths {
        out.push_str(p.as_str());
        out.push('\n');
    }
    write_atomic(file, &out).map_err(|e| CrawlError::local(file, e))
}

#[cfg(unix)]
fn create_dir_with_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
    fs::DirBuilder::new().mode(SCRATCH_MODE).create(path)?;
    // DirBuilder honours the umask; pin the exact mode.
    fs::set_permissions(path, fs::Permissions::from_mode(SCRATCH_MODE))
}

#[cfg(not(unix))]
fn create_dir_with_mode(path: &Path) -> io::Result<()> {
    fs::create_dir(path)
}

/// Process-owned directory holding staged file headers.
///
/// Created at crawler construction (an existing empty directory is adopted), removed by
/// [`ScratchDir::remove`] at shutdown. It must be empty at both points: leftovers mean an
/// earlier detection aborted mid-way and are reported as errors.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match create_dir_with_mode(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !path.is_dir() {
                    return Err(CrawlError::local(&path, e));
                }
                let leftovers = list_dir(&path).map_err(|e| CrawlError::local(&path, e))?;
                if !leftovers.is_empty() {
                    return Err(CrawlError::local(
                        &path,
                        io::Error::new(
                            io::ErrorKind::DirectoryNotEmpty,
                            format!("{} leftover staged file(s)", leftovers.len()),
                        ),
                    ));
                }
            }
            Err(e) => return Err(CrawlError::local(&path, e)),
        }
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Child scratch directory (one per worker) with the same lifecycle rules.
    pub fn child(&self, name: &str) -> Result<ScratchDir> {
        ScratchDir::create(self.path.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a staged header for a remote file named `name` lives.
    pub fn stage_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Entries currently in the directory.
    pub fn leftovers(&self) -> io::Result<Vec<PathBuf>> {
        list_dir(&self.path)
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.leftovers()?.is_empty())
    }

    /// Remove the directory. Fails (and leaves it in place) when anything is still inside.
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        fs::remove_dir(&self.path).map_err(|e| CrawlError::local(&self.path, e))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.removed
            && let Err(e) = fs::remove_dir(&self.path)
        {
            warn!("scratch dir {} not removed: {}", self.path.display(), e);
        }
    }
}

fn list_dir(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(path)? {
        out.push(entry?.path());
    }
    Ok(out)
}
