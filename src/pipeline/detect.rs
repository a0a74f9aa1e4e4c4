//! Content-type detection for remote files.
//!
//! The sniffer only inspects local files, so a bounded header of the remote file is staged
//! into the scratch directory under the remote file's own name, inspected, and deleted again.
//! Detection never fails outright: any error degrades to [`UNKNOWN_CONTENT_TYPE`].

use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::DiscoveredPath;
use crate::error::{CrawlError, Result};
use crate::remote::RemoteNamespace;
use crate::utils::ScratchDir;
use crate::utils::config::{
    DIRECTORY_CONTENT_TYPE, HEADER_SIZE, SCRATCH_MODE, UNKNOWN_CONTENT_TYPE,
};

/// Magic-byte inspection of a local file, positioned at offset 0.
pub trait Sniffer: Send + Sync {
    fn sniff(&self, staged: &mut File) -> io::Result<String>;
}

/// [`Sniffer`] backed by the `infer` signature table, with a text/binary fallback for
/// content that has no signature.
pub struct InferSniffer {
    infer: infer::Infer,
}

impl Default for InferSniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl InferSniffer {
    pub fn new() -> Self {
        Self {
            infer: infer::Infer::new(),
        }
    }

    pub fn sniff_bytes(&self, buf: &[u8]) -> String {
        if buf.is_empty() {
            return "application/x-empty".to_string();
        }
        if let Some(t) = self.infer.get(buf) {
            return t.mime_type().to_string();
        }
        if looks_like_text(buf) {
            "text/plain".to_string()
        } else {
            "application/octet-stream".to_string()
        }
    }
}

/// No NULs and valid UTF-8, allowing a multi-byte sequence cut off by the header bound.
fn looks_like_text(buf: &[u8]) -> bool {
    if buf.contains(&0) {
        return false;
    }
    match std::str::from_utf8(buf) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

impl Sniffer for InferSniffer {
    fn sniff(&self, staged: &mut File) -> io::Result<String> {
        let mut buf = Vec::new();
        staged.take(HEADER_SIZE).read_to_end(&mut buf)?;
        Ok(self.sniff_bytes(&buf))
    }
}

/// Anything that can label a discovered path with a content type.
pub trait DetectContentType {
    fn detect(&self, path: &DiscoveredPath) -> String;
}

/// A staged header file, deleted when dropped.
struct StagedFile {
    path: PathBuf,
    file: File,
}

impl StagedFile {
    fn create(path: PathBuf) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.read(true).write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(SCRATCH_MODE);
        }
        let file = opts.open(&path).map_err(|e| CrawlError::local(&path, e))?;
        Ok(Self { path, file })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("staged header {} not removed: {}", self.path.display(), e);
        }
    }
}

/// Stages remote headers into a [`ScratchDir`] owned by this detector and sniffs them.
///
/// One detector stages one file at a time; concurrent crawler workers each own a detector
/// with its own scratch directory, so equal file names never collide.
pub struct ContentTypeDetector {
    ns: Arc<dyn RemoteNamespace>,
    scratch: ScratchDir,
    sniffer: Box<dyn Sniffer>,
}

impl ContentTypeDetector {
    pub fn new(ns: Arc<dyn RemoteNamespace>, scratch: ScratchDir) -> Self {
        Self::with_sniffer(ns, scratch, Box::new(InferSniffer::new()))
    }

    pub fn with_sniffer(
        ns: Arc<dyn RemoteNamespace>,
        scratch: ScratchDir,
        sniffer: Box<dyn Sniffer>,
    ) -> Self {
        Self {
            ns,
            scratch,
            sniffer,
        }
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Give back the scratch directory for removal at shutdown.
    pub fn into_scratch(self) -> ScratchDir {
        self.scratch
    }

    /// Detection with the failure cause kept, for callers that care why.
    pub fn try_detect(&self, path: &DiscoveredPath) -> Result<String> {
        let mut remote = match self.ns.open_file(path) {
            Ok(r) => r,
            Err(e) if e.kind() == io::ErrorKind::IsADirectory => {
                return Ok(DIRECTORY_CONTENT_TYPE.to_string());
            }
            Err(e) => return Err(CrawlError::remote(path.as_str(), e)),
        };

        let name = path.file_name();
        if name.is_empty() || name == "." || name == ".." {
            return Err(CrawlError::Validation(format!(
                "{path} has no file name to stage under"
            )));
        }

        let mut header = Vec::new();
        remote
            .by_ref()
            .take(HEADER_SIZE)
            .read_to_end(&mut header)
            .map_err(|e| CrawlError::remote(path.as_str(), e))?;
        drop(remote);

        let mut staged = StagedFile::create(self.scratch.stage_path(name))?;
        let staged_at = staged.path().to_path_buf();
        let local = |e: io::Error| CrawlError::local(&staged_at, e);
        staged.file.write_all(&header).map_err(local)?;
        let pos = staged.file.seek(SeekFrom::Start(0)).map_err(local)?;
        if pos != 0 {
            return Err(local(io::Error::other("seek did not rewind staged header")));
        }
        let mime = self.sniffer.sniff(&mut staged.file).map_err(local)?;
        debug!("{} -> {}", path, mime);
        Ok(mime)
    }
}

impl DetectContentType for ContentTypeDetector {
    fn detect(&self, path: &DiscoveredPath) -> String {
        match self.try_detect(path) {
            Ok(mime) => mime,
            Err(e) => {
                warn!("content type of {}: {}", path, e);
                UNKNOWN_CONTENT_TYPE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryNamespace;

    const PDF: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n";
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn detector(ns: MemoryNamespace) -> (tempfile::TempDir, ContentTypeDetector) {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(tmp.path().join("scratch")).unwrap();
        (tmp, ContentTypeDetector::new(Arc::new(ns), scratch))
    }

    #[test]
    fn sniffs_known_signatures() {
        let mut ns = MemoryNamespace::new();
        ns.add_file("smb://h/s/doc.pdf", PDF)
            .add_file("smb://h/s/pic", PNG)
            .add_file("smb://h/s/notes_2024.txt", b"hello world\n")
            .add_file("smb://h/s/empty", b"");
        let (_tmp, d) = detector(ns);
        let get = |u: &str| d.detect(&DiscoveredPath::parse(u).unwrap());
        assert_eq!(get("smb://h/s/doc.pdf"), "application/pdf");
        assert_eq!(get("smb://h/s/pic"), "image/png");
        assert_eq!(get("smb://h/s/notes_2024.txt"), "text/plain");
        assert_eq!(get("smb://h/s/empty"), "application/x-empty");
        assert!(d.scratch().is_empty().unwrap());
    }

    #[test]
    fn directory_needs_no_staging() {
        let mut ns = MemoryNamespace::new();
        ns.add_dir("smb://h/s/folder");
        let (_tmp, d) = detector(ns);
        let url = DiscoveredPath::parse("smb://h/s/folder").unwrap();
        assert_eq!(d.detect(&url), DIRECTORY_CONTENT_TYPE);
        assert!(d.scratch().is_empty().unwrap());
    }

    #[test]
    fn missing_remote_file_is_unknown() {
        let (_tmp, d) = detector(MemoryNamespace::new());
        let url = DiscoveredPath::parse("smb://h/s/gone").unwrap();
        assert_eq!(d.detect(&url), UNKNOWN_CONTENT_TYPE);
        assert!(d.scratch().is_empty().unwrap());
    }

    #[test]
    fn staging_collision_is_unknown_and_leaves_existing_file() {
        let mut ns = MemoryNamespace::new();
        ns.add_file("smb://h/s/clash", PDF);
        let (_tmp, d) = detector(ns);
        let blocker = d.scratch().stage_path("clash");
        std::fs::write(&blocker, b"occupied").unwrap();
        let url = DiscoveredPath::parse("smb://h/s/clash").unwrap();
        assert_eq!(d.detect(&url), UNKNOWN_CONTENT_TYPE);
        assert!(blocker.exists());
        std::fs::remove_file(blocker).unwrap();
    }

    struct FailingSniffer;

    impl Sniffer for FailingSniffer {
        fn sniff(&self, _staged: &mut File) -> io::Result<String> {
            Err(io::Error::other("magic database unavailable"))
        }
    }

    #[test]
    fn sniffer_failure_still_cleans_up() {
        let mut ns = MemoryNamespace::new();
        ns.add_file("smb://h/s/f", PDF);
        let tmp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(tmp.path().join("scratch")).unwrap();
        let d = ContentTypeDetector::with_sniffer(Arc::new(ns), scratch, Box::new(FailingSniffer));
        let url = DiscoveredPath::parse("smb://h/s/f").unwrap();
        assert_eq!(d.detect(&url), UNKNOWN_CONTENT_TYPE);
        assert!(d.scratch().is_empty().unwrap());
        d.into_scratch().remove().unwrap();
    }

    #[test]
    fn text_check_tolerates_truncated_utf8() {
        assert!(looks_like_text("héllo".as_bytes()));
        assert!(looks_like_text(&"é".as_bytes()[..1]));
        assert!(!looks_like_text(b"a\0b"));
    }
}
