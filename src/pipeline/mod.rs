//! Pipeline components: tree walk, result buffer, content-type detection.

pub mod buffer;
pub mod detect;
pub mod error_handler;
pub mod walk;

pub use buffer::{BatchSink, FlushReport, ResultBuffer};
pub use detect::{ContentTypeDetector, DetectContentType, InferSniffer, Sniffer};
pub use error_handler::log_skipped_subtrees;
pub use walk::{TreeWalker, Walk, WalkOutcome, WalkSummary};
