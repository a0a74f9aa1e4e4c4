use log::{debug, warn};

use crate::DiscoveredPath;

/// Summarize subtrees a walk had to drop. Individual failures were already logged as they
/// happened; this adds one line per host and the full list at debug level.
pub fn log_skipped_subtrees(host: &str, skipped: &[(DiscoveredPath, String)]) {
    if skipped.is_empty() {
        return;
    }
    warn!(
        "{}: skipped {} subtree(s) due to listing errors or access issues",
        host,
        skipped.len()
    );
    for (url, msg) in skipped {
        debug!("  skipped: {} ({})", url, msg);
    }
}
