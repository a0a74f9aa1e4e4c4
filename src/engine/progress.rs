//! Progress counter for files discovered during a host walk

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::utils::config::PROGRESS_UPDATE_BATCH_SIZE;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: String, position: u16) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = position,
        unit = " files"
    )))
}

/// Update progress bar if available
/// Uses try_lock so a contended bar never stalls the walk
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Counts files locally and pushes them to the bar every [`PROGRESS_UPDATE_BATCH_SIZE`].
pub struct WalkProgress {
    bar: Option<ProgressBar>,
    pending: usize,
}

impl WalkProgress {
    /// `None` bar: counting is a no-op (non-verbose runs).
    pub fn new(bar: Option<ProgressBar>) -> Self {
        Self { bar, pending: 0 }
    }

    pub fn for_host(show: bool, host: &str, position: u16) -> Self {
        Self::new(show.then(|| create_counter(host.to_string(), position)))
    }

    pub fn tick(&mut self) {
        let Some(bar) = &self.bar else {
            return;
        };
        self.pending += 1;
        if self.pending >= PROGRESS_UPDATE_BATCH_SIZE {
            update_progress_bar(bar, self.pending);
            self.pending = 0;
        }
    }

    /// Push the remainder and end the bar's line.
    pub fn finish(mut self) {
        if let Some(bar) = self.bar.take() {
            if self.pending > 0 {
                update_progress_bar(&bar, self.pending);
            }
            if let Ok(mut b) = bar.lock() {
                let _ = b.refresh();
            }
            eprintln!();
        }
    }
}
