pub mod config;
pub mod logger;
pub mod passphrase;
pub mod settings_toml;
pub mod tempfiles;

pub use config::*;
pub use logger::setup_logging;
pub use passphrase::get_passphrase;
pub use tempfiles::{ScratchDir, dump_paths, write_atomic};
