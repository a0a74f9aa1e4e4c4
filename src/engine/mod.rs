//! Engine: catalog store, flush path, host rotation, crawl loop and CLI glue.

pub mod arg_parser;
pub mod cli;
pub mod crawler;
pub mod db_ops;
pub mod flush;
pub mod progress;
pub mod scheduler;
pub mod tools;

// Re-export commonly used items
pub use arg_parser::{Cli, Commands, HostsAction, RunArgs};
pub use cli::handle_run;
pub use crawler::{CrawlSetup, Crawler, HostReport, run_workers};
pub use db_ops::{Catalog, SqliteCatalog, open_db, open_db_in_memory};
pub use flush::CatalogWriter;
pub use scheduler::{HostLease, HostScheduler, parse_host_list};
pub use tools::{normalize_display_name, running_as_root, split_server_path};
