use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Standing crawler over SMB shares: walks every configured host and catalogs what it finds.
#[derive(Clone, Parser)]
#[command(name = "smbspider")]
#[command(about = "Crawl SMB hosts and catalog every file with its content type.")]
pub struct Cli {
    /// Verbose output (debug logs, per-host progress counters).
    #[arg(long, short = 'v', global = true, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Host list file, one hostname per line. Default: `smbspider.hosts`.
    #[arg(long = "hosts", value_name = "FILE", global = true)]
    pub hosts_file: Option<PathBuf>,

    /// Directory where remote hosts are reachable as `<DIR>/<host>/<share>/...`.
    #[arg(long, global = true)]
    pub mount_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Crawl forever, cycling through the host list (the default).
    Run(RunArgs),
    /// Show or edit the persisted host list.
    Hosts {
        #[command(subcommand)]
        action: HostsAction,
    },
    /// Walk one root without touching the catalog and print every file found.
    Scan {
        /// Root to walk, e.g. `smb://fileserver/public`.
        url: String,
        /// Write the paths to FILE (one per line) instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List the immediate files and directories of one remote directory.
    Ls {
        url: String,
    },
}

#[derive(Clone, Subcommand)]
pub enum HostsAction {
    List,
    Add { name: String },
    Remove { name: String },
}

#[derive(Clone, Default, Args)]
pub struct RunArgs {
    /// Catalog name (SQLite file). Default: `smbspider.db`.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Catalog server address (recorded in logs).
    #[arg(long)]
    pub db_server: Option<String>,

    /// Catalog user (recorded in logs).
    #[arg(long)]
    pub db_user: Option<String>,

    /// Protect the catalog with a password (SQLCipher). Prompts, or use SMBSPIDER_DB_KEY / .env.
    #[arg(long, short = 'x', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub encrypt: Option<bool>,

    /// Scratch directory for staged file headers.
    #[arg(long)]
    pub scratch: Option<PathBuf>,

    /// Paths buffered per catalog transaction.
    #[arg(long, short = 'c')]
    pub capacity: Option<usize>,

    /// Crawler workers sharing the host rotation.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,
}
