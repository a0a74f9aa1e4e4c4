//! CLI command handlers: crawl by default; `hosts`, `scan` and `ls` for maintenance.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::engine::arg_parser::{Cli, Commands, HostsAction, RunArgs};
use crate::engine::crawler::{CrawlSetup, run_workers};
use crate::engine::scheduler::HostScheduler;
use crate::engine::tools::running_as_root;
use crate::pipeline::TreeWalker;
use crate::remote::MountNamespace;
use crate::utils::settings_toml::{apply_file_to_opts, load_settings_toml};
use crate::utils::{dump_paths, get_passphrase, setup_logging};
use crate::{DiscoveredPath, GuestCredentials, Opts};

/// Defaults, then `smbspider.toml` in the working directory, then CLI flags.
fn setup_opts(cli: &Cli, run: Option<&RunArgs>) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = load_settings_toml(Path::new(".")) {
        apply_file_to_opts(&file, &mut opts);
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    if let Some(p) = &cli.hosts_file {
        opts.hosts_file = p.clone();
    }
    if let Some(p) = &cli.mount_root {
        opts.mount_root = p.clone();
    }
    if let Some(run) = run {
        if let Some(p) = &run.db {
            opts.db_path = p.clone();
        }
        if run.db_server.is_some() {
            opts.db_server = run.db_server.clone();
        }
        if run.db_user.is_some() {
            opts.db_user = run.db_user.clone();
        }
        if let Some(x) = run.encrypt {
            opts.encrypt = x;
        }
        if let Some(p) = &run.scratch {
            opts.scratch_dir = p.clone();
        }
        if let Some(n) = run.capacity {
            opts.buffer_capacity = n;
        }
        if let Some(n) = run.workers {
            opts.workers = n;
        }
    }
    setup_logging(opts.verbose);
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);
    opts
}

fn open_namespace(opts: &Opts) -> Result<Arc<MountNamespace>> {
    let ns = MountNamespace::open_session(&opts.mount_root, GuestCredentials::default())
        .context("open remote session")?;
    Ok(Arc::new(ns))
}

/// Exit status after a forced stop (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

/// Every Ctrl-C sets `stop` and is forwarded to the returned channel.
fn install_stop_handler(stop: Arc<AtomicBool>) -> Result<Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(2);
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
        let _ = tx.try_send(());
    })
    .context("install Ctrl-C handler")?;
    Ok(rx)
}

/// Block until a second stop request arrives (true) or the handler is gone (false).
/// The first request only asks the workers to finish their current host.
fn watch_stop_requests(rx: &Receiver<()>) -> bool {
    if rx.recv().is_err() {
        return false;
    }
    warn!("stop requested; finishing current hosts (Ctrl-C again to abort)");
    rx.recv().is_ok()
}

fn handle_crawl(opts: &Opts) -> Result<()> {
    if opts.buffer_capacity == 0 {
        bail!("buffer capacity must be at least 1");
    }
    if running_as_root() && !opts.encrypt {
        info!("Running as root. Consider using -x or --encrypt to protect the catalog.");
    }
    if let Some(server) = &opts.db_server {
        info!(
            "catalog {} on {} as {}",
            opts.db_path.display(),
            server,
            opts.db_user.as_deref().unwrap_or("<default>")
        );
    }

    let passphrase = if opts.encrypt {
        Some(get_passphrase(&opts.db_path, opts.db_user.as_deref())?)
    } else {
        None
    };

    let scheduler = Arc::new(HostScheduler::load(&opts.hosts_file).context("load host list")?);
    if scheduler.is_empty() {
        warn!(
            "no hosts in {}; add some with `{} hosts add <NAME>`",
            opts.hosts_file.display(),
            env!("CARGO_PKG_NAME")
        );
    }
    let setup = CrawlSetup {
        scheduler,
        ns: open_namespace(opts)?,
        db_path: opts.db_path.clone(),
        passphrase,
        scratch_dir: opts.scratch_dir.clone(),
        capacity: opts.buffer_capacity,
        workers: opts.workers,
        show_progress: opts.verbose,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_rx = install_stop_handler(Arc::clone(&stop))?;
    // Detached: it only ever wakes on Ctrl-C.
    thread::spawn(move || {
        if watch_stop_requests(&stop_rx) {
            error!("second stop request; aborting without a final flush");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    run_workers(&setup, &stop).context("crawl")?;
    info!("crawl stopped");
    Ok(())
}

fn handle_hosts(opts: &Opts, action: &HostsAction) -> Result<()> {
    let scheduler = HostScheduler::load(&opts.hosts_file).context("load host list")?;
    match action {
        HostsAction::List => {
            for h in scheduler.hosts() {
                println!("{h}");
            }
        }
        HostsAction::Add { name } => {
            if !scheduler.add_host(name)? {
                println!("{} already listed", name.trim().yellow());
            }
        }
        HostsAction::Remove { name } => {
            if !scheduler.remove_host(name)? {
                println!("{} not listed", name.trim().yellow());
            }
        }
    }
    Ok(())
}

fn handle_scan(opts: &Opts, url: &str, output: Option<&Path>) -> Result<()> {
    let root = DiscoveredPath::parse(url)?;
    let walker = TreeWalker::new(open_namespace(opts)?);
    let mut found = Vec::new();
    let summary = walker.walk(&root, |p| {
        if output.is_none() {
            println!("{p}");
        }
        found.push(p);
    })?;
    if let Some(file) = output {
        dump_paths(file, &found)?;
        info!("{} path(s) written to {}", found.len(), file.display());
    }
    info!(
        "{} file(s) in {} director(ies), {} skipped",
        summary.files,
        summary.dirs,
        summary.skipped.len()
    );
    Ok(())
}

fn handle_ls(opts: &Opts, url: &str) -> Result<()> {
    let dir = DiscoveredPath::parse(url)?;
    let walker = TreeWalker::new(open_namespace(opts)?);
    for child in walker.list_children(&dir)? {
        println!("{child}");
    }
    Ok(())
}

/// Dispatch the parsed command line. No subcommand means `run` with defaults.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let default_run = RunArgs::default();
    match &cli.command {
        None => handle_crawl(&setup_opts(cli, Some(&default_run))),
        Some(Commands::Run(run)) => handle_crawl(&setup_opts(cli, Some(run))),
        Some(Commands::Hosts { action }) => handle_hosts(&setup_opts(cli, None), action),
        Some(Commands::Scan { url, output }) => {
            handle_scan(&setup_opts(cli, None), url, output.as_deref())
        }
        Some(Commands::Ls { url }) => handle_ls(&setup_opts(cli, None), url),
    }
}
