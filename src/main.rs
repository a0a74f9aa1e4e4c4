//! smbspider CLI: crawl the configured hosts; `hosts`, `scan` and `ls` for maintenance.

use anyhow::Result;
use clap::Parser;
use smbspider::engine::arg_parser::Cli;
use smbspider::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
