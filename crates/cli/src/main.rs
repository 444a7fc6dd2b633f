//! `rankcache` command-line tool

mod cli;
mod commands;
mod tracing;

use crate::tracing::{TracingConfig, init_tracing};
use miette::Result;
use rankcache::{CacheConfig, PriorityCache};
use std::process::ExitCode;

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = cli::parse();

    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        filter: cli.log_filter,
    })?;

    let mut config = CacheConfig::from_env()?;
    if let Some(dir) = cli.dir {
        config = config.with_directory(dir);
    }
    if let Some(max) = cli.max_size {
        config = config.with_default_max_total_size(max);
    }
    let cache = PriorityCache::open(&config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::execute(cli.command, &cache, &mut std::io::stdin().lock(), &mut out)
}
