//! Command execution against an open cache
//!
//! Output goes to the writer passed in, so tests can capture it.

use crate::cli::Commands;
use miette::{IntoDiagnostic, Result, WrapErr};
use rankcache::PriorityCache;
use std::io::{Read, Write};
use std::path::Path;
use std::process::ExitCode;

pub fn execute(
    command: Commands,
    cache: &PriorityCache,
    input: &mut impl Read,
    out: &mut impl Write,
) -> Result<ExitCode> {
    match command {
        Commands::Save {
            key,
            priority,
            file,
        } => {
            let bytes = match file {
                Some(path) => read_file(&path)?,
                None => {
                    let mut bytes = Vec::new();
                    input
                        .read_to_end(&mut bytes)
                        .into_diagnostic()
                        .wrap_err("Failed to read stdin")?;
                    bytes
                }
            };
            let saved = cache.save(priority, &bytes, &key)?;
            tracing::debug!(%key, priority, size = bytes.len(), saved, "save finished");
            writeln!(out, "{}", if saved { "saved" } else { "rejected" }).into_diagnostic()?;
        }
        Commands::CanSave {
            key,
            priority,
            size,
        } => {
            writeln!(out, "{}", cache.can_save(priority, size, &key)).into_diagnostic()?;
        }
        Commands::Priority { key, priority } => {
            let changed = cache.change_priority(priority, &key)?;
            writeln!(out, "{changed}").into_diagnostic()?;
        }
        Commands::Remove { key } => {
            if !cache.remove(&key)? {
                tracing::info!(%key, "Nothing cached under key");
            }
        }
        Commands::SetMax { bytes } => cache.set_max_total_size(bytes)?,
        Commands::Clear => cache.clear()?,
        Commands::Contains { key } => {
            writeln!(out, "{}", cache.contains(&key)).into_diagnostic()?;
        }
        Commands::Path { key } => match cache.local_path(&key) {
            Some(path) => writeln!(out, "{}", path.display()).into_diagnostic()?,
            None => return Ok(ExitCode::FAILURE),
        },
        Commands::List { json } => {
            let entries = cache.entries();
            if json {
                let rendered = serde_json::to_string_pretty(&entries).into_diagnostic()?;
                writeln!(out, "{rendered}").into_diagnostic()?;
            } else {
                for item in &entries {
                    writeln!(out, "{}\t{}\t{}", item.priority, item.size, item.file_name())
                        .into_diagnostic()?;
                }
            }
        }
        Commands::Stats => {
            let stats = cache.stats();
            writeln!(out, "items: {}", cache.len()).into_diagnostic()?;
            writeln!(out, "total_size: {}", cache.total_size()).into_diagnostic()?;
            writeln!(out, "max_total_size: {}", cache.max_total_size()).into_diagnostic()?;
            writeln!(out, "directory: {}", cache.directory().display()).into_diagnostic()?;
            tracing::debug!(?stats, "Session counters");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))
}
