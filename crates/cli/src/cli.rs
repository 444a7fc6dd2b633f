use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rankcache")]
#[command(about = "Inspect and modify a size-bounded, priority-ordered disk cache")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "RANKCACHE_DIR",
        help = "Cache directory (defaults to the per-user cache location)"
    )]
    pub dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "RANKCACHE_MAX_SIZE",
        help = "Size bound in bytes for a cache that has no index yet"
    )]
    pub max_size: Option<u64>,

    #[arg(
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(
        long,
        global = true,
        help = "Tracing filter directives, overriding --log-level and RUST_LOG"
    )]
    pub log_filter: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Store bytes from a file or stdin under a key")]
    Save {
        key: String,
        #[arg(long, short = 'p', help = "Priority of the new entry")]
        priority: u64,
        #[arg(long, short = 'f', help = "Read bytes from this file instead of stdin")]
        file: Option<PathBuf>,
    },
    #[command(about = "Check whether a save would be admitted")]
    CanSave {
        key: String,
        #[arg(long, short = 'p')]
        priority: u64,
        #[arg(long, short = 's', help = "Size in bytes")]
        size: u64,
    },
    #[command(about = "Change the priority of a cached entry")]
    Priority { key: String, priority: u64 },
    #[command(about = "Remove an entry")]
    Remove { key: String },
    #[command(about = "Set the size bound, evicting as needed")]
    SetMax { bytes: u64 },
    #[command(about = "Remove every entry")]
    Clear,
    #[command(about = "Check whether a key is cached")]
    Contains { key: String },
    #[command(about = "Print the blob path for a key")]
    Path { key: String },
    #[command(about = "List entries, kept-longest first")]
    List {
        #[arg(long, help = "Print the entries as JSON")]
        json: bool,
    },
    #[command(about = "Show size usage")]
    Stats,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["rankcache", "stats"]).unwrap();

        assert_eq!(cli.log_level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert_eq!(cli.command, Commands::Stats);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rankcache",
            "list",
            "--json",
            "--dir",
            "/tmp/cache",
            "--max-size",
            "4096",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.command, Commands::List { json: true });
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(cli.max_size, Some(4096));
        assert_eq!(cli.log_format, TracingFormat::Json);
    }

    #[test]
    fn test_log_filter_flag() {
        let cli = Cli::try_parse_from(["rankcache", "stats"]).unwrap();
        assert_eq!(cli.log_filter, None);

        let cli =
            Cli::try_parse_from(["rankcache", "--log-filter", "rankcache::cache=trace", "stats"])
                .unwrap();
        assert_eq!(cli.log_filter.as_deref(), Some("rankcache::cache=trace"));
    }

    #[test]
    fn test_save_arguments() {
        let cli =
            Cli::try_parse_from(["rankcache", "save", "logo.png", "-p", "3", "-f", "in.bin"])
                .unwrap();

        assert_eq!(
            cli.command,
            Commands::Save {
                key: "logo.png".to_string(),
                priority: 3,
                file: Some(PathBuf::from("in.bin")),
            }
        );
    }

    #[test]
    fn test_priority_is_positional() {
        let cli = Cli::try_parse_from(["rankcache", "priority", "k", "9"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Priority {
                key: "k".to_string(),
                priority: 9,
            }
        );
    }

    #[test]
    fn test_rejects_negative_priority() {
        assert!(Cli::try_parse_from(["rankcache", "priority", "k", "-1"]).is_err());
    }

    #[test]
    fn test_can_save_requires_size() {
        assert!(Cli::try_parse_from(["rankcache", "can-save", "k", "-p", "1"]).is_err());
    }
}
