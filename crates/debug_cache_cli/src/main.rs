//! debug-cache: browse and maintain a debug cache directory.
//!
//! Lists recorded functions and calls, prints stored arguments and results,
//! diffs two recorded results with the cache's comparator, and removes
//! records, either one at a time or every expired one.

#![warn(missing_docs)]

mod context;
mod diff;
mod inspect;
mod maintain;

use std::io;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect and maintain a debug cache.
#[derive(Parser, Debug)]
#[command(name = "debug-cache", version, about = "Debug cache browser")]
pub struct Cli {
    /// Cache root directory, overriding the configuration file.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to a `debug_cache.toml` file. Defaults to `./debug_cache.toml`
    /// when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List functions that have recorded calls.
    Functions,
    /// List the recorded states of a function.
    States {
        /// Function name.
        function: String,
    },
    /// Print the arguments and result of one recorded call.
    Show(ShowArgs),
    /// Compare the results of two recorded calls.
    Diff(DiffArgs),
    /// Remove one recorded call.
    Rm {
        /// Function name.
        function: String,
        /// State of the call to remove.
        state: String,
    },
    /// Remove every expired record.
    Gc {
        /// Only sweep this function.
        function: Option<String>,
    },
}

/// Arguments for `debug-cache show`.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Function name.
    pub function: String,
    /// State of the call to show.
    pub state: String,
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for `debug-cache diff`.
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Function name.
    pub function: String,
    /// State of the old (baseline) call.
    pub old: String,
    /// State of the new call.
    pub new: String,
}

/// Output format for `show`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Root override.
    pub root: Option<PathBuf>,
    /// Explicit configuration file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global = GlobalArgs {
        root: cli.root,
        config: cli.config,
    };

    let mut out = io::stdout().lock();
    let result = match cli.command {
        Command::Functions => inspect::functions(&global, &mut out),
        Command::States { ref function } => inspect::states(function, &global, &mut out),
        Command::Show(ref args) => inspect::show(args, &global, &mut out),
        Command::Diff(ref args) => diff::run(args, &global, &mut out),
        Command::Rm {
            ref function,
            ref state,
        } => maintain::rm(function, state, &global, &mut out),
        Command::Gc { ref function } => maintain::gc(function.as_deref(), &global, &mut out),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Logs to stderr. `RUST_LOG` selects the filter unless `--verbose` is given.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "debug_cache=debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "debug_cache=info".into())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_functions() {
        let cli = Cli::parse_from(["debug-cache", "functions"]);
        assert!(matches!(cli.command, Command::Functions));
        assert!(cli.root.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from([
            "debug-cache",
            "--root",
            "/tmp/dc",
            "--config",
            "/etc/debug_cache.toml",
            "-v",
            "functions",
        ]);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/dc")));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/debug_cache.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_global_flag_after_subcommand() {
        let cli = Cli::parse_from(["debug-cache", "states", "load", "--root", "/tmp/dc"]);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/dc")));
        match cli.command {
            Command::States { function } => assert_eq!(function, "load"),
            _ => panic!("expected States command"),
        }
    }

    #[test]
    fn parse_show_default_format() {
        let cli = Cli::parse_from(["debug-cache", "show", "load", "x.abc"]);
        match cli.command {
            Command::Show(ref args) => {
                assert_eq!(args.function, "load");
                assert_eq!(args.state, "x.abc");
                assert_eq!(args.format, OutputFormat::Text);
            }
            _ => panic!("expected Show command"),
        }
    }

    #[test]
    fn parse_show_json() {
        let cli = Cli::parse_from(["debug-cache", "show", "load", "x.abc", "--format", "json"]);
        match cli.command {
            Command::Show(ref args) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("expected Show command"),
        }
    }

    #[test]
    fn parse_diff() {
        let cli = Cli::parse_from(["debug-cache", "diff", "load", "a.1", "b.2"]);
        match cli.command {
            Command::Diff(ref args) => {
                assert_eq!(args.function, "load");
                assert_eq!(args.old, "a.1");
                assert_eq!(args.new, "b.2");
            }
            _ => panic!("expected Diff command"),
        }
    }

    #[test]
    fn parse_rm_and_gc() {
        let cli = Cli::parse_from(["debug-cache", "rm", "load", "a.1"]);
        assert!(matches!(cli.command, Command::Rm { ref function, ref state }
            if function == "load" && state == "a.1"));

        let cli = Cli::parse_from(["debug-cache", "gc"]);
        assert!(matches!(cli.command, Command::Gc { function: None }));

        let cli = Cli::parse_from(["debug-cache", "gc", "load"]);
        assert!(matches!(cli.command, Command::Gc { function: Some(ref f) } if f == "load"));
    }

    #[test]
    fn missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["debug-cache"]).is_err());
    }
}
