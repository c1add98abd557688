//! Command line argument parsing for PromGate.
//!
//! This module defines the CLI interface using [`clap`] for argument parsing.
//! Everything about the proxy itself lives in the YAML configuration file;
//! the command line only selects that file and controls output.
//!
//! # Example
//!
//! ```no_run
//! use promgate::args::Args;
//! use clap::Parser;
//!
//! let args = Args::parse();
//! if let Err(e) = args.validate() {
//!     eprintln!("Configuration error: {}", e);
//!     std::process::exit(1);
//! }
//! ```

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for PromGate.
///
/// # Example
///
/// ```
/// use promgate::args::Args;
/// use clap::Parser;
///
/// let args = Args::try_parse_from(["promgate", "/etc/promgate.yaml", "--json-logs"]).unwrap();
/// assert_eq!(args.config.to_str(), Some("/etc/promgate.yaml"));
/// assert!(args.json_logs);
/// ```
#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(
    long_about = "A validating reverse proxy for Prometheus-compatible query APIs\nEvery PromQL query is checked against the configured rules before it reaches the backend\n\nExample usage:\n  promgate\n  promgate /etc/promgate/config.yaml --json-logs"
)]
#[command(
    after_help = "Environment variables (override the configuration file):\n  PROMGATE_PORT                Listen port\n  PROMGATE_BIND                Bind address\n  PROMGATE_MAX_CONCURRENCY     Concurrent query requests\n  PROMGATE_QUEUE_TIMEOUT_SECS  Max wait for a query slot\n  PROMGATE_BACKEND_URL         Prometheus-compatible backend URL\n  PROMGATE_PROXY_TIMEOUT_SECS  Backend request timeout\n  PROMGATE_MAX_BODY_SIZE_MB    Max buffered form body (0 = unlimited)\n  PROMGATE_ALLOWED_SPACES      Comma-separated allowed space values\n  RUST_LOG                     Log filter (default: info)"
)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(value_name = "CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(
        long,
        short = 'v',
        help = "Show detailed configuration and startup information"
    )]
    pub verbose: bool,

    /// Enable quiet mode (minimal output)
    #[arg(
        long,
        short = 'q',
        help = "Suppress configuration output, show only essential messages",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output logs in JSON format (for structured logging)
    #[arg(long, help = "Output logs in JSON format for structured logging")]
    pub json_logs: bool,

    /// Append logs to a file instead of stderr
    #[arg(long, value_name = "PATH", help = "Append logs to this file instead of stderr")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Validates the parsed command line arguments.
    ///
    /// The configuration path must not be empty, and the log file's
    /// directory must exist when a log file is given.
    pub fn validate(&self) -> Result<(), String> {
        if self.config.as_os_str().is_empty() {
            return Err("Configuration file path cannot be empty".to_string());
        }

        if let Some(log_file) = &self.log_file
            && let Some(dir) = log_file.parent()
            && !dir.as_os_str().is_empty()
            && !dir.is_dir()
        {
            return Err(format!(
                "Log file directory does not exist: '{}'",
                dir.display()
            ));
        }

        Ok(())
    }

    /// Default log level implied by the verbosity flags.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}
