// credsync - reconcile badge-platform credentials against HR-platform trainings

mod adapter;
mod exit_codes;
mod report;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS};
use sync::{PassArgs, StrategyArg};

#[derive(Parser)]
#[command(name = "credsync")]
#[command(about = "Plan credential sync between badge and training exports (read-only)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the sync plan: updates and creates with ready-to-send payloads
    #[command(after_help = "\
Examples:
  credsync plan --incoming all_badges.csv --existing profile.json
  credsync plan -c sync.toml --incoming badges.csv --existing trainings.csv --json
  credsync plan -c sync.toml --incoming badges.csv --existing profile.json --output plan.json
  credsync plan --incoming badges.csv --existing profile.json --check")]
    Plan {
        /// Path to the sync TOML config (built-in defaults when omitted)
        #[arg(long, short = 'c', env = "CREDSYNC_CONFIG")]
        config: Option<PathBuf>,

        /// Incoming (badge platform) export: CSV
        #[arg(long)]
        incoming: PathBuf,

        /// Existing (HR platform) export: CSV, or profile JSON
        #[arg(long)]
        existing: PathBuf,

        /// Override the configured matching strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Print the JSON result to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 5 when the plan has pending operations
        #[arg(long)]
        check: bool,
    },

    /// Print a discrepancy report without payloads
    #[command(after_help = "\
Examples:
  credsync compare --incoming all_badges.csv --existing trainings.csv")]
    Compare {
        /// Path to the sync TOML config (built-in defaults when omitted)
        #[arg(long, short = 'c', env = "CREDSYNC_CONFIG")]
        config: Option<PathBuf>,

        /// Incoming (badge platform) export
        #[arg(long)]
        incoming: PathBuf,

        /// Existing (HR platform) export
        #[arg(long)]
        existing: PathBuf,

        /// Override the configured matching strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },

    /// Validate a sync config without running
    #[command(after_help = "\
Examples:
  credsync validate sync.toml")]
    Validate {
        /// Path to the sync TOML config
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  credsync-recon ", env!("CARGO_PKG_VERSION"),
    )
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "credsync_recon=debug,credsync=debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Plan {
            config,
            incoming,
            existing,
            strategy,
            json,
            output,
            check,
        } => sync::cmd_plan(
            PassArgs { config, incoming, existing, strategy },
            json,
            output,
            check,
        ),
        Commands::Compare {
            config,
            incoming,
            existing,
            strategy,
        } => sync::cmd_compare(PassArgs { config, incoming, existing, strategy }),
        Commands::Validate { config } => sync::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn error(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
