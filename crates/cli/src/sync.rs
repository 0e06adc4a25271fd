//! `credsync plan | compare | validate`: config-driven credential sync.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::info;

use credsync_recon::config::{MatchStrategy, SyncConfig};
use credsync_recon::model::{SyncInput, SyncResult};

use crate::adapter::{csv_headers, load_source};
use crate::exit_codes::{exit_code_for, EXIT_PENDING, EXIT_USAGE};
use crate::report;
use crate::CliError;

/// Matching strategy override from the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    Grouped,
    Fuzzy,
}

impl From<StrategyArg> for MatchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Grouped => MatchStrategy::Grouped,
            StrategyArg::Fuzzy => MatchStrategy::Fuzzy,
        }
    }
}

pub struct PassArgs {
    pub config: Option<PathBuf>,
    pub incoming: PathBuf,
    pub existing: PathBuf,
    pub strategy: Option<StrategyArg>,
}

fn sync_err(err: credsync_recon::SyncError) -> CliError {
    CliError {
        code: exit_code_for(&err),
        message: err.to_string(),
        hint: None,
    }
}

/// Read and validate a config, or fall back to the built-in defaults.
fn load_config(path: Option<&Path>) -> Result<SyncConfig, CliError> {
    let Some(path) = path else {
        return Ok(SyncConfig::default());
    };
    let config_str = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: None,
    })?;
    SyncConfig::from_toml(&config_str).map_err(sync_err)
}

fn run_pass(args: &PassArgs) -> Result<(SyncConfig, SyncResult), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(strategy) = args.strategy {
        config.matching.strategy = strategy.into();
    }

    let incoming = load_source(&args.incoming, &config.incoming).map_err(|e| {
        sync_err(e).with_hint(format!(
            "check [incoming.columns] against the header row of {}",
            args.incoming.display()
        ))
    })?;
    let existing = load_source(&args.existing, &config.existing).map_err(|e| {
        sync_err(e).with_hint(format!(
            "check [existing.columns] against the header row of {}",
            args.existing.display()
        ))
    })?;

    let input = SyncInput { incoming, existing };
    let result = credsync_recon::run(&config, &input).map_err(sync_err)?;
    Ok((config, result))
}

pub fn cmd_plan(
    args: PassArgs,
    json_output: bool,
    output_file: Option<PathBuf>,
    check: bool,
) -> Result<(), CliError> {
    let (_, result) = run_pass(&args)?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::error(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str).map_err(|e| CliError {
            code: EXIT_USAGE,
            message: format!("cannot write output: {e}"),
            hint: None,
        })?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    eprintln!("{}", report::summary_line(&result));
    for line in report::mismatch_lines(&result) {
        eprintln!("{line}");
    }

    let pending = result.operations.len();
    info!(pending, "plan ready");
    if check && pending > 0 {
        return Err(CliError {
            code: EXIT_PENDING,
            message: format!("{pending} pending operation(s)"),
            hint: Some("the existing side is out of sync with the incoming side".into()),
        });
    }
    Ok(())
}

pub fn cmd_compare(args: PassArgs) -> Result<(), CliError> {
    let (config, result) = run_pass(&args)?;

    for (path, source) in [(&args.incoming, &config.incoming), (&args.existing, &config.existing)] {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        // Header check is advisory.
        if let Some(headers) = std::fs::read_to_string(path)
            .ok()
            .and_then(|data| csv_headers(&data).ok())
        {
            for line in report::header_report(&source.label, &headers, &source.columns) {
                println!("{line}");
            }
        }
    }

    let s = &result.summary;
    println!();
    println!(
        "{} records processed: {} ({} entries)",
        config.incoming.label, s.incoming_records, s.incoming_entries
    );
    println!(
        "{} records processed: {} ({} entries)",
        config.existing.label, s.existing_records, s.existing_entries
    );
    println!();
    for line in report::compare_report(&result, &config.incoming.label, &config.existing.label) {
        println!("{line}");
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;
    eprintln!(
        "valid: sync '{}' ({} → {}, strategy {}, {} expiry rule(s))",
        config.name,
        config.incoming.label,
        config.existing.label,
        config.matching.strategy,
        config.expiry_rules.len(),
    );
    Ok(())
}
