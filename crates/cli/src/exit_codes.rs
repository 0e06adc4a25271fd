//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Description                                        |
//! |------|----------------------------------------------------|
//! | 0    | Success                                            |
//! | 1    | General error (unspecified)                        |
//! | 2    | CLI usage error (bad args, unreadable file)        |
//! | 3    | Invalid sync config                                |
//! | 4    | Input export could not be read or interpreted      |
//! | 5    | `--check`: the plan still has pending operations   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `exit_code_for` or the relevant command

use credsync_recon::SyncError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing file.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// An input export is malformed or lacks a required column.
pub const EXIT_INPUT: u8 = 4;

/// `plan --check` found creates or updates still to apply.
pub const EXIT_PENDING: u8 = 5;

/// Map an engine error to its exit code.
pub fn exit_code_for(err: &SyncError) -> u8 {
    match err {
        SyncError::ConfigParse(_) | SyncError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        SyncError::MissingColumn { .. } | SyncError::InvalidInput { .. } => EXIT_INPUT,
        SyncError::Io(_) => EXIT_USAGE,
    }
}
