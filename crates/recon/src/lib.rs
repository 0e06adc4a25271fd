//! `credsync-recon`: credential reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded badge and training records,
//! returns a sync plan with ready-to-send payloads. No CLI or IO
//! dependencies.

pub mod aggregate;
pub mod canonical;
pub mod config;
pub mod derived;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod matcher;
pub mod model;
pub mod payload;
pub mod plan;
pub mod similarity;
pub mod summary;

pub use canonical::canonicalize;
pub use config::{MatchStrategy, SyncConfig};
pub use engine::run;
pub use error::SyncError;
pub use model::{RawRecord, SyncInput, SyncOperation, SyncResult};
