use tracing::info;

use crate::aggregate::{aggregate_records, record_key, retain_certified};
use crate::config::{MatchStrategy, SyncConfig};
use crate::derived::apply_expiry_rules;
use crate::error::SyncError;
use crate::fuzzy::match_fuzzy;
use crate::matcher::match_grouped;
use crate::model::{PlannedOperation, SyncInput, SyncMeta, SyncResult};
use crate::payload::build_payload;
use crate::plan::plan;
use crate::summary::compute_summary;

/// Run one reconciliation pass per config. Returns the plan, payloads,
/// leftovers and summary; nothing is written anywhere.
pub fn run(config: &SyncConfig, input: &SyncInput) -> Result<SyncResult, SyncError> {
    config.validate()?;

    let mut incoming = input.incoming.clone();
    apply_expiry_rules(&mut incoming, &config.expiry_rules);

    let skipped = incoming
        .iter()
        .chain(&input.existing)
        .filter(|r| record_key(r).is_none())
        .count();

    let mut incoming_set = aggregate_records(&incoming);
    let mut existing_set = aggregate_records(&input.existing);
    if config.scope.certified_only {
        incoming_set = retain_certified(incoming_set);
        existing_set = retain_certified(existing_set);
    }

    let matches = match config.matching.strategy {
        MatchStrategy::Grouped => match_grouped(&incoming_set, &existing_set, &config.matching),
        MatchStrategy::Fuzzy => match_fuzzy(&incoming_set, &existing_set, &config.matching),
    };

    let ops = plan(&matches);
    let mut summary = compute_summary(&matches, &ops);
    summary.incoming_records = input.incoming.len();
    summary.existing_records = input.existing.len();
    summary.skipped_records = skipped;

    let operations = ops
        .into_iter()
        .map(|operation| PlannedOperation {
            payload: build_payload(&operation, &config.payload),
            operation,
        })
        .collect();

    info!(
        config = %config.name,
        strategy = %config.matching.strategy,
        matched = summary.matched,
        updates = summary.updates,
        creates = summary.creates,
        unmatched_existing = summary.unmatched_existing,
        "sync pass complete"
    );

    Ok(SyncResult {
        meta: SyncMeta {
            config_name: config.name.clone(),
            strategy: config.matching.strategy,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        operations,
        matches,
    })
}
