use std::collections::BTreeMap;

use crate::model::{MatchOutput, SyncOperation, SyncSummary};

/// Count matches and planned operations. Record-level counts are filled in
/// by the caller, which is the only place that still sees raw input.
pub fn compute_summary(matches: &MatchOutput, ops: &[SyncOperation]) -> SyncSummary {
    let mut field_mismatches: BTreeMap<String, usize> = BTreeMap::new();
    let mut updates = 0;
    let mut creates = 0;

    for op in ops {
        match op {
            SyncOperation::Update(u) => {
                updates += 1;
                for d in &u.diffs {
                    *field_mismatches.entry(d.field.to_string()).or_insert(0) += 1;
                }
            }
            SyncOperation::Create(_) => creates += 1,
        }
    }

    let matched = matches.matched.len();
    SyncSummary {
        incoming_entries: matched + matches.unmatched_incoming.len(),
        existing_entries: matched + matches.unmatched_existing.len(),
        matched,
        in_sync: matched.saturating_sub(updates),
        updates,
        creates,
        unmatched_existing: matches.unmatched_existing.len(),
        field_mismatches,
        ..SyncSummary::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate_records, flatten};
    use crate::model::{
        AggregatedEntry, MatchPhase, MatchedPair, RawRecord, UnmatchedExisting, UnmatchedIncoming,
    };
    use crate::plan::plan;

    fn entry(record: RawRecord) -> AggregatedEntry {
        flatten(&aggregate_records(&[record])).remove(0)
    }

    fn pair(incoming: RawRecord, existing: RawRecord) -> MatchedPair {
        MatchedPair {
            incoming: entry(incoming),
            existing: entry(existing),
            phase: MatchPhase::Exact,
            score: None,
        }
    }

    #[test]
    fn summary_counts() {
        let cert = |id: &str, date: &str| {
            RawRecord::new(id, "Certified Kubernetes Administrator")
                .with_issuer("CNCF")
                .with_issue_date(date)
        };
        let matches = MatchOutput {
            matched: vec![
                pair(cert("b1", "2023-01-01"), cert("t1", "2023-01-01")),
                pair(cert("b2", "2023-05-01"), cert("t2", "2023-02-01")),
                pair(
                    cert("b3", "2024-01-01").with_issuer("Linux Foundation"),
                    cert("t3", "2022-01-01"),
                ),
            ],
            unmatched_incoming: vec![UnmatchedIncoming {
                entry: entry(cert("b4", "2020-01-01")),
                template: None,
            }],
            unmatched_existing: vec![UnmatchedExisting {
                entry: entry(cert("t5", "2019-01-01")),
                nearest_incoming: None,
            }],
        };
        let ops = plan(&matches);
        let summary = compute_summary(&matches, &ops);

        assert_eq!(summary.matched, 3);
        assert_eq!(summary.in_sync, 1);
        assert_eq!(summary.updates, 2);
        assert_eq!(summary.creates, 1);
        assert_eq!(summary.incoming_entries, 4);
        assert_eq!(summary.existing_entries, 4);
        assert_eq!(summary.unmatched_existing, 1);
        assert_eq!(summary.field_mismatches["issue_date"], 2);
        assert_eq!(summary.field_mismatches["year"], 1);
        assert_eq!(summary.field_mismatches["issuer"], 1);
        assert!(!summary.field_mismatches.contains_key("title"));
    }
}
