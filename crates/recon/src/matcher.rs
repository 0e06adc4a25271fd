use tracing::debug;

use crate::config::MatchingConfig;
use crate::model::{
    AggregatedEntry, AggregatedSet, CredentialKind, MatchOutput, MatchPhase, MatchedPair,
    UnmatchedExisting, UnmatchedIncoming, Year,
};

/// Year distance used for ranking: 0 when both are unknown, `penalty` when
/// exactly one is, else the absolute difference.
pub fn year_distance(a: Option<Year>, b: Option<Year>, penalty: u32) -> u32 {
    match (a, b) {
        (Some(x), Some(y)) => x.abs_diff(y),
        (None, None) => 0,
        _ => penalty,
    }
}

/// Match incoming entries against existing entries key by key.
///
/// Within a shared key: exact year pairs first, then a fallback ranked by
/// credential kind, year distance and original index. Existing entries that
/// remain unconsumed are linked to their nearest incoming entry for
/// reporting only.
pub fn match_grouped(
    incoming: &AggregatedSet,
    existing: &AggregatedSet,
    params: &MatchingConfig,
) -> MatchOutput {
    let mut out = MatchOutput::default();

    for (key, inc_entries) in incoming {
        let Some(ex_entries) = existing.get(key) else {
            out.unmatched_incoming
                .extend(inc_entries.iter().map(|e| UnmatchedIncoming {
                    entry: e.clone(),
                    template: None,
                }));
            continue;
        };
        match_key_group(inc_entries, ex_entries, params, &mut out);
    }

    for (key, ex_entries) in existing {
        if !incoming.contains_key(key) {
            out.unmatched_existing
                .extend(ex_entries.iter().map(|e| UnmatchedExisting {
                    entry: e.clone(),
                    nearest_incoming: None,
                }));
        }
    }

    debug!(
        matched = out.matched.len(),
        unmatched_incoming = out.unmatched_incoming.len(),
        unmatched_existing = out.unmatched_existing.len(),
        "grouped matching complete"
    );
    out
}

fn match_key_group(
    inc_entries: &[AggregatedEntry],
    ex_entries: &[AggregatedEntry],
    params: &MatchingConfig,
    out: &mut MatchOutput,
) {
    let mut used = vec![false; ex_entries.len()];
    let mut pending: Vec<&AggregatedEntry> = Vec::new();

    // Phase A: same known year.
    for inc in inc_entries {
        let hit = inc.year.and_then(|year| {
            ex_entries
                .iter()
                .enumerate()
                .position(|(i, ex)| !used[i] && ex.year == Some(year))
        });
        match hit {
            Some(ei) => {
                used[ei] = true;
                out.matched.push(MatchedPair {
                    incoming: inc.clone(),
                    existing: ex_entries[ei].clone(),
                    phase: MatchPhase::Exact,
                    score: None,
                });
            }
            None => pending.push(inc),
        }
    }

    // Phase B: best remaining candidate.
    for inc in pending {
        let best = ex_entries
            .iter()
            .enumerate()
            .filter(|(i, _)| !used[*i])
            .min_by_key(|(i, ex)| {
                let kind_rank = u8::from(ex.kind != Some(CredentialKind::Certification));
                let distance = year_distance(inc.year, ex.year, params.unknown_year_penalty);
                (kind_rank, distance, *i)
            })
            .map(|(i, _)| i);

        match best {
            Some(ei) => {
                used[ei] = true;
                out.matched.push(MatchedPair {
                    incoming: inc.clone(),
                    existing: ex_entries[ei].clone(),
                    phase: MatchPhase::Fallback,
                    score: None,
                });
            }
            None => out.unmatched_incoming.push(UnmatchedIncoming {
                entry: inc.clone(),
                template: ex_entries.first().cloned(),
            }),
        }
    }

    // Leftover existing entries: nearest incoming, informational only.
    for (ei, ex) in ex_entries.iter().enumerate() {
        if used[ei] {
            continue;
        }
        let nearest = inc_entries
            .iter()
            .enumerate()
            .min_by_key(|(i, inc)| {
                (year_distance(inc.year, ex.year, params.unknown_year_penalty), *i)
            })
            .map(|(_, inc)| inc.clone());
        out.unmatched_existing.push(UnmatchedExisting {
            entry: ex.clone(),
            nearest_incoming: nearest,
        });
    }
}
