use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::canonical::canonicalize;
use crate::model::{AggregatedEntry, AggregatedSet, CanonicalKey, IsoDate, RawRecord, Year};

/// Sorts known years ascending and the unknown bucket last.
type YearSlot = (bool, Year);

fn year_slot(year: Option<Year>) -> YearSlot {
    (year.is_none(), year.unwrap_or(0))
}

/// Running tallies for one (key, year) bucket. Count vectors keep
/// first-encounter order, which is what ties fall back to.
#[derive(Default)]
struct Bucket {
    year: Option<Year>,
    title_counts: Vec<(String, usize)>,
    issuer_counts: Vec<(String, usize)>,
    issue_dates: Vec<IsoDate>,
    expiry_dates: Vec<(IsoDate, bool)>,
    certified: bool,
    members: Vec<RawRecord>,
}

fn bump(counts: &mut Vec<(String, usize)>, value: &str) {
    match counts.iter_mut().find(|(v, _)| v == value) {
        Some((_, n)) => *n += 1,
        None => counts.push((value.to_string(), 1)),
    }
}

impl Bucket {
    fn absorb(&mut self, title: &str, record: &RawRecord) {
        bump(&mut self.title_counts, title);

        let issuer = record.issuer.trim();
        if !issuer.is_empty() {
            bump(&mut self.issuer_counts, issuer);
        }
        if let Some(ref d) = record.issue_date {
            self.issue_dates.push(d.clone());
        }
        if let Some(ref d) = record.expiry_date {
            self.expiry_dates.push((d.clone(), record.expiry_derived));
        }
        if title.to_lowercase().contains("certified") {
            self.certified = true;
        }
        self.members.push(record.clone());
    }

    fn finish(self, key: &CanonicalKey) -> AggregatedEntry {
        // Highest count, then longest string, then first seen.
        let mut preferred: Option<&(String, usize)> = None;
        for candidate in &self.title_counts {
            let better = match preferred {
                None => true,
                Some((title, count)) => {
                    (candidate.1, candidate.0.len()) > (*count, title.len())
                }
            };
            if better {
                preferred = Some(candidate);
            }
        }
        let preferred_title = preferred.map(|(t, _)| t.clone()).unwrap_or_default();

        let mut issuer: Option<&(String, usize)> = None;
        for candidate in &self.issuer_counts {
            if issuer.map_or(true, |(_, n)| candidate.1 > *n) {
                issuer = Some(candidate);
            }
        }

        let expiry_date = self.expiry_dates.iter().map(|(d, _)| d).max().cloned();
        let expiry_derived = match expiry_date {
            Some(ref max) => self
                .expiry_dates
                .iter()
                .filter(|(d, _)| d == max)
                .all(|(_, derived)| *derived),
            None => false,
        };

        AggregatedEntry {
            key: key.clone(),
            year: self.year,
            preferred_title,
            title_variants: self.title_counts.iter().map(|(t, _)| t.clone()).collect::<BTreeSet<_>>(),
            issuer: issuer.map(|(i, _)| i.clone()).unwrap_or_default(),
            issue_date: self.issue_dates.iter().max().cloned(),
            expiry_date,
            expiry_derived,
            certified: self.certified,
            kind: self.members.first().and_then(|r| r.kind),
            members: self.members,
        }
    }
}

/// Canonical key of a record, or `None` when its title is blank.
pub fn record_key(record: &RawRecord) -> Option<CanonicalKey> {
    let title = record.title.trim();
    if title.is_empty() {
        return None;
    }
    let key = canonicalize(title);
    (!key.is_empty()).then_some(key)
}

/// Group records by (canonical key, year) and collapse each bucket into one
/// representative entry. Records with a blank title or key are skipped.
pub fn aggregate_records(records: &[RawRecord]) -> AggregatedSet {
    let mut groups: BTreeMap<CanonicalKey, BTreeMap<YearSlot, Bucket>> = BTreeMap::new();

    for record in records {
        let Some(key) = record_key(record) else {
            debug!(source_id = %record.source_id, "skipping record with blank title");
            continue;
        };
        let year = record.resolved_year();
        let bucket = groups
            .entry(key)
            .or_default()
            .entry(year_slot(year))
            .or_insert_with(|| Bucket {
                year,
                ..Bucket::default()
            });
        bucket.absorb(record.title.trim(), record);
    }

    groups
        .into_iter()
        .map(|(key, per_year)| {
            let entries = per_year.into_values().map(|b| b.finish(&key)).collect();
            (key, entries)
        })
        .collect()
}

/// Drop entries that are not certifications, and keys left empty.
pub fn retain_certified(set: AggregatedSet) -> AggregatedSet {
    set.into_iter()
        .filter_map(|(key, entries)| {
            let kept: Vec<_> = entries.into_iter().filter(|e| e.certified).collect();
            (!kept.is_empty()).then_some((key, kept))
        })
        .collect()
}

/// Entries in key order, then year order.
pub fn flatten(set: &AggregatedSet) -> Vec<AggregatedEntry> {
    set.values().flatten().cloned().collect()
}

pub fn entry_count(set: &AggregatedSet) -> usize {
    set.values().map(Vec::len).sum()
}
