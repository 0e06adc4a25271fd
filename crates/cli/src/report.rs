//! Human-readable output. Everything here goes to stderr or a terminal;
//! the JSON contract lives in `SyncResult` itself.

use credsync_recon::config::ColumnMapping;
use credsync_recon::model::{AggregatedEntry, FieldValue, SyncResult, Year};
use credsync_recon::plan::diff_entries;

fn year_label(year: Option<Year>) -> String {
    year.map_or_else(|| "unknown".to_string(), |y| y.to_string())
}

fn entry_label(entry: &AggregatedEntry) -> String {
    format!("{} (year {})", entry.preferred_title, year_label(entry.year))
}

fn value_label(value: &Option<FieldValue>) -> String {
    value
        .as_ref()
        .map_or_else(|| "<none>".to_string(), |v| v.to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// One-line pass summary.
pub fn summary_line(result: &SyncResult) -> String {
    let s = &result.summary;
    format!(
        "{} sync '{}': {} incoming / {} existing entries, {} matched ({} in sync), {}, {}, {} existing-only",
        result.meta.strategy,
        result.meta.config_name,
        s.incoming_entries,
        s.existing_entries,
        s.matched,
        s.in_sync,
        plural(s.updates, "update"),
        plural(s.creates, "create"),
        s.unmatched_existing,
    )
}

/// Per-field mismatch counts, one line each.
pub fn mismatch_lines(result: &SyncResult) -> Vec<String> {
    result
        .summary
        .field_mismatches
        .iter()
        .map(|(field, n)| format!("  {field}: {n}"))
        .collect()
}

/// Column check for a CSV export against its mapping.
pub fn header_report(label: &str, headers: &[String], columns: &ColumnMapping) -> Vec<String> {
    let mut lines = vec![format!(
        "[{label}] columns: {}",
        if headers.is_empty() {
            "<none>".to_string()
        } else {
            headers.join(", ")
        }
    )];

    let expected: Vec<&str> = columns
        .title
        .iter()
        .map(String::as_str)
        .chain(
            [
                &columns.issuer,
                &columns.issue_date,
                &columns.expiry_date,
                &columns.year,
                &columns.id,
                &columns.kind,
                &columns.name,
                &columns.description,
            ]
            .into_iter()
            .filter_map(|c| c.as_deref()),
        )
        .collect();

    let mut missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    if !missing.is_empty() {
        lines.push(format!("  !! missing mapped columns: {}", missing.join(", ")));
    }

    let mut extra: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|h| !expected.contains(h))
        .collect();
    extra.sort_unstable();
    if !extra.is_empty() {
        lines.push(format!("  ?? unmapped columns: {}", extra.join(", ")));
    }
    lines
}

/// Discrepancy report: entries only on one side, then per-pair differences.
pub fn compare_report(result: &SyncResult, incoming: &str, existing: &str) -> Vec<String> {
    let m = &result.matches;
    let mut lines = Vec::new();

    let existing_only: Vec<_> = m
        .unmatched_existing
        .iter()
        .filter(|u| u.nearest_incoming.is_none())
        .collect();
    if existing_only.is_empty() {
        lines.push(format!("No entries found only in {existing}."));
    } else {
        lines.push(format!("Present in {existing} but missing from {incoming}:"));
        lines.extend(existing_only.iter().map(|u| format!("  - {}", entry_label(&u.entry))));
    }

    let incoming_only: Vec<_> = m
        .unmatched_incoming
        .iter()
        .filter(|u| u.template.is_none())
        .collect();
    if incoming_only.is_empty() {
        lines.push(format!("No entries found only in {incoming}."));
    } else {
        lines.push(format!("Present in {incoming} but missing from {existing}:"));
        lines.extend(incoming_only.iter().map(|u| format!("  - {}", entry_label(&u.entry))));
    }

    let mut issues = Vec::new();
    for pair in &m.matched {
        let diffs = diff_entries(&pair.incoming, &pair.existing);
        if diffs.is_empty() {
            continue;
        }
        issues.push(format!("{}:", entry_label(&pair.existing)));
        for d in diffs {
            issues.push(format!(
                "  - {}: {} has {}, {} has {}",
                d.field,
                existing,
                value_label(&d.current),
                incoming,
                value_label(&d.proposed)
            ));
        }
    }
    for u in m.unmatched_incoming.iter().filter(|u| u.template.is_some()) {
        issues.push(format!(
            "{}: missing {existing} entry for year {}",
            u.entry.preferred_title,
            year_label(u.entry.year)
        ));
    }
    for u in m.unmatched_existing.iter().filter(|u| u.nearest_incoming.is_some()) {
        issues.push(format!(
            "{}: extra {existing} entry for year {} (no matching {incoming} issuance)",
            u.entry.preferred_title,
            year_label(u.entry.year)
        ));
    }

    if issues.is_empty() {
        lines.push("Shared entries: (no discrepancies)".to_string());
    } else {
        lines.push("Shared entries with discrepancies:".to_string());
        lines.extend(issues.into_iter().map(|l| format!("  {l}")));
    }
    lines
}
