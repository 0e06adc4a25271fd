use tracing::debug;

use crate::derived::{derived_expiry_note, merge_description};
use crate::model::{
    AggregatedEntry, CreateFields, CreatePlan, FieldDiff, FieldValue, IsoDate, MatchOutput,
    MatchedPair, SyncField, SyncOperation, UnmatchedIncoming, UpdatePlan, Year,
};

fn date_value(d: &Option<IsoDate>) -> Option<FieldValue> {
    d.as_ref().map(|d| FieldValue::Text(d.as_str().to_string()))
}

fn text_value(s: &str) -> Option<FieldValue> {
    let s = s.trim();
    (!s.is_empty()).then(|| FieldValue::Text(s.to_string()))
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// The fields of one existing side that a diff compares against.
struct Current<'a> {
    issue_date: &'a Option<IsoDate>,
    expiry_date: &'a Option<IsoDate>,
    year: Option<Year>,
    issuer: &'a str,
    title: &'a str,
}

fn diff_values(incoming: &AggregatedEntry, existing: Current<'_>) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    if let Some(ref issued) = incoming.issue_date {
        if existing.issue_date.as_ref() != Some(issued) {
            diffs.push(FieldDiff {
                field: SyncField::IssueDate,
                current: date_value(existing.issue_date),
                proposed: date_value(&incoming.issue_date),
            });
        }
    }

    if let Some(ref expires) = incoming.expiry_date {
        if existing.expiry_date.as_ref() != Some(expires) {
            diffs.push(FieldDiff {
                field: SyncField::ExpiryDate,
                current: date_value(existing.expiry_date),
                proposed: date_value(&incoming.expiry_date),
            });
        }
    }

    if incoming.year != existing.year {
        diffs.push(FieldDiff {
            field: SyncField::Year,
            current: existing.year.map(FieldValue::Year),
            proposed: incoming.year.map(FieldValue::Year),
        });
    }

    if !incoming.issuer.trim().is_empty() && !same_text(&incoming.issuer, existing.issuer) {
        diffs.push(FieldDiff {
            field: SyncField::Issuer,
            current: text_value(existing.issuer),
            proposed: text_value(&incoming.issuer),
        });
    }

    if !incoming.preferred_title.trim().is_empty()
        && !same_text(&incoming.preferred_title, existing.title)
    {
        diffs.push(FieldDiff {
            field: SyncField::Title,
            current: text_value(existing.title),
            proposed: text_value(&incoming.preferred_title),
        });
    }

    diffs
}

/// Field-level differences between two aggregated entries, using each
/// side's representative values. Used for reporting.
///
/// Absent incoming dates never clear existing ones, while an unknown
/// incoming year does clear a known existing year.
pub fn diff_entries(incoming: &AggregatedEntry, existing: &AggregatedEntry) -> Vec<FieldDiff> {
    diff_values(
        incoming,
        Current {
            issue_date: &existing.issue_date,
            expiry_date: &existing.expiry_date,
            year: existing.year,
            issuer: &existing.issuer,
            title: &existing.preferred_title,
        },
    )
}

/// Differences that would move the target record of `existing` (its first
/// member) toward `incoming`.
///
/// A field is only proposed when it differs from both the entry's
/// representative value and the target's own value, and `current` is the
/// target's. Duplicates sharing the bucket are never written to, so a
/// target that already holds the incoming value is left alone. A derived
/// incoming expiry whose note is missing from the target's description adds
/// a description change.
pub fn diff_target(incoming: &AggregatedEntry, existing: &AggregatedEntry) -> Vec<FieldDiff> {
    let Some(target) = existing.primary() else {
        return Vec::new();
    };
    let representative: Vec<SyncField> = diff_entries(incoming, existing)
        .into_iter()
        .map(|d| d.field)
        .collect();

    let mut diffs = diff_values(
        incoming,
        Current {
            issue_date: &target.issue_date,
            expiry_date: &target.expiry_date,
            year: target.resolved_year(),
            issuer: &target.issuer,
            title: &target.title,
        },
    );
    diffs.retain(|d| representative.contains(&d.field));

    if incoming.expiry_derived {
        if let Some(ref expiry) = incoming.expiry_date {
            let note = derived_expiry_note(expiry, incoming.issue_date.as_ref());
            let current = target.passthrough.description.as_deref();
            if let Some(merged) = merge_description(current, &note) {
                diffs.push(FieldDiff {
                    field: SyncField::Description,
                    current: current.and_then(text_value),
                    proposed: Some(FieldValue::Text(merged)),
                });
            }
        }
    }

    diffs
}

/// An update for a matched pair, or `None` when nothing differs.
pub fn plan_update(pair: &MatchedPair) -> Option<UpdatePlan> {
    let target = pair.existing.primary()?;
    let diffs = diff_target(&pair.incoming, &pair.existing);
    if diffs.is_empty() {
        return None;
    }
    Some(UpdatePlan {
        target_id: target.source_id.clone(),
        title: target.title.clone(),
        diffs,
        incoming: pair.incoming.clone(),
        existing: pair.existing.clone(),
    })
}

/// Full record for an incoming entry with no counterpart. A same-key
/// existing record, when there is one, fills whatever the entry lacks.
pub fn plan_create(unmatched: &UnmatchedIncoming) -> CreatePlan {
    let entry = &unmatched.entry;
    let template = unmatched
        .template
        .as_ref()
        .and_then(|t| t.primary())
        .cloned();

    let title = [
        Some(entry.preferred_title.trim()),
        template.as_ref().map(|t| t.title.trim()),
    ]
    .into_iter()
    .flatten()
    .find(|t| !t.is_empty())
    .map(str::to_string)
    .unwrap_or_else(|| entry.key.as_str().to_string());

    let issuer = match entry.issuer.trim() {
        "" => template
            .as_ref()
            .map(|t| t.issuer.trim().to_string())
            .unwrap_or_default(),
        own => own.to_string(),
    };

    let category = template
        .as_ref()
        .and_then(|t| t.kind)
        .unwrap_or_else(|| entry.category());

    CreatePlan {
        key: entry.key.clone(),
        fields: CreateFields {
            title,
            issuer,
            issue_date: entry.issue_date.clone(),
            expiry_date: entry.expiry_date.clone(),
            year: entry.year,
            category,
            expiry_derived: entry.expiry_derived,
        },
        template,
        incoming: entry.clone(),
    }
}

/// Updates in match order, then one create per unmatched incoming entry.
/// Reporting-only associations never produce operations.
pub fn plan(matches: &MatchOutput) -> Vec<SyncOperation> {
    let mut ops: Vec<SyncOperation> = matches
        .matched
        .iter()
        .filter_map(plan_update)
        .map(SyncOperation::Update)
        .collect();
    let updates = ops.len();

    ops.extend(
        matches
            .unmatched_incoming
            .iter()
            .map(|u| SyncOperation::Create(plan_create(u))),
    );

    debug!(updates, creates = ops.len() - updates, "sync plan built");
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate_records, flatten};
    use crate::model::{CredentialKind, MatchPhase, RawRecord};

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

    fn base(id: &str) -> RawRecord {
        RawRecord::new(id, "AWS Certified Developer")
            .with_issuer("AWS")
            .with_issue_date("2023-06-01")
            .with_expiry_date("2026-06-01")
    }

    #[test]
    fn identical_values_produce_no_update() {
        let p = pair(base("b1"), base("t1"));
        assert!(plan_update(&p).is_none());

        // Case differences in issuer and title are not changes.
        let existing = RawRecord::new("t1", "aws certified DEVELOPER")
            .with_issuer("aws")
            .with_issue_date("2023-06-01")
            .with_expiry_date("2026-06-01");
        assert!(plan_update(&pair(base("b1"), existing)).is_none());
    }

    #[test]
    fn only_issue_date_differs() {
        let existing = base("t1").with_issue_date("2022-06-01").with_year(Some(2023));
        let p = pair(base("b1"), existing);
        let update = plan_update(&p).unwrap();
        assert_eq!(update.target_id, "t1");
        assert_eq!(update.diffs.len(), 1);
        let d = update.diff(SyncField::IssueDate).unwrap();
        assert_eq!(d.proposed, Some(FieldValue::Text("2023-06-01".into())));
        assert_eq!(d.current, Some(FieldValue::Text("2022-06-01".into())));
    }

    #[test]
    fn expiry_overwrites_but_never_clears() {
        let existing = base("t1").with_expiry_date("2025-01-01");
        let update = plan_update(&pair(base("b1"), existing)).unwrap();
        let d = update.diff(SyncField::ExpiryDate).unwrap();
        assert_eq!(d.proposed, Some(FieldValue::Text("2026-06-01".into())));

        let mut incoming = base("b1");
        incoming.expiry_date = None;
        assert!(plan_update(&pair(incoming, base("t1"))).is_none());
    }

    #[test]
    fn unknown_incoming_year_clears_existing_year() {
        let mut incoming = base("b1");
        incoming.issue_date = None;
        let mut existing = base("t1").with_year(Some(2023));
        existing.issue_date = None;
        let update = plan_update(&pair(incoming, existing)).unwrap();
        let d = update.diff(SyncField::Year).unwrap();
        assert_eq!(d.current, Some(FieldValue::Year(2023)));
        assert_eq!(d.proposed, None);
        assert_eq!(update.diffs.len(), 1);
    }

    #[test]
    fn blank_incoming_issuer_is_not_a_change() {
        let incoming = base("b1").with_issuer("");
        assert!(plan_update(&pair(incoming, base("t1"))).is_none());

        let incoming = base("b1").with_issuer("Amazon Web Services");
        let update = plan_update(&pair(incoming, base("t1"))).unwrap();
        assert_eq!(
            update.diff(SyncField::Issuer).unwrap().proposed,
            Some(FieldValue::Text("Amazon Web Services".into()))
        );
    }

    #[test]
    fn duplicates_diff_against_target_not_bucket() {
        let existing = flatten(&aggregate_records(&[
            base("t1").with_issue_date("2023-06-01"),
            base("t2").with_issue_date("2023-08-01"),
        ]))
        .remove(0);
        assert_eq!(existing.issue_date.as_ref().unwrap().as_str(), "2023-08-01");
        let p = MatchedPair {
            incoming: entry(base("b1")),
            existing,
            phase: MatchPhase::Exact,
            score: None,
        };

        // The bucket as a whole still reports the later date.
        assert_eq!(diff_entries(&p.incoming, &p.existing).len(), 1);
        assert!(plan_update(&p).is_none());

        // Target differs but another member already carries the value.
        let existing = flatten(&aggregate_records(&[
            base("t1").with_issue_date("2023-02-01"),
            base("t2").with_issue_date("2023-06-01"),
        ]))
        .remove(0);
        let p = MatchedPair {
            incoming: entry(base("b1")),
            existing,
            phase: MatchPhase::Exact,
            score: None,
        };
        assert!(plan_update(&p).is_none());
    }

    #[test]
    fn missing_derived_note_is_a_description_change() {
        let mut incoming = base("b1");
        incoming.expiry_derived = true;
        let update = plan_update(&pair(incoming.clone(), base("t1"))).unwrap();
        assert_eq!(update.diffs.len(), 1);
        let d = update.diff(SyncField::Description).unwrap();
        assert_eq!(d.current, None);
        assert_eq!(
            d.proposed,
            Some(FieldValue::Text(
                "Expiry auto-derived: set to 2026-06-01 (3 years after issue date 2023-06-01)."
                    .into()
            ))
        );

        let mut noted = base("t1");
        noted.passthrough.description = d
            .proposed
            .as_ref()
            .and_then(FieldValue::as_text)
            .map(str::to_string);
        assert!(plan_update(&pair(incoming, noted)).is_none());
    }

    #[test]
    fn create_without_template() {
        let record = RawRecord::new("b1", "AWS Certified Solutions Architect – Associate")
            .with_issuer("AWS")
            .with_issue_date("2023-06-01")
            .with_expiry_date("2026-06-01");
        let create = plan_create(&UnmatchedIncoming {
            entry: entry(record),
            template: None,
        });
        let f = &create.fields;
        assert_eq!(f.title, "AWS Certified Solutions Architect – Associate");
        assert_eq!(f.issuer, "AWS");
        assert_eq!(f.issue_date.as_ref().unwrap().as_str(), "2023-06-01");
        assert_eq!(f.expiry_date.as_ref().unwrap().as_str(), "2026-06-01");
        assert_eq!(f.year, Some(2023));
        assert_eq!(f.category, CredentialKind::Certification);
        assert!(create.template.is_none());
    }

    #[test]
    fn create_copies_missing_fields_from_template() {
        let record = RawRecord::new("b1", "Certified Thing").with_issue_date("2024-01-01");
        let template = RawRecord::new("t1", "Certified Thing")
            .with_issuer("Thing Inc")
            .with_kind(CredentialKind::Course);
        let create = plan_create(&UnmatchedIncoming {
            entry: entry(record),
            template: Some(entry(template)),
        });
        assert_eq!(create.fields.issuer, "Thing Inc");
        assert_eq!(create.fields.category, CredentialKind::Course);
        assert_eq!(create.template.as_ref().unwrap().source_id, "t1");
    }

    #[test]
    fn each_unmatched_incoming_creates_once() {
        let matches = MatchOutput {
            matched: vec![pair(base("b1"), base("t1").with_issue_date("2020-01-01"))],
            unmatched_incoming: vec![
                UnmatchedIncoming {
                    entry: entry(RawRecord::new("b2", "Certified A")),
                    template: None,
                },
                UnmatchedIncoming {
                    entry: entry(RawRecord::new("b3", "Certified B")),
                    template: None,
                },
            ],
            unmatched_existing: vec![],
        };
        let ops = plan(&matches);
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], SyncOperation::Update(_)));
        let creates: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                SyncOperation::Create(c) => Some(c.fields.title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(creates, vec!["Certified A", "Certified B"]);
    }
}
