use std::path::PathBuf;

use credsync_recon::config::{ExpiryRule, MatchStrategy, SyncConfig};
use credsync_recon::engine::run;
use credsync_recon::model::{
    CredentialKind, FieldValue, IsoDate, MatchPhase, RawRecord, SyncField, SyncInput, SyncOperation,
    SyncResult,
};
use serde_json::json;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture_input() -> SyncInput {
    let path = fixtures_dir().join("badges-vs-trainings.json");
    let data = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&data).unwrap()
}

fn load_and_run() -> SyncResult {
    let toml = std::fs::read_to_string(fixtures_dir().join("profile.sync.toml")).unwrap();
    let config = SyncConfig::from_toml(&toml).unwrap();
    run(&config, &load_fixture_input()).unwrap()
}

/// Write every planned change back onto the existing side, the way a sync
/// client would: each update touches its target record only. The pass can
/// then be re-run against the result.
fn apply(input: &SyncInput, result: &SyncResult) -> SyncInput {
    let mut existing = input.existing.clone();
    let mut next_id = 0;

    for planned in &result.operations {
        match &planned.operation {
            SyncOperation::Update(update) => {
                let Some(record) = existing.iter_mut().find(|r| r.source_id == update.target_id)
                else {
                    panic!("update targets unknown record {}", update.target_id);
                };
                for diff in &update.diffs {
                    let text = diff.proposed.as_ref().and_then(FieldValue::as_text);
                    match diff.field {
                        SyncField::IssueDate => record.issue_date = text.and_then(IsoDate::parse),
                        SyncField::ExpiryDate => {
                            record.expiry_date = text.and_then(IsoDate::parse)
                        }
                        SyncField::Year => {
                            record.year = match diff.proposed {
                                Some(FieldValue::Year(y)) => Some(y),
                                _ => None,
                            }
                        }
                        SyncField::Issuer => record.issuer = text.unwrap_or("").to_string(),
                        SyncField::Title => record.title = text.unwrap_or("").to_string(),
                        SyncField::Description => {
                            record.passthrough.description = text.map(str::to_string)
                        }
                    }
                }
            }
            SyncOperation::Create(create) => {
                next_id += 1;
                let f = &create.fields;
                let mut record = RawRecord::new(format!("new-{next_id}"), f.title.clone())
                    .with_issuer(f.issuer.clone())
                    .with_year(f.year)
                    .with_kind(f.category);
                record.issue_date = f.issue_date.clone();
                record.expiry_date = f.expiry_date.clone();
                existing.push(record);
            }
        }
    }

    SyncInput {
        incoming: input.incoming.clone(),
        existing,
    }
}

// -------------------------------------------------------------------------
// Fixture pass
// -------------------------------------------------------------------------

#[test]
fn fixture_summary() {
    let result = load_and_run();

    assert_eq!(result.meta.config_name, "Badges to profile");
    assert_eq!(result.meta.strategy, MatchStrategy::Grouped);
    let s = &result.summary;
    assert_eq!(s.incoming_records, 5);
    assert_eq!(s.existing_records, 3);
    assert_eq!(s.skipped_records, 1);
    assert_eq!(s.incoming_entries, 3);
    assert_eq!(s.existing_entries, 3);
    assert_eq!(s.matched, 2);
    assert_eq!(s.in_sync, 1);
    assert_eq!(s.updates, 1);
    assert_eq!(s.creates, 1);
    assert_eq!(s.unmatched_existing, 1);
    for field in ["issue_date", "expiry_date", "year", "title"] {
        assert_eq!(s.field_mismatches[field], 1, "{field}");
    }
    assert!(!s.field_mismatches.contains_key("issuer"));
}

#[test]
fn fixture_update_reorders_title_and_moves_dates() {
    let result = load_and_run();
    let planned = &result.operations[0];
    let SyncOperation::Update(ref update) = planned.operation else {
        panic!("expected update first, got {:?}", planned.operation);
    };
    assert_eq!(update.target_id, "t2");
    assert_eq!(
        update.diff(SyncField::Year).unwrap().proposed,
        Some(FieldValue::Year(2024))
    );

    let p = &planned.payload;
    assert_eq!(p["title"], json!("Certified Kubernetes Administrator"));
    assert_eq!(p["name"], json!("Certified Kubernetes Administrator"));
    assert_eq!(p["completedWhen"], json!("2024-03-10T00:00:00"));
    assert_eq!(p["expireDate"], json!("2027-03-10T00:00:00"));
    assert_eq!(p["year"], json!(2024));
    assert_eq!(p["issuer"], json!("The Linux Foundation"));
    assert_eq!(
        p["translations"],
        json!([{
            "profileTranslationId": 9002,
            "languageId": 1,
            "title": "Certified Kubernetes Administrator",
            "issuer": "The Linux Foundation"
        }])
    );

    let matched = result
        .matches
        .matched
        .iter()
        .find(|m| m.existing.source_id() == "t2")
        .unwrap();
    assert_eq!(matched.phase, MatchPhase::Fallback);
}

#[test]
fn fixture_create_and_leftovers() {
    let result = load_and_run();
    let planned = &result.operations[1];
    let SyncOperation::Create(ref create) = planned.operation else {
        panic!("expected create, got {:?}", planned.operation);
    };
    assert_eq!(create.fields.title, "Microsoft Certified: Azure Fundamentals");
    assert_eq!(create.fields.category, CredentialKind::Certification);
    assert!(create.fields.expiry_date.is_none());
    assert_eq!(planned.payload["trainingType"], json!(1));
    assert!(!planned.payload.contains_key("expireDate"));

    assert_eq!(result.matches.unmatched_existing.len(), 1);
    assert_eq!(result.matches.unmatched_existing[0].entry.source_id(), "t3");
}

#[test]
fn result_serializes_with_tagged_operations() {
    let result = load_and_run();
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["operations"][0]["operation"]["op"], json!("update"));
    assert_eq!(value["operations"][1]["operation"]["op"], json!("create"));
    assert_eq!(value["meta"]["strategy"], json!("grouped"));
    assert_eq!(value["summary"]["creates"], json!(1));
}

#[test]
fn applying_the_plan_converges() {
    let toml = std::fs::read_to_string(fixtures_dir().join("profile.sync.toml")).unwrap();
    let config = SyncConfig::from_toml(&toml).unwrap();
    let input = load_fixture_input();

    let first = run(&config, &input).unwrap();
    assert!(!first.operations.is_empty());

    let second = run(&config, &apply(&input, &first)).unwrap();
    assert!(
        second.operations.is_empty(),
        "second pass still plans {:?}",
        second.operations.iter().map(|o| &o.operation).collect::<Vec<_>>()
    );
    assert_eq!(second.summary.in_sync, 3);
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn badge_without_training_is_created() {
    let input = SyncInput {
        incoming: vec![RawRecord::new("b1", "AWS Certified Solutions Architect – Associate")
            .with_issuer("AWS")
            .with_issue_date("2023-06-01")
            .with_expiry_date("2026-06-01")],
        existing: vec![],
    };
    let result = run(&SyncConfig::default(), &input).unwrap();
    assert_eq!(result.operations.len(), 1);
    let SyncOperation::Create(ref create) = result.operations[0].operation else {
        panic!("expected create");
    };
    assert_eq!(create.fields.title, "AWS Certified Solutions Architect – Associate");
    assert_eq!(create.fields.issuer, "AWS");
    assert_eq!(create.fields.issue_date.as_ref().unwrap().as_str(), "2023-06-01");
    assert_eq!(create.fields.expiry_date.as_ref().unwrap().as_str(), "2026-06-01");
}

#[test]
fn newer_issue_date_is_the_only_update() {
    let input = SyncInput {
        incoming: vec![RawRecord::new("b1", "AWS Certified Developer")
            .with_issuer("AWS")
            .with_issue_date("2023-06-01")
            .with_expiry_date("2026-06-01")],
        existing: vec![RawRecord::new("t1", "AWS Certified Developer")
            .with_issuer("AWS")
            .with_issue_date("2022-06-01")
            .with_expiry_date("2026-06-01")
            .with_year(Some(2023))],
    };
    let result = run(&SyncConfig::default(), &input).unwrap();

    assert_eq!(result.summary.updates, 1);
    let SyncOperation::Update(ref update) = result.operations[0].operation else {
        panic!("expected update");
    };
    let fields: Vec<SyncField> = update.diffs.iter().map(|d| d.field).collect();
    assert_eq!(fields, vec![SyncField::IssueDate]);
    assert_eq!(
        update.diff(SyncField::IssueDate).unwrap().proposed,
        Some(FieldValue::Text("2023-06-01".into()))
    );
}

#[test]
fn level_numbers_never_cross_in_fuzzy_mode() {
    let mut config = SyncConfig::default();
    config.matching.strategy = MatchStrategy::Fuzzy;
    let input = SyncInput {
        incoming: vec![RawRecord::new("b1", "Certified Kubernetes Administrator Level 2")],
        existing: vec![RawRecord::new("t1", "Certified Kubernetes Administrator Level 3")],
    };
    let result = run(&config, &input).unwrap();
    assert_eq!(result.summary.matched, 0);
    assert_eq!(result.summary.creates, 1);
    assert_eq!(result.summary.unmatched_existing, 1);
}

fn converge(config: &SyncConfig, mut input: SyncInput) -> Vec<usize> {
    let mut ops_per_pass = Vec::new();
    for _ in 0..3 {
        let result = run(config, &input).unwrap();
        ops_per_pass.push(result.operations.len());
        input = apply(&input, &result);
    }
    ops_per_pass
}

fn developer(id: &str, issued: &str) -> RawRecord {
    RawRecord::new(id, "AWS Certified Developer")
        .with_issuer("AWS")
        .with_issue_date(issued)
}

#[test]
fn duplicate_trainings_target_already_in_sync() {
    let input = SyncInput {
        incoming: vec![developer("b1", "2023-03-01")],
        existing: vec![developer("t1", "2023-03-01"), developer("t2", "2023-05-01")],
    };
    let result = run(&SyncConfig::default(), &input).unwrap();
    assert_eq!(result.summary.matched, 1);
    assert!(result.operations.is_empty(), "{:?}", result.operations);
    assert_eq!(result.summary.in_sync, 1);
}

#[test]
fn duplicate_trainings_converge_after_one_update() {
    let input = SyncInput {
        incoming: vec![developer("b1", "2023-03-01")],
        existing: vec![developer("t1", "2023-05-01"), developer("t2", "2023-03-01")],
    };
    let result = run(&SyncConfig::default(), &input).unwrap();
    let SyncOperation::Update(ref update) = result.operations[0].operation else {
        panic!("expected update");
    };
    assert_eq!(update.target_id, "t1");
    assert_eq!(
        update.diff(SyncField::IssueDate).unwrap().current,
        Some(FieldValue::Text("2023-05-01".into()))
    );

    assert_eq!(converge(&SyncConfig::default(), input), vec![1, 0, 0]);
}

#[test]
fn title_only_update_keeps_target_dates() {
    let input = SyncInput {
        incoming: vec![developer("b1", "2023-03-01")],
        existing: vec![
            developer("t1", "2023-03-01").with_issuer("Amazon"),
            developer("t2", "2023-09-01").with_expiry_date("2026-09-01"),
        ],
    };
    let result = run(&SyncConfig::default(), &input).unwrap();
    assert_eq!(result.operations.len(), 1);
    let p = &result.operations[0].payload;
    assert_eq!(p["issuer"], json!("AWS"));
    assert_eq!(p["completedWhen"], json!("2023-03-01T00:00:00"));
    assert!(!p.contains_key("expiresWhen"));
}

#[test]
fn derived_expiry_note_added_when_dates_already_match() {
    let mut config = SyncConfig::default();
    config.scope.certified_only = false;
    config.expiry_rules.push(ExpiryRule {
        issuer_contains: "fortinet".into(),
        years: 2,
    });
    let input = SyncInput {
        incoming: vec![RawRecord::new("b1", "NSE 1 Network Security Associate")
            .with_issuer("Fortinet")
            .with_issue_date("2023-03-15")],
        existing: vec![RawRecord::new("t1", "NSE 1 Network Security Associate")
            .with_issuer("Fortinet")
            .with_issue_date("2023-03-15")
            .with_expiry_date("2025-03-15")],
    };
    let result = run(&config, &input).unwrap();
    assert_eq!(result.operations.len(), 1);
    let SyncOperation::Update(ref update) = result.operations[0].operation else {
        panic!("expected update");
    };
    let fields: Vec<SyncField> = update.diffs.iter().map(|d| d.field).collect();
    assert_eq!(fields, vec![SyncField::Description]);
    assert_eq!(
        result.operations[0].payload["description"],
        json!("Expiry auto-derived: set to 2025-03-15 (2 years after issue date 2023-03-15).")
    );
    assert_eq!(result.summary.field_mismatches["description"], 1);

    assert_eq!(converge(&config, input), vec![1, 0, 0]);
}
