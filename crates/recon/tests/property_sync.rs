// Property-based tests for canonicalization, aggregation and planning.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;

use credsync_recon::aggregate::{aggregate_records, entry_count};
use credsync_recon::canonical::canonicalize;
use credsync_recon::config::{MatchStrategy, SyncConfig};
use credsync_recon::engine::run;
use credsync_recon::model::{RawRecord, SyncInput, SyncOperation};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Title built from a small vocabulary so keys collide often.
fn arb_title() -> impl Strategy<Value = String> {
    prop_oneof![
        6 => proptest::collection::vec(
            prop::sample::select(vec![
                "AWS", "Certified", "Developer", "Associate", "Azure", "Security",
                "Professional", "Kubernetes", "Level", "2", "3", "Practitioner",
            ]),
            1..5,
        )
        .prop_map(|words| words.join(" ")),
        1 => Just(String::new()),
        1 => Just("   ".to_string()),
    ]
}

fn arb_date() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        3 => (2018u32..2026, 1u32..13, 1u32..29)
            .prop_map(|(y, m, d)| Some(format!("{y:04}-{m:02}-{d:02}"))),
    ]
}

type Fields = (String, &'static str, Option<String>, Option<String>);

fn arb_fields() -> impl Strategy<Value = Fields> {
    (
        arb_title(),
        prop::sample::select(vec!["", "AWS", "Microsoft", "CNCF"]),
        arb_date(),
        arb_date(),
    )
}

fn build(prefix: &str, fields: Vec<Fields>) -> Vec<RawRecord> {
    fields
        .into_iter()
        .enumerate()
        .map(|(i, (title, issuer, issued, expires))| {
            let mut record = RawRecord::new(format!("{prefix}{i}"), title).with_issuer(issuer);
            if let Some(d) = issued {
                record = record.with_issue_date(&d);
            }
            if let Some(d) = expires {
                record = record.with_expiry_date(&d);
            }
            record
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn canonical_key_ignores_word_order(
        words in proptest::collection::vec("[A-Za-z0-9]{1,10}", 1..6),
        seed in any::<u64>(),
    ) {
        let mut shuffled = words.clone();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();
        prop_assert_eq!(canonicalize(&words.join(" ")), canonicalize(&shuffled.join("  ")));
    }

    #[test]
    fn aggregation_drops_only_blank_titles(
        records in proptest::collection::vec(arb_fields(), 0..40),
    ) {
        let records = build("r", records);
        let set = aggregate_records(&records);
        let kept: usize = set.values().flatten().map(|e| e.members.len()).sum();
        let blank = records.iter().filter(|r| r.title.trim().is_empty()).count();
        prop_assert_eq!(kept + blank, records.len());
        prop_assert!(entry_count(&set) <= kept);
    }

    #[test]
    fn every_unmatched_incoming_creates_exactly_once(
        incoming in proptest::collection::vec(arb_fields(), 0..20),
        existing in proptest::collection::vec(arb_fields(), 0..20),
        fuzzy in any::<bool>(),
    ) {
        let mut config = SyncConfig::default();
        config.scope.certified_only = false;
        if fuzzy {
            config.matching.strategy = MatchStrategy::Fuzzy;
        }
        let input = SyncInput {
            incoming: build("b", incoming),
            existing: build("t", existing),
        };
        let result = run(&config, &input).unwrap();

        let creates = result
            .operations
            .iter()
            .filter(|p| matches!(p.operation, SyncOperation::Create(_)))
            .count();
        prop_assert_eq!(creates, result.matches.unmatched_incoming.len());
        prop_assert_eq!(
            result.summary.matched + result.summary.unmatched_existing,
            result.summary.existing_entries
        );

        // Updates come first and never target the same existing entry twice.
        let mut seen_create = false;
        let mut targets = std::collections::BTreeSet::new();
        for planned in &result.operations {
            match &planned.operation {
                SyncOperation::Update(u) => {
                    prop_assert!(!seen_create);
                    prop_assert!(!u.diffs.is_empty());
                    prop_assert!(targets.insert(u.target_id.clone()));
                }
                SyncOperation::Create(_) => seen_create = true,
            }
        }
    }

    #[test]
    fn identical_sides_plan_nothing(
        records in proptest::collection::vec(arb_fields(), 0..25),
    ) {
        let records = build("r", records);
        let input = SyncInput { incoming: records.clone(), existing: records };
        let result = run(&SyncConfig::default(), &input).unwrap();
        prop_assert!(result.operations.is_empty());
        prop_assert_eq!(result.summary.in_sync, result.summary.matched);
    }
}
