//! Fuzzy correspondence between two independently sourced record sets whose
//! canonical keys may diverge (vendor prefixes, extra qualifier words).
//!
//! Every record yields up to three match keys: the canonical full title, the
//! title with the issuer's name removed, and the title without its first
//! word. Candidates reachable through a shared key are scored; when none is,
//! a full scan accepts only near-identical titles.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::flatten;
use crate::canonical::{canonicalize, tokens};
use crate::config::MatchingConfig;
use crate::model::{
    AggregatedEntry, AggregatedSet, CanonicalKey, CredentialKind, MatchOutput, MatchPhase,
    MatchedPair, RawRecord, UnmatchedExisting, UnmatchedIncoming,
};
use crate::similarity::ratio;

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Anything with a display title and an issuer name.
pub trait Titled {
    fn title(&self) -> &str;
    fn issuer(&self) -> &str;
}

impl Titled for RawRecord {
    fn title(&self) -> &str {
        &self.title
    }
    fn issuer(&self) -> &str {
        &self.issuer
    }
}

impl Titled for AggregatedEntry {
    fn title(&self) -> &str {
        &self.preferred_title
    }
    fn issuer(&self) -> &str {
        &self.issuer
    }
}

// ---------------------------------------------------------------------------
// Key generation
// ---------------------------------------------------------------------------

/// Remove the issuer name and each of its tokens (whole words,
/// case-insensitive). Falls back to the original title if nothing is left.
pub fn strip_issuer(title: &str, issuer: &str) -> String {
    let issuer = issuer.trim();
    if title.is_empty() || issuer.is_empty() {
        return title.to_string();
    }

    let mut cleaned = title.to_string();
    if let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(issuer))) {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }
    for token in tokens(issuer) {
        if let Ok(re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&token))) {
            cleaned = re.replace_all(&cleaned, " ").into_owned();
        }
    }

    let collapsed = SPACE_RE.replace_all(&cleaned, " ").trim().to_string();
    if collapsed.is_empty() {
        title.to_string()
    } else {
        collapsed
    }
}

/// Canonical keys of the title variants used for candidate lookup.
pub fn match_keys(title: &str, issuer: &str) -> BTreeSet<CanonicalKey> {
    let base = title.trim();
    let mut variants: Vec<String> = Vec::new();
    if !base.is_empty() {
        variants.push(base.to_string());
        if !issuer.is_empty() {
            variants.push(strip_issuer(base, issuer));
        }
        let words: Vec<&str> = base.split_whitespace().collect();
        if words.len() > 1 {
            variants.push(words[1..].join(" "));
        }
    }

    variants
        .iter()
        .map(|v| canonicalize(v))
        .filter(|k| !k.is_empty())
        .collect()
}

/// Numbers appearing in the text ("2", "3.5").
pub fn numeric_tokens(text: &str) -> BTreeSet<String> {
    NUMERIC_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Both titles carry numbers and they share none: "Level 2" vs "Level 3".
fn numbers_conflict(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    !a.is_empty() && !b.is_empty() && a.is_disjoint(b)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Per-record data computed once up front.
struct Profile {
    keys: BTreeSet<CanonicalKey>,
    lowered: String,
    numbers: BTreeSet<String>,
    category: CredentialKind,
}

impl Profile {
    fn of<T: Titled>(item: &T) -> Self {
        let title = item.title().trim();
        Self {
            keys: match_keys(title, item.issuer()),
            lowered: title.to_lowercase(),
            numbers: numeric_tokens(title),
            category: CredentialKind::from_title(title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyPair {
    pub incoming: usize,
    pub existing: usize,
    pub score: f64,
}

/// Index-based result of [`resolve`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Correspondence {
    pub pairs: Vec<FuzzyPair>,
    pub incoming_only: Vec<usize>,
    pub existing_only: Vec<usize>,
}

/// Score a candidate pair; the numeric veto forces zero.
fn score(inc: &Profile, ex: &Profile, params: &MatchingConfig) -> f64 {
    if numbers_conflict(&inc.numbers, &ex.numbers) {
        return 0.0;
    }
    let shared = inc.keys.intersection(&ex.keys).count() as f64;
    let bonus = if inc.category == ex.category {
        params.category_bonus
    } else {
        0.0
    };
    params.shared_key_weight * shared + ratio(&inc.lowered, &ex.lowered) + bonus
}

/// Greedily pair each incoming item (in input order) with its best
/// unconsumed existing candidate. Deterministic for a given input order.
pub fn resolve<I: Titled, E: Titled>(
    incoming: &[I],
    existing: &[E],
    params: &MatchingConfig,
) -> Correspondence {
    let inc_profiles: Vec<Profile> = incoming.iter().map(Profile::of).collect();
    let ex_profiles: Vec<Profile> = existing.iter().map(Profile::of).collect();

    let mut index: BTreeMap<&CanonicalKey, Vec<usize>> = BTreeMap::new();
    for (ei, profile) in ex_profiles.iter().enumerate() {
        for key in &profile.keys {
            index.entry(key).or_default().push(ei);
        }
    }

    let mut used = vec![false; existing.len()];
    let mut pairs = Vec::new();
    let mut incoming_only = Vec::new();

    for (ii, inc) in inc_profiles.iter().enumerate() {
        let reachable: BTreeSet<usize> = inc
            .keys
            .iter()
            .filter_map(|k| index.get(k))
            .flatten()
            .copied()
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for &ei in &reachable {
            if used[ei] {
                continue;
            }
            let s = score(inc, &ex_profiles[ei], params);
            if s > best.map_or(0.0, |(_, b)| b) {
                best = Some((ei, s));
            }
        }

        if best.is_none() {
            for (ei, ex) in ex_profiles.iter().enumerate() {
                if used[ei] || numbers_conflict(&inc.numbers, &ex.numbers) {
                    continue;
                }
                if ratio(&inc.lowered, &ex.lowered) < params.fallback_min_ratio {
                    continue;
                }
                let s = score(inc, ex, params);
                if s > best.map_or(0.0, |(_, b)| b) {
                    best = Some((ei, s));
                }
            }
        }

        match best {
            Some((ei, s)) => {
                used[ei] = true;
                pairs.push(FuzzyPair {
                    incoming: ii,
                    existing: ei,
                    score: s,
                });
            }
            None => incoming_only.push(ii),
        }
    }

    let existing_only = (0..existing.len()).filter(|i| !used[*i]).collect();

    debug!(
        pairs = pairs.len(),
        incoming_only = incoming_only.len(),
        "fuzzy resolution complete"
    );

    Correspondence {
        pairs,
        incoming_only,
        existing_only,
    }
}

/// Fuzzy strategy over aggregated sets: entries are flattened in key/year
/// order and resolved one-to-one. Leftovers carry no template or association.
pub fn match_fuzzy(
    incoming: &AggregatedSet,
    existing: &AggregatedSet,
    params: &MatchingConfig,
) -> MatchOutput {
    let inc = flatten(incoming);
    let ex = flatten(existing);
    let corr = resolve(&inc, &ex, params);

    MatchOutput {
        matched: corr
            .pairs
            .iter()
            .map(|p| MatchedPair {
                incoming: inc[p.incoming].clone(),
                existing: ex[p.existing].clone(),
                phase: MatchPhase::Fuzzy,
                score: Some(p.score),
            })
            .collect(),
        unmatched_incoming: corr
            .incoming_only
            .iter()
            .map(|&i| UnmatchedIncoming {
                entry: inc[i].clone(),
                template: None,
            })
            .collect(),
        unmatched_existing: corr
            .existing_only
            .iter()
            .map(|&i| UnmatchedExisting {
                entry: ex[i].clone(),
                nearest_incoming: None,
            })
            .collect(),
    }
}
