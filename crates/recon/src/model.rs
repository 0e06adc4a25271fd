use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MatchStrategy;

/// Four-digit calendar year.
pub type Year = i32;

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// A `YYYY-MM-DD` date string. Richer timestamps are truncated to their
/// first ten characters, so plain string ordering is chronological.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsoDate(String);

impl IsoDate {
    /// Trim and truncate a raw date/time value. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.chars().take(10).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Year taken from the first four characters, when they are all digits.
    pub fn year(&self) -> Option<Year> {
        let prefix = self.0.get(..4)?;
        if prefix.chars().all(|c| c.is_ascii_digit()) {
            prefix.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for IsoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse an explicit year field. Anything other than exactly four digits
/// degrades to unknown.
pub fn parse_year(raw: &str) -> Option<Year> {
    let cleaned = raw.trim();
    if cleaned.len() == 4 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        cleaned.parse().ok()
    } else {
        None
    }
}

/// Order-independent, stemmed token signature of a title.
/// Only produced by [`crate::canonical::canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Course,
    Certification,
}

impl CredentialKind {
    /// "Certification" when the title mentions "certified", otherwise "Course".
    pub fn from_title(title: &str) -> Self {
        if title.to_lowercase().contains("certified") {
            Self::Certification
        } else {
            Self::Course
        }
    }

    /// Numeric training type used by the HR platform's write contract.
    pub fn training_type(self) -> i64 {
        match self {
            Self::Course => 0,
            Self::Certification => 1,
        }
    }

    pub fn from_training_type(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Course),
            1 => Some(Self::Certification),
            _ => None,
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Course => write!(f, "Course"),
            Self::Certification => write!(f, "Certification"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Localized sub-record attached to an HR-platform training.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_translation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Source-system fields the engine carries through untouched so that
/// payloads can echo them back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Passthrough {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_training_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<Translation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One record as delivered by an input adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub issue_date: Option<IsoDate>,
    #[serde(default)]
    pub expiry_date: Option<IsoDate>,
    #[serde(default)]
    pub year: Option<Year>,
    /// Credential kind declared by the source system, if it has one.
    #[serde(default)]
    pub kind: Option<CredentialKind>,
    #[serde(default)]
    pub expiry_derived: bool,
    #[serde(default)]
    pub passthrough: Passthrough,
}

impl RawRecord {
    pub fn new(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_issue_date(mut self, raw: &str) -> Self {
        self.issue_date = IsoDate::parse(raw);
        self
    }

    pub fn with_expiry_date(mut self, raw: &str) -> Self {
        self.expiry_date = IsoDate::parse(raw);
        self
    }

    pub fn with_year(mut self, year: Option<Year>) -> Self {
        self.year = year;
        self
    }

    pub fn with_kind(mut self, kind: CredentialKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Explicit year first, then the issue date's year, else unknown.
    pub fn resolved_year(&self) -> Option<Year> {
        self.year
            .or_else(|| self.issue_date.as_ref().and_then(IsoDate::year))
    }
}

/// Pre-loaded records for both sides of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncInput {
    #[serde(default)]
    pub incoming: Vec<RawRecord>,
    #[serde(default)]
    pub existing: Vec<RawRecord>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// All records sharing one (canonical key, year) bucket, collapsed into
/// representative values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEntry {
    pub key: CanonicalKey,
    pub year: Option<Year>,
    pub preferred_title: String,
    pub title_variants: BTreeSet<String>,
    pub issuer: String,
    pub issue_date: Option<IsoDate>,
    pub expiry_date: Option<IsoDate>,
    /// The representative expiry was computed, not reported by the source.
    pub expiry_derived: bool,
    pub certified: bool,
    /// Declared kind of the first member, if the source declares kinds.
    pub kind: Option<CredentialKind>,
    pub members: Vec<RawRecord>,
}

impl AggregatedEntry {
    pub fn primary(&self) -> Option<&RawRecord> {
        self.members.first()
    }

    /// Source identifier of the record an update would target.
    pub fn source_id(&self) -> &str {
        self.primary().map(|r| r.source_id.as_str()).unwrap_or("")
    }

    /// Declared kind, falling back to the title-derived category.
    pub fn category(&self) -> CredentialKind {
        self.kind.unwrap_or(if self.certified {
            CredentialKind::Certification
        } else {
            CredentialKind::Course
        })
    }
}

/// Canonical key → entries, ascending year with unknown last.
pub type AggregatedSet = BTreeMap<CanonicalKey, Vec<AggregatedEntry>>;

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Exact,
    Fallback,
    Fuzzy,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedPair {
    pub incoming: AggregatedEntry,
    pub existing: AggregatedEntry,
    pub phase: MatchPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedIncoming {
    pub entry: AggregatedEntry,
    /// Same-key existing entry usable as a structural template for creation.
    pub template: Option<AggregatedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedExisting {
    pub entry: AggregatedEntry,
    /// Nearest same-key incoming entry. Informational only; it is never
    /// acted on and several existing entries may point at the same one.
    pub nearest_incoming: Option<AggregatedEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutput {
    pub matched: Vec<MatchedPair>,
    pub unmatched_incoming: Vec<UnmatchedIncoming>,
    pub unmatched_existing: Vec<UnmatchedExisting>,
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncField {
    IssueDate,
    ExpiryDate,
    Year,
    Issuer,
    Title,
    Description,
}

impl fmt::Display for SyncField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IssueDate => write!(f, "issue_date"),
            Self::ExpiryDate => write!(f, "expiry_date"),
            Self::Year => write!(f, "year"),
            Self::Issuer => write!(f, "issuer"),
            Self::Title => write!(f, "title"),
            Self::Description => write!(f, "description"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Year(Year),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Year(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Year(y) => write!(f, "{y}"),
        }
    }
}

/// One changed field. `proposed: None` means the field is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: SyncField,
    pub current: Option<FieldValue>,
    pub proposed: Option<FieldValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePlan {
    pub target_id: String,
    /// Current title of the target, for display.
    pub title: String,
    pub diffs: Vec<FieldDiff>,
    pub incoming: AggregatedEntry,
    pub existing: AggregatedEntry,
}

impl UpdatePlan {
    pub fn diff(&self, field: SyncField) -> Option<&FieldDiff> {
        self.diffs.iter().find(|d| d.field == field)
    }
}

/// Complete field set for a new record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateFields {
    pub title: String,
    pub issuer: String,
    pub issue_date: Option<IsoDate>,
    pub expiry_date: Option<IsoDate>,
    pub year: Option<Year>,
    pub category: CredentialKind,
    pub expiry_derived: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlan {
    pub key: CanonicalKey,
    pub fields: CreateFields,
    pub template: Option<RawRecord>,
    pub incoming: AggregatedEntry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOperation {
    Update(UpdatePlan),
    Create(CreatePlan),
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub incoming_records: usize,
    pub existing_records: usize,
    pub skipped_records: usize,
    pub incoming_entries: usize,
    pub existing_entries: usize,
    pub matched: usize,
    pub in_sync: usize,
    pub updates: usize,
    pub creates: usize,
    pub unmatched_existing: usize,
    pub field_mismatches: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedOperation {
    pub operation: SyncOperation,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncMeta {
    pub config_name: String,
    pub strategy: MatchStrategy,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub meta: SyncMeta,
    pub summary: SyncSummary,
    pub operations: Vec<PlannedOperation>,
    pub matches: MatchOutput,
}
