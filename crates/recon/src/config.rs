use serde::{Deserialize, Serialize};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "SourceConfig::default_incoming")]
    pub incoming: SourceConfig,
    #[serde(default = "SourceConfig::default_existing")]
    pub existing: SourceConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub expiry_rules: Vec<ExpiryRule>,
}

fn default_name() -> String {
    "credential-sync".into()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            incoming: SourceConfig::default_incoming(),
            existing: SourceConfig::default_existing(),
            scope: ScopeConfig::default(),
            matching: MatchingConfig::default(),
            payload: PayloadConfig::default(),
            expiry_rules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One system of record and how its native columns map onto record fields.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub label: String,
    pub columns: ColumnMapping,
}

impl SourceConfig {
    /// Badge-issuance export layout.
    pub fn default_incoming() -> Self {
        Self {
            label: "badges".into(),
            columns: ColumnMapping {
                title: vec!["Badge Title".into()],
                issuer: Some("Issuer".into()),
                issue_date: Some("Issue Date".into()),
                expiry_date: Some("Expiry Date".into()),
                year: None,
                id: None,
                kind: None,
                name: None,
                description: None,
            },
        }
    }

    /// HR-platform trainings export layout.
    pub fn default_existing() -> Self {
        Self {
            label: "trainings".into(),
            columns: ColumnMapping {
                title: vec!["title".into(), "name".into()],
                issuer: Some("issuer".into()),
                issue_date: Some("completedWhen".into()),
                expiry_date: Some("expireDate".into()),
                year: Some("year".into()),
                id: Some("id".into()),
                kind: Some("trainingType".into()),
                name: Some("name".into()),
                description: Some("description".into()),
            },
        }
    }
}

/// Native column names. `title` is a fallback list: the first non-blank
/// value wins. Optional columns that are absent from the input read as blank.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    pub title: Vec<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Scope + Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Only reconcile entries whose titles mention "certified".
    #[serde(default = "default_true")]
    pub certified_only: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self { certified_only: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Canonical key + year buckets, exact then fallback pairing.
    Grouped,
    /// Token-key overlap and string similarity across divergent keys.
    Fuzzy,
}

impl Default for MatchStrategy {
    fn default() -> Self {
        Self::Grouped
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grouped => write!(f, "grouped"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub strategy: MatchStrategy,
    /// Year distance charged when exactly one side's year is unknown.
    #[serde(default = "default_unknown_year_penalty")]
    pub unknown_year_penalty: u32,
    #[serde(default = "default_shared_key_weight")]
    pub shared_key_weight: f64,
    #[serde(default = "default_category_bonus")]
    pub category_bonus: f64,
    /// Minimum similarity ratio for the unindexed fallback scan.
    #[serde(default = "default_fallback_min_ratio")]
    pub fallback_min_ratio: f64,
}

fn default_unknown_year_penalty() -> u32 {
    10_000
}

fn default_shared_key_weight() -> f64 {
    5.0
}

fn default_category_bonus() -> f64 {
    0.2
}

fn default_fallback_min_ratio() -> f64 {
    0.92
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::default(),
            unknown_year_penalty: default_unknown_year_penalty(),
            shared_key_weight: default_shared_key_weight(),
            category_bonus: default_category_bonus(),
            fallback_min_ratio: default_fallback_min_ratio(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload + Expiry rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadConfig {
    /// Appended to every `YYYY-MM-DD` date in write payloads.
    #[serde(default = "default_date_suffix")]
    pub date_suffix: String,
    #[serde(default = "default_save_to")]
    pub default_save_to: String,
}

fn default_date_suffix() -> String {
    "T00:00:00".into()
}

fn default_save_to() -> String {
    "Profile".into()
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            date_suffix: default_date_suffix(),
            default_save_to: default_save_to(),
        }
    }
}

/// Fill a missing incoming expiry for course badges from one issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpiryRule {
    /// Case-insensitive substring of the issuer name.
    pub issuer_contains: String,
    pub years: u32,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, SyncError> {
        let config: SyncConfig =
            toml::from_str(input).map_err(|e| SyncError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        for source in [&self.incoming, &self.existing] {
            if source.label.trim().is_empty() {
                return Err(SyncError::ConfigValidation(
                    "source label must not be empty".into(),
                ));
            }
            if source.columns.title.iter().all(|c| c.trim().is_empty()) {
                return Err(SyncError::ConfigValidation(format!(
                    "source '{}': at least one title column is required",
                    source.label
                )));
            }
        }

        if self.incoming.label == self.existing.label {
            return Err(SyncError::ConfigValidation(format!(
                "incoming and existing sources share the label '{}'",
                self.incoming.label
            )));
        }

        let m = &self.matching;
        if !(m.fallback_min_ratio > 0.0 && m.fallback_min_ratio <= 1.0) {
            return Err(SyncError::ConfigValidation(format!(
                "fallback_min_ratio must be in (0, 1], got {}",
                m.fallback_min_ratio
            )));
        }
        if !(m.shared_key_weight > 0.0) {
            return Err(SyncError::ConfigValidation(format!(
                "shared_key_weight must be positive, got {}",
                m.shared_key_weight
            )));
        }
        if m.category_bonus < 0.0 {
            return Err(SyncError::ConfigValidation(format!(
                "category_bonus must not be negative, got {}",
                m.category_bonus
            )));
        }

        for rule in &self.expiry_rules {
            if rule.issuer_contains.trim().is_empty() {
                return Err(SyncError::ConfigValidation(
                    "expiry rule needs a non-empty issuer_contains".into(),
                ));
            }
            if rule.years == 0 {
                return Err(SyncError::ConfigValidation(format!(
                    "expiry rule for '{}': years must be at least 1",
                    rule.issuer_contains
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
