//! Input adapters: native exports → `RawRecord`s.
//!
//! CSV exports go through the source's column mapping. JSON is read as the
//! HR platform's profile export, where most fields live either on the
//! training itself or on its first translation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use credsync_recon::config::{ColumnMapping, SourceConfig};
use credsync_recon::model::{
    parse_year, CredentialKind, IsoDate, Passthrough, RawRecord, Translation,
};
use credsync_recon::SyncError;

/// Load one side's records, choosing the format from the file extension.
pub fn load_source(path: &Path, source: &SourceConfig) -> Result<Vec<RawRecord>, SyncError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| SyncError::Io(format!("cannot read {}: {e}", path.display())))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let records = if is_json {
        load_profile_json(&source.label, &data)?
    } else {
        load_csv_records(&source.label, &data, &source.columns)?
    };
    debug!(source = %source.label, records = records.len(), path = %path.display(), "loaded input");
    Ok(records)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Header row of a CSV export, trimmed the same way loading trims it.
pub fn csv_headers(csv_data: &str) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

/// Parse a CSV export. At least one of the mapped title columns must exist;
/// every other mapped column may be absent and then reads as blank. Columns
/// the mapping does not mention are kept in `passthrough.extra`.
pub fn load_csv_records(
    source_label: &str,
    csv_data: &str,
    columns: &ColumnMapping,
) -> Result<Vec<RawRecord>, SyncError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| invalid(source_label, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let idx = |name: &Option<String>| -> Option<usize> {
        name.as_ref()
            .and_then(|n| headers.iter().position(|h| h == n))
    };

    let title_idx: Vec<usize> = columns
        .title
        .iter()
        .filter_map(|name| headers.iter().position(|h| h == name))
        .collect();
    if title_idx.is_empty() {
        return Err(SyncError::MissingColumn {
            source_label: source_label.into(),
            column: columns.title.join(" | "),
        });
    }

    let issuer_idx = idx(&columns.issuer);
    let issue_idx = idx(&columns.issue_date);
    let expiry_idx = idx(&columns.expiry_date);
    let year_idx = idx(&columns.year);
    let id_idx = idx(&columns.id);
    let kind_idx = idx(&columns.kind);
    let name_idx = idx(&columns.name);
    let description_idx = idx(&columns.description);

    let mapped: Vec<usize> = title_idx
        .iter()
        .copied()
        .chain(
            [
                issuer_idx,
                issue_idx,
                expiry_idx,
                year_idx,
                id_idx,
                kind_idx,
                name_idx,
                description_idx,
            ]
            .into_iter()
            .flatten(),
        )
        .collect();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|e| invalid(source_label, e))?;
        let cell = |i: Option<usize>| -> &str {
            i.and_then(|i| record.get(i)).map(str::trim).unwrap_or("")
        };

        let title = title_idx
            .iter()
            .map(|&i| cell(Some(i)))
            .find(|v| !v.is_empty())
            .unwrap_or("");

        let source_id = match cell(id_idx) {
            "" => format!("{source_label}:{}", row + 1),
            id => id.to_string(),
        };

        let extra: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !mapped.contains(i))
            .filter_map(|(i, h)| {
                let v = record.get(i)?.trim();
                (!v.is_empty()).then(|| (h.clone(), v.to_string()))
            })
            .collect();

        records.push(RawRecord {
            source_id,
            title: title.to_string(),
            issuer: cell(issuer_idx).to_string(),
            issue_date: IsoDate::parse(cell(issue_idx)),
            expiry_date: IsoDate::parse(cell(expiry_idx)),
            year: parse_year(cell(year_idx)),
            kind: parse_kind(cell(kind_idx)),
            expiry_derived: false,
            passthrough: Passthrough {
                name: non_blank(cell(name_idx)),
                description: non_blank(cell(description_idx)),
                extra,
                ..Passthrough::default()
            },
        });
    }

    Ok(records)
}

/// `trainingType` codes or kind names.
fn parse_kind(raw: &str) -> Option<CredentialKind> {
    if let Ok(code) = raw.parse::<i64>() {
        return CredentialKind::from_training_type(code);
    }
    match raw.to_ascii_lowercase().as_str() {
        "certification" => Some(CredentialKind::Certification),
        "course" => Some(CredentialKind::Course),
        _ => None,
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

fn invalid(source_label: &str, err: impl std::fmt::Display) -> SyncError {
    SyncError::InvalidInput {
        source_label: source_label.into(),
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// HR profile JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HrTraining {
    id: Option<Value>,
    title: Option<String>,
    name: Option<String>,
    issuer: Option<String>,
    provider: Option<String>,
    description: Option<String>,
    completed_when: Option<String>,
    completed_date: Option<String>,
    completion_date: Option<String>,
    date: Option<String>,
    expires_when: Option<String>,
    expiration_date: Option<String>,
    expire_date: Option<String>,
    year: Option<Value>,
    training_type: Option<Value>,
    company_training_id: Option<Value>,
    code: Option<Value>,
    save_to: Option<String>,
    translations: Option<Vec<HrTranslation>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HrTranslation {
    profile_translation_id: Option<i64>,
    language_id: Option<i64>,
    profile_translation: Option<HrProfileTranslation>,
    title: Option<String>,
    name: Option<String>,
    issuer: Option<String>,
    provider: Option<String>,
    supplier: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HrProfileTranslation {
    language_branch: Option<HrLanguageBranch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HrLanguageBranch {
    language_id: Option<i64>,
    language: Option<HrLanguage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HrLanguage {
    language_id: Option<i64>,
}

impl HrTranslation {
    fn language(&self) -> Option<i64> {
        self.language_id.or_else(|| {
            let branch = self.profile_translation.as_ref()?.language_branch.as_ref()?;
            branch
                .language_id
                .or_else(|| branch.language.as_ref()?.language_id)
        })
    }

    fn into_translation(self) -> Translation {
        Translation {
            language_id: self.language(),
            profile_translation_id: self.profile_translation_id,
            title: self.title,
            issuer: self.issuer,
            supplier: self.supplier,
            description: self.description,
            name: self.name,
        }
    }
}

/// First non-blank candidate.
fn first_of<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer from a number or a numeric string.
fn value_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn hr_record(source_label: &str, index: usize, training: HrTraining) -> RawRecord {
    let first = training.translations.as_ref().and_then(|t| t.first());

    let name = first_of([
        first.and_then(|t| t.name.as_deref()),
        first.and_then(|t| t.title.as_deref()),
        training.name.as_deref(),
    ]);
    let title = first_of([
        first.and_then(|t| t.title.as_deref()),
        training.title.as_deref(),
        name,
    ])
    .unwrap_or("");
    let issuer = first_of([
        first.and_then(|t| t.issuer.as_deref()),
        first.and_then(|t| t.provider.as_deref()),
        training.issuer.as_deref(),
        training.provider.as_deref(),
    ])
    .unwrap_or("");
    let completed = first_of([
        training.completed_when.as_deref(),
        training.completed_date.as_deref(),
        training.completion_date.as_deref(),
        training.date.as_deref(),
    ]);
    let expires = first_of([
        training.expires_when.as_deref(),
        training.expiration_date.as_deref(),
        training.expire_date.as_deref(),
    ]);
    let year = match training.year {
        Some(Value::Number(ref n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(ref s)) => parse_year(s),
        _ => None,
    };
    let source_id = training
        .id
        .as_ref()
        .and_then(value_text)
        .unwrap_or_else(|| format!("{source_label}:{}", index + 1));

    let title = title.to_string();
    let issuer = issuer.to_string();
    let issue_date = completed.and_then(IsoDate::parse);
    let expiry_date = expires.and_then(IsoDate::parse);
    let name = name.map(str::to_string);

    RawRecord {
        source_id,
        title,
        issuer,
        issue_date,
        expiry_date,
        year,
        kind: training
            .training_type
            .as_ref()
            .and_then(value_int)
            .and_then(CredentialKind::from_training_type),
        expiry_derived: false,
        passthrough: Passthrough {
            name,
            description: training.description,
            provider: training.provider,
            company_training_id: training.company_training_id.as_ref().and_then(value_int),
            code: training.code.as_ref().and_then(value_text),
            save_to: training.save_to,
            translations: training
                .translations
                .unwrap_or_default()
                .into_iter()
                .map(HrTranslation::into_translation)
                .collect(),
            extra: BTreeMap::new(),
        },
    }
}

/// Parse the HR platform's profile export: a bare array of trainings, or an
/// object holding them under `training` or `trainings`.
pub fn load_profile_json(source_label: &str, json_data: &str) -> Result<Vec<RawRecord>, SyncError> {
    let root: Value = serde_json::from_str(json_data).map_err(|e| invalid(source_label, e))?;

    let list = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("training").or_else(|| map.remove("trainings")) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(invalid(source_label, "trainings must be an array"));
            }
        },
        _ => {
            return Err(invalid(
                source_label,
                "expected an array of trainings or a profile object",
            ))
        }
    };

    list.into_iter()
        .enumerate()
        .map(|(i, item)| {
            let training: HrTraining = serde_json::from_value(item)
                .map_err(|e| invalid(source_label, format!("training #{}: {e}", i + 1)))?;
            Ok(hr_record(source_label, i, training))
        })
        .collect()
}
