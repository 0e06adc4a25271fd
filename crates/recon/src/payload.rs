//! Write payloads for the HR platform's training endpoint.
//!
//! The target API stores each date under several aliases and expects a
//! time suffix on every date; both are reproduced here so a writer can send
//! the map as-is.

use serde_json::{Map, Value};

use crate::config::PayloadConfig;
use crate::derived::derived_expiry_note;
use crate::model::{
    CreatePlan, FieldValue, RawRecord, SyncField, SyncOperation, Translation, UpdatePlan,
};

pub type Payload = Map<String, Value>;

const COMPLETED_KEYS: [&str; 4] = ["completedWhen", "completedDate", "completionDate", "date"];
const EXPIRES_KEYS: [&str; 3] = ["expiresWhen", "expirationDate", "expireDate"];

fn stamp(date: &str, config: &PayloadConfig) -> Value {
    Value::String(format!("{date}{}", config.date_suffix))
}

fn put_dates(payload: &mut Payload, keys: &[&str], value: Value) {
    for key in keys {
        payload.insert((*key).to_string(), value.clone());
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn put_template_ids(payload: &mut Payload, record: &RawRecord) {
    if let Some(id) = record.passthrough.company_training_id {
        payload.insert("companyTrainingId".into(), Value::from(id));
    }
    if let Some(ref code) = record.passthrough.code {
        payload.insert("code".into(), Value::from(code.clone()));
    }
}

fn translation_entry(
    translation: &Translation,
    title: &str,
    issuer: &str,
    keep_own: bool,
) -> Value {
    let mut entry = Map::new();
    if let Some(id) = translation.profile_translation_id {
        entry.insert("profileTranslationId".into(), Value::from(id));
    }
    if let Some(id) = translation.language_id {
        entry.insert("languageId".into(), Value::from(id));
    }

    let own_title = non_blank(translation.title.as_deref()).filter(|_| keep_own);
    entry.insert("title".into(), Value::from(own_title.unwrap_or(title)));

    let own_issuer = non_blank(translation.issuer.as_deref()).filter(|_| keep_own);
    if let Some(issuer) = own_issuer.or(non_blank(Some(issuer))) {
        entry.insert("issuer".into(), Value::from(issuer));
    }

    for (key, value) in [
        ("supplier", &translation.supplier),
        ("description", &translation.description),
    ] {
        if let Some(v) = value {
            entry.insert(key.into(), Value::from(v.clone()));
        }
    }
    if keep_own {
        if let Some(ref name) = translation.name {
            entry.insert("name".into(), Value::from(name.clone()));
        }
    }
    Value::Object(entry)
}

fn proposed_text(update: &UpdatePlan, field: SyncField) -> Option<Option<String>> {
    update.diff(field).map(|d| {
        d.proposed
            .as_ref()
            .and_then(FieldValue::as_text)
            .map(str::to_string)
    })
}

/// Full replacement payload for an update: unchanged fields are echoed from
/// the target so the write does not blank them.
pub fn build_update_payload(update: &UpdatePlan, config: &PayloadConfig) -> Payload {
    let mut payload = Payload::new();
    let target = update.existing.primary().cloned().unwrap_or_default();

    if let Some(kind) = target.kind {
        payload.insert("trainingType".into(), Value::from(kind.training_type()));
    }
    put_template_ids(&mut payload, &target);
    payload.insert(
        "saveTo".into(),
        Value::from(
            non_blank(target.passthrough.save_to.as_deref())
                .unwrap_or(&config.default_save_to),
        ),
    );

    let completed = proposed_text(update, SyncField::IssueDate)
        .flatten()
        .or_else(|| target.issue_date.as_ref().map(|d| d.as_str().to_string()));
    if let Some(ref date) = completed {
        put_dates(&mut payload, &COMPLETED_KEYS, stamp(date, config));
    }

    let expires = proposed_text(update, SyncField::ExpiryDate)
        .flatten()
        .or_else(|| target.expiry_date.as_ref().map(|d| d.as_str().to_string()));
    if let Some(ref date) = expires {
        put_dates(&mut payload, &EXPIRES_KEYS, stamp(date, config));
    }

    match update.diff(SyncField::Year) {
        Some(d) => {
            let year = match d.proposed {
                Some(FieldValue::Year(y)) => Value::from(y),
                _ => Value::Null,
            };
            payload.insert("year".into(), year);
        }
        None => {
            if let Some(y) = target.resolved_year() {
                payload.insert("year".into(), Value::from(y));
            }
        }
    }

    let title_changed = update.diff(SyncField::Title).is_some();
    let title = proposed_text(update, SyncField::Title)
        .flatten()
        .unwrap_or_else(|| target.title.trim().to_string());
    payload.insert("title".into(), Value::from(title.clone()));

    let issuer_changed = update.diff(SyncField::Issuer).is_some();
    let issuer = proposed_text(update, SyncField::Issuer)
        .flatten()
        .or_else(|| non_blank(Some(&target.issuer)).map(str::to_string))
        .or_else(|| non_blank(target.passthrough.provider.as_deref()).map(str::to_string))
        .unwrap_or_default();
    if !issuer.is_empty() {
        payload.insert("issuer".into(), Value::from(issuer.clone()));
    }

    let name = if title_changed {
        title.clone()
    } else {
        non_blank(target.passthrough.name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| title.clone())
    };
    if !name.is_empty() {
        payload.insert("name".into(), Value::from(name));
    }

    let translations: Vec<Value> = target
        .passthrough
        .translations
        .iter()
        .map(|t| {
            let mut entry = translation_entry(t, &title, &issuer, true);
            if let Value::Object(ref mut map) = entry {
                if title_changed {
                    map.insert("title".into(), Value::from(title.clone()));
                }
                if issuer_changed && !issuer.is_empty() {
                    map.insert("issuer".into(), Value::from(issuer.clone()));
                }
            }
            entry
        })
        .collect();
    if !translations.is_empty() {
        payload.insert("translations".into(), Value::Array(translations));
    }

    if let Some(description) = proposed_text(update, SyncField::Description).flatten() {
        payload.insert("description".into(), Value::from(description));
    }

    payload
}

/// Payload for a new training, seeded from the template record if any.
pub fn build_create_payload(create: &CreatePlan, config: &PayloadConfig) -> Payload {
    let mut payload = Payload::new();
    let fields = &create.fields;
    let template = create.template.as_ref();

    let provider = non_blank(Some(&fields.issuer))
        .or_else(|| template.and_then(|t| non_blank(t.passthrough.provider.as_deref())))
        .unwrap_or("");

    payload.insert("trainingType".into(), Value::from(fields.category.training_type()));
    payload.insert("title".into(), Value::from(fields.title.clone()));
    payload.insert("name".into(), Value::from(fields.title.clone()));
    payload.insert("issuer".into(), Value::from(fields.issuer.clone()));
    payload.insert("provider".into(), Value::from(provider));
    payload.insert(
        "saveTo".into(),
        Value::from(
            template
                .and_then(|t| non_blank(t.passthrough.save_to.as_deref()))
                .unwrap_or(&config.default_save_to),
        ),
    );
    if let Some(t) = template {
        put_template_ids(&mut payload, t);
    }
    if let Some(y) = fields.year {
        payload.insert("year".into(), Value::from(y));
    }
    if let Some(ref d) = fields.issue_date {
        put_dates(&mut payload, &COMPLETED_KEYS, stamp(d.as_str(), config));
    }
    if let Some(ref d) = fields.expiry_date {
        put_dates(&mut payload, &EXPIRES_KEYS, stamp(d.as_str(), config));
        if fields.expiry_derived {
            payload.insert(
                "description".into(),
                Value::from(derived_expiry_note(d, fields.issue_date.as_ref())),
            );
        }
    }

    let translations: Vec<Value> = template
        .map(|t| t.passthrough.translations.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|t| translation_entry(t, &fields.title, &fields.issuer, false))
        .collect();
    if !translations.is_empty() {
        payload.insert("translations".into(), Value::Array(translations));
    }

    payload
}

pub fn build_payload(op: &SyncOperation, config: &PayloadConfig) -> Payload {
    match op {
        SyncOperation::Update(u) => build_update_payload(u, config),
        SyncOperation::Create(c) => build_create_payload(c, config),
    }
}
