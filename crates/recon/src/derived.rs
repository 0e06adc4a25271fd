use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::ExpiryRule;
use crate::model::{CredentialKind, IsoDate, RawRecord};

static DERIVED_NOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Expiry auto-derived:[^\n]*").expect("static regex"));

/// `date` moved forward by whole years; Feb 29 lands on Feb 28.
fn add_years(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    let target = date.year().checked_add(i32::try_from(years).ok()?)?;
    date.with_year(target)
        .or_else(|| NaiveDate::from_ymd_opt(target, 2, 28))
}

/// Fill missing expiry dates on course records whose issuer matches a rule.
/// The computed expiry is flagged as derived. Records that already carry an
/// expiry, certifications, and unparseable issue dates are left alone.
pub fn apply_expiry_rules(records: &mut [RawRecord], rules: &[ExpiryRule]) -> usize {
    if rules.is_empty() {
        return 0;
    }
    let mut derived = 0;

    for record in records.iter_mut() {
        if record.expiry_date.is_some()
            || CredentialKind::from_title(&record.title) != CredentialKind::Course
        {
            continue;
        }
        let Some(ref issued) = record.issue_date else {
            continue;
        };
        let issuer = record.issuer.to_lowercase();
        let Some(rule) = rules
            .iter()
            .find(|r| issuer.contains(&r.issuer_contains.to_lowercase()))
        else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(issued.as_str(), "%Y-%m-%d") else {
            continue;
        };
        let Some(expiry) = add_years(date, rule.years) else {
            continue;
        };

        record.expiry_date = IsoDate::parse(&expiry.format("%Y-%m-%d").to_string());
        record.expiry_derived = true;
        derived += 1;
    }

    if derived > 0 {
        debug!(derived, "derived missing expiry dates");
    }
    derived
}

/// Human note recorded alongside a derived expiry.
pub fn derived_expiry_note(expiry: &IsoDate, issued: Option<&IsoDate>) -> String {
    match issued {
        Some(issued) => {
            let years = match (expiry.year(), issued.year()) {
                (Some(e), Some(i)) if e > i => (e - i).to_string(),
                _ => "some".to_string(),
            };
            format!("Expiry auto-derived: set to {expiry} ({years} years after issue date {issued}).")
        }
        None => format!("Expiry auto-derived: set to {expiry} (after unknown issue date)."),
    }
}

/// Existing description with the derived-expiry note inserted or refreshed.
/// Returns `None` when the note is already present.
pub fn merge_description(current: Option<&str>, note: &str) -> Option<String> {
    let current = current.unwrap_or("").trim();
    if current.contains(note) {
        return None;
    }
    if DERIVED_NOTE_RE.is_match(current) {
        return Some(DERIVED_NOTE_RE.replace(current, note).into_owned());
    }
    if current.is_empty() {
        Some(note.to_string())
    } else {
        Some(format!("{current}\n\n{note}"))
    }
}
