//! Title canonicalization.
//!
//! A canonical key is the sorted, lightly stemmed list of lowercase
//! alphanumeric tokens of a title. Word order never matters:
//! "Certified Solutions Architect" and "Solutions Architect Certified"
//! produce the same key.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::CanonicalKey;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));

/// Lowercase alphanumeric tokens of `value`, in order of appearance.
pub fn tokens(value: &str) -> Vec<String> {
    let lowered = value.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Canonical key for a title. Blank titles yield an empty key.
pub fn canonicalize(title: &str) -> CanonicalKey {
    let mut stems: Vec<String> = tokens(title).iter().map(|t| stem(t)).collect();
    stems.sort();
    CanonicalKey::from_normalized(stems.join(" "))
}

/// Suffix rules. Each guard is on the token length before the rule fires,
/// so short words ("bed", "its", "ring") pass through untouched.
fn stem(token: &str) -> String {
    let mut t = token.to_string();

    if t.ends_with("ity") && t.len() > 4 {
        t.truncate(t.len() - 3);
        t.push('e');
    }

    if t.ends_with("ing") && t.len() > 4 {
        t.truncate(t.len() - 3);
    } else if t.ends_with("ies") && t.len() > 4 {
        t.truncate(t.len() - 3);
        t.push('y');
    } else if t.ends_with("ied") && t.len() > 4 {
        t.truncate(t.len() - 3);
        t.push('y');
    } else if t.ends_with("ed") && t.len() > 3 && !token.ends_with("eed") {
        t.truncate(t.len() - 2);
    }

    if t.ends_with('s') && t.len() > 3 {
        t.pop();
    }

    t
}
