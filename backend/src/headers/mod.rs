//! Header canonicalizer and de-duplicator.
//!
//! Merged multi-row headers collapse to a single flat row on export, so a
//! header cell may read `GENERAL STANDINGS GENERAL RANKING Regular Ranking`
//! where a human sees `Rank`. Rename rules map those phrases to short names;
//! de-duplication then makes every key in the row unique (`GP`, `GP_2`, ...).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::HeaderKey;
use crate::normalize::{clean, is_placeholder, normalize_text};

/// A header rename rule. Matching is case-insensitive on normalized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenameRule {
    /// Header equals `from` exactly.
    Equals { from: String, to: String },

    /// Header contains every phrase in `needles`.
    ContainsAll { needles: Vec<String>, to: String },

    /// Header starts with `prefix`; the prefix is removed.
    StripPrefix { prefix: String },
}

impl RenameRule {
    pub fn equals(from: &str, to: &str) -> Self {
        RenameRule::Equals {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn contains_all(needles: &[&str], to: &str) -> Self {
        RenameRule::ContainsAll {
            needles: needles.iter().map(|s| s.to_string()).collect(),
            to: to.to_string(),
        }
    }

    /// Apply to a cleaned header; `None` when the rule does not match.
    pub fn apply(&self, header: &str) -> Option<String> {
        let normalized = normalize_text(header);
        match self {
            RenameRule::Equals { from, to } => {
                (normalized == normalize_text(from)).then(|| to.clone())
            }
            RenameRule::ContainsAll { needles, to } => needles
                .iter()
                .all(|n| normalized.contains(&normalize_text(n)))
                .then(|| to.clone()),
            RenameRule::StripPrefix { prefix } => {
                let p = normalize_text(prefix);
                if p.is_empty() || !normalized.starts_with(&p) || normalized.len() == p.len() {
                    return None;
                }
                let kept = collapse(header)
                    .chars()
                    .skip(p.chars().count())
                    .collect::<String>();
                let kept = kept.trim();
                (!kept.is_empty()).then(|| kept.to_string())
            }
        }
    }
}

/// Rename rules for the merged headers found in league standings exports.
pub fn default_rules() -> Vec<RenameRule> {
    vec![
        RenameRule::contains_all(&["general standings general ranking", "regular ranking"], "Rank"),
        RenameRule::contains_all(&["weekly standings weekly ranking", "official ranking"], "Rank"),
        RenameRule::contains_all(&["points system", "w% points"], "W% points"),
        RenameRule::equals("weekly statistics fg%", "FG%"),
        RenameRule::equals("weekly statistics rankings fg%", "FG% Rank"),
    ]
}

/// Clean one raw header cell: first matching rule wins, otherwise the
/// whitespace-collapsed text. Placeholders become blank; en and em dashes
/// inside a label fold to `-`.
pub fn canonical_label(raw: &str, rules: &[RenameRule]) -> String {
    let cleaned = clean(raw);
    if is_placeholder(&cleaned) {
        return String::new();
    }
    let cleaned: String = cleaned
        .chars()
        .map(|c| if matches!(c, '–' | '—') { '-' } else { c })
        .collect();
    for rule in rules {
        if let Some(renamed) = rule.apply(&cleaned) {
            return renamed;
        }
    }
    collapse(&cleaned)
}

/// Canonicalize and de-duplicate a header row.
pub fn canonicalize(header_row: &[String], rules: &[RenameRule]) -> Vec<HeaderKey> {
    let labels: Vec<String> = header_row
        .iter()
        .map(|h| canonical_label(h, rules))
        .collect();
    dedup(&labels)
}

/// Assign unique keys, preserving first-occurrence order.
///
/// The first occurrence keeps the bare label, later ones get `_2`, `_3`, ...
/// Blank labels stay blank and are not counted.
pub fn dedup(labels: &[String]) -> Vec<HeaderKey> {
    let bare: HashSet<&str> = labels
        .iter()
        .map(String::as_str)
        .filter(|l| !l.is_empty())
        .collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();

    labels
        .iter()
        .map(|label| {
            if label.is_empty() {
                return HeaderKey::new("");
            }
            let count = seen.entry(label.as_str()).or_insert(0);
            *count += 1;

            let mut occurrence = *count;
            let mut key = HeaderKey::variant(label, occurrence);
            // A generated `X_2` must not steal a literal `X_2` elsewhere in the row.
            while occurrence > 1 && (used.contains(key.as_str()) || bare.contains(key.as_str())) {
                occurrence += 1;
                key = HeaderKey::variant(label, occurrence);
            }
            used.insert(key.as_str().to_string());
            key
        })
        .collect()
}

/// True if a raw cell canonically equals `label` (case-insensitive).
pub fn is_label(raw: &str, label: &str) -> bool {
    let cell = normalize_text(raw);
    !cell.is_empty() && cell == normalize_text(label)
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
