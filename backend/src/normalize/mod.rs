//! Value normalizer: classify raw cell strings into typed values.
//!
//! Spreadsheet exports mix real numbers, percentages in two notations
//! (`54.3%` and `0.543`), locale decimal commas, thousands separators,
//! currency symbols and dash placeholders. Everything here is a pure
//! function of the input string.
//!
//! | Raw        | Kind    | Numeric |
//! |------------|---------|---------|
//! | `""`, `—`  | empty   | -       |
//! | `54.3%`    | numeric | 0.543   |
//! | `0.543`    | numeric | 0.543   |
//! | `54,3%`    | numeric | 0.543   |
//! | `1,234`    | numeric | 1234    |
//! | `$12`      | numeric | 12      |
//! | `Alpha  B` | text    | -       |

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{TypedValue, ValueKind};

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(\d+(\.\d*)?|\.\d+)([eE][-+]?\d+)?$").expect("number pattern is valid")
});

/// Cell contents that stand for "no value".
const PLACEHOLDERS: [&str; 4] = ["", "—", "-", "–"];

const CURRENCY: [char; 4] = ['$', '€', '£', '¥'];

const DASH_GLYPHS: [char; 2] = ['—', '–'];

/// Strip carriage returns, map NBSP and full-width percent, trim.
pub fn clean(raw: &str) -> String {
    raw.replace('\r', "")
        .replace('\u{00A0}', " ")
        .replace('％', "%")
        .trim()
        .to_string()
}

/// True for empty cells and dash placeholders.
pub fn is_placeholder(raw: &str) -> bool {
    let c = clean(raw);
    PLACEHOLDERS.contains(&c.as_str()) || c.chars().all(|ch| ch.is_whitespace() || DASH_GLYPHS.contains(&ch))
}

/// Lower-case and collapse internal whitespace to single spaces.
pub fn normalize_text(raw: &str) -> String {
    clean(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse a cell as a number.
///
/// Returns the value and whether a dash glyph had to be stripped to get it.
pub fn parse_number(raw: &str) -> Option<(f64, bool)> {
    let cleaned = clean(raw);
    if is_placeholder(&cleaned) {
        return None;
    }

    let percent = cleaned.ends_with('%');
    let dash_derived = cleaned.chars().any(|c| DASH_GLYPHS.contains(&c));

    let stripped: String = cleaned
        .chars()
        .map(|c| if c == '−' { '-' } else { c })
        .filter(|c| *c != '%' && !CURRENCY.contains(c) && !DASH_GLYPHS.contains(c))
        .collect();
    let stripped = resolve_commas(stripped.trim());

    if !NUMBER_RE.is_match(&stripped) {
        return None;
    }
    let mut value: f64 = stripped.parse().ok()?;

    if percent && value.abs() > 1.0 {
        // Shift the decimal point in the literal so 54.3% lands on the
        // same f64 as 0.543.
        value = if stripped.contains(['e', 'E']) {
            value / 100.0
        } else {
            format!("{}e-2", stripped).parse().ok()?
        };
    }

    if !value.is_finite() {
        return None;
    }
    Some((value, dash_derived))
}

/// Numeric value of a cell, if it has one.
pub fn to_number(raw: &str) -> Option<f64> {
    parse_number(raw).map(|(v, _)| v)
}

/// Classify a raw cell.
pub fn classify(raw: &str) -> TypedValue {
    if is_placeholder(raw) {
        return TypedValue::empty();
    }
    let text = normalize_text(raw);
    match parse_number(raw) {
        Some((n, dash_derived)) => TypedValue {
            kind: ValueKind::Numeric,
            numeric: Some(n),
            text,
            dash_derived,
        },
        None => TypedValue {
            kind: ValueKind::Text,
            numeric: None,
            text,
            dash_derived: false,
        },
    }
}

/// Decide whether commas are thousands separators or a decimal comma.
fn resolve_commas(s: &str) -> String {
    let commas = s.matches(',').count();
    if commas == 0 {
        return s.to_string();
    }
    if s.contains('.') || commas > 1 {
        return s.replace(',', "");
    }

    let (int_part, frac_part) = s.split_once(',').unwrap_or((s, ""));
    let int_digits = int_part.trim_start_matches(['-', '+']);
    let thousands = frac_part.len() == 3
        && frac_part.chars().all(|c| c.is_ascii_digit())
        && !int_digits.is_empty()
        && int_digits.chars().all(|c| c.is_ascii_digit())
        && !int_digits.starts_with('0');

    if thousands {
        s.replace(',', "")
    } else {
        s.replacen(',', ".", 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_round_trip() {
        assert_eq!(classify("54.3%").numeric, Some(0.543));
        assert_eq!(classify("0.543").numeric, Some(0.543));
        assert_eq!(classify("—").kind, ValueKind::Empty);
        assert_eq!(classify("1,234").numeric, Some(1234.0));
    }

    #[test]
    fn test_placeholders_are_empty() {
        for raw in ["", "  ", "-", "–", "—", "\r"] {
            assert!(classify(raw).is_empty(), "{:?} should be empty", raw);
        }
    }

    #[test]
    fn test_locale_decimal_comma() {
        assert_eq!(to_number("54,3%"), Some(0.543));
        assert_eq!(to_number("0,543"), Some(0.543));
        assert_eq!(to_number("12,5"), Some(12.5));
        assert_eq!(to_number("1,234,567"), Some(1234567.0));
        assert_eq!(to_number("1,234.5"), Some(1234.5));
    }

    #[test]
    fn test_small_percent_kept() {
        // Magnitude not above 1: already a ratio.
        assert_eq!(to_number("0.5%"), Some(0.5));
        assert_eq!(to_number("100%"), Some(1.0));
        assert_eq!(to_number("-54.3%"), Some(-0.543));
    }

    #[test]
    fn test_currency_and_fullwidth() {
        assert_eq!(to_number("$12"), Some(12.0));
        assert_eq!(to_number("€1,500"), Some(1500.0));
        assert_eq!(to_number("47.1％"), Some(0.471));
        assert_eq!(to_number("\u{00A0}8\r"), Some(8.0));
    }

    #[test]
    fn test_dash_derived_zero() {
        let v = classify("—0");
        assert_eq!(v.numeric, Some(0.0));
        assert!(v.dash_derived);
        assert!(!classify("0").dash_derived);
    }

    #[test]
    fn test_text_normalized() {
        let v = classify("  Alpha   Team\tB ");
        assert_eq!(v.kind, ValueKind::Text);
        assert_eq!(v.text, "alpha team b");
        assert_eq!(classify("A10").kind, ValueKind::Text);
        assert_eq!(classify("12abc").kind, ValueKind::Text);
    }
}
