//! Domain models for the extraction engine.
//!
//! This module contains the core data structures used throughout the engine:
//!
//! - [`Grid`] - Raw rows × cells view of one spreadsheet export
//! - [`TypedValue`] - Classified cell value (empty, numeric, text)
//! - [`HeaderKey`] - De-duplicated, canonical column identifier
//! - [`Record`] / [`Table`] - Assembled logical table
//! - [`SectionBoundary`] - Half-open row range (and optional column span) of a section
//! - [`StatKey`] - Statistic identifier with polarity

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

// =============================================================================
// Grid
// =============================================================================

/// One row of raw cell strings. Position is the only identity.
pub type Row = Vec<String>;

/// Canonical in-memory view of one spreadsheet export.
///
/// Rows may be ragged; cells beyond a row's length read as empty.
/// Trailing fully-blank rows are removed on construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Ordered rows of raw cells.
    pub rows: Vec<Row>,
    /// Column label hints (JSON-table sources only, may be empty).
    #[serde(default)]
    pub column_labels: Vec<String>,
}

impl Grid {
    /// Build a grid, stripping trailing fully-blank rows.
    pub fn new(mut rows: Vec<Row>) -> Self {
        while rows.last().is_some_and(|r| is_blank_cells(r)) {
            rows.pop();
        }
        Self {
            rows,
            column_labels: Vec::new(),
        }
    }

    /// Attach column label hints.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.column_labels = labels;
        self
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the grid has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Length of the longest row (or label list).
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.column_labels.len())
    }

    /// Row at `idx`, empty slice when out of range.
    pub fn row(&self, idx: usize) -> &[String] {
        self.rows.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Raw cell, empty string when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// True when every cell of the row is whitespace.
    pub fn is_blank_row(&self, idx: usize) -> bool {
        is_blank_cells(self.row(idx))
    }
}

fn is_blank_cells(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Which source encoding a grid was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Delimited,
    JsonTable,
}

// =============================================================================
// Typed values
// =============================================================================

/// Classification of a raw cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Empty,
    Numeric,
    Text,
}

/// A raw cell reduced to a comparable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedValue {
    pub kind: ValueKind,
    /// Set only for [`ValueKind::Numeric`].
    pub numeric: Option<f64>,
    /// Lower-cased, whitespace-collapsed text used for ordering.
    pub text: String,
    /// The number was only obtained after stripping a dash placeholder glyph.
    pub dash_derived: bool,
}

impl TypedValue {
    pub fn empty() -> Self {
        Self {
            kind: ValueKind::Empty,
            numeric: None,
            text: String::new(),
            dash_derived: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ValueKind::Empty
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ValueKind::Numeric
    }
}

// =============================================================================
// Header keys
// =============================================================================

/// Canonical, de-duplicated column identifier.
///
/// Unique within one header row: the second `GP` becomes `GP_2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderKey(String);

impl HeaderKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Key for the n-th occurrence of `base` (1 is the bare label).
    pub fn variant(base: &str, occurrence: usize) -> Self {
        if occurrence <= 1 {
            Self(base.to_string())
        } else {
            Self(format!("{}_{}", base, occurrence))
        }
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for HeaderKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for HeaderKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HeaderKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HeaderKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for HeaderKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for HeaderKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// =============================================================================
// Records and tables
// =============================================================================

/// One data row zipped with its header keys, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(HeaderKey, String)>,
}

impl Record {
    pub fn new(fields: Vec<(HeaderKey, String)>) -> Self {
        Self { fields }
    }

    /// Raw value under `key`, if the column exists.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v.as_str())
    }

    /// Raw value under `key`, empty string if absent.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// True if `key` exists and holds non-blank text.
    pub fn has_value(&self, key: &str) -> bool {
        !self.value(key).trim().is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &HeaderKey> {
        self.fields.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderKey, &str)> {
        self.fields.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k.as_str(), v)?;
        }
        map.end()
    }
}

/// A logical table: ordered headers plus the records built from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<HeaderKey>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(headers: Vec<HeaderKey>, records: Vec<Record>) -> Self {
        Self { headers, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_header(&self, key: &str) -> bool {
        self.headers.iter().any(|h| h.as_str() == key)
    }

    /// First record whose `key` column equals `value` (trimmed, case-insensitive).
    pub fn find(&self, key: &str, value: &str) -> Option<&Record> {
        let needle = value.trim().to_lowercase();
        self.records
            .iter()
            .find(|r| r.value(key).trim().to_lowercase() == needle)
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Half-open column range `[start, end)` of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpan {
    pub start: usize,
    pub end: usize,
}

impl ColumnSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A view over a grid: data rows `[start, end)`, the header row that
/// labels them, and optionally the column block they occupy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBoundary {
    pub start: usize,
    pub end: usize,
    /// Row index of the header; `None` when headers come from column labels.
    pub header_row: Option<usize>,
    /// Column block; `None` means every column.
    pub columns: Option<ColumnSpan>,
}

impl SectionBoundary {
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column indices covered, given the grid width.
    pub fn column_range(&self, width: usize) -> Range<usize> {
        match self.columns {
            Some(span) => span.start.min(width)..span.end.min(width),
            None => 0..width,
        }
    }
}

// =============================================================================
// Sorting direction
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Direction::Asc),
            "desc" | "descending" => Ok(Direction::Desc),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// A named statistic with its polarity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatKey {
    pub key: String,
    pub higher_is_better: bool,
}

impl StatKey {
    pub fn new(key: impl Into<String>, higher_is_better: bool) -> Self {
        Self {
            key: key.into(),
            higher_is_better,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_strips_trailing_blank_rows() {
        let grid = Grid::new(vec![
            vec!["a".into(), "b".into()],
            vec!["".into()],
            vec!["c".into()],
            vec!["  ".into(), "".into()],
            vec![],
        ]);
        assert_eq!(grid.len(), 3);
        assert!(grid.is_blank_row(1));
        assert_eq!(grid.cell(2, 5), "");
        assert_eq!(grid.width(), 2);
    }

    #[test]
    fn test_header_key_variant() {
        assert_eq!(HeaderKey::variant("GP", 1), "GP");
        assert_eq!(HeaderKey::variant("GP", 2), "GP_2");
    }

    #[test]
    fn test_record_serializes_in_column_order() {
        let record = Record::new(vec![
            ("Team".into(), "Alpha".into()),
            ("FG%".into(), "54.3%".into()),
            ("Rank".into(), "1".into()),
        ]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Team":"Alpha","FG%":"54.3%","Rank":"1"}"#);
        assert_eq!(record.value("missing"), "");
        assert!(record.has_value("Team"));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("DESC".parse::<Direction>().unwrap(), Direction::Desc);
        assert_eq!(Direction::Asc.reversed(), Direction::Desc);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_section_column_range_clamps() {
        let section = SectionBoundary {
            start: 2,
            end: 5,
            header_row: Some(1),
            columns: Some(ColumnSpan::new(3, 10)),
        };
        assert_eq!(section.column_range(6), 3..6);
        assert_eq!(section.len(), 3);
    }
}
