//! Table assembler.
//!
//! Zips a canonicalized header row with the data rows of one section.
//! Row-level problems (a row without its primary key) are recorded as
//! [`SkippedRow`]s and never abort the table; structural ones (a required
//! column that is not in the header) are errors.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{ExtractError, ExtractResult};
use crate::headers::{canonical_label, dedup, is_label, RenameRule};
use crate::models::{Grid, HeaderKey, Record, SectionBoundary, Table};
use crate::normalize::normalize_text;
use crate::sections::noise_columns;

/// Rows inspected below the header when inferring a rank column.
const RANK_PROBE_ROWS: usize = 7;

// =============================================================================
// Options
// =============================================================================

/// Assembly options for one table shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleOptions {
    /// Canonical label of the entity column; rows where it is blank are skipped.
    pub primary_key: Option<String>,

    /// Further columns that must be non-blank for a row to be kept.
    pub required: Vec<String>,

    /// Stop including columns after the first column with this label.
    pub cut_after: Option<String>,

    /// Maximum number of records.
    pub row_cap: Option<usize>,

    /// Include the integer column left of the primary key as `Rank`.
    pub infer_rank: bool,

    /// Drop blank-headed columns even when they hold data.
    pub drop_blank_headers: bool,

    /// Drop columns left of the primary key (the inferred rank is kept).
    pub from_primary: bool,

    /// Replace the header row entirely.
    pub fixed_headers: Option<Vec<String>>,

    /// A row missing its primary key or a required value ends the table.
    pub stop_on_missing_key: bool,

    /// Columns dropped by exact (case-insensitive) label.
    pub exclude_columns: Vec<String>,

    /// Columns dropped by label prefix.
    pub exclude_prefixes: Vec<String>,

    /// Fewer assembled columns than this is a structural error.
    pub min_columns: Option<usize>,

    /// Header rename rules, applied in order.
    pub rename_rules: Vec<RenameRule>,
}

// =============================================================================
// Result
// =============================================================================

/// A row that was skipped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// Grid row index.
    pub row: usize,
    pub reason: String,
    pub missing_fields: Vec<String>,
}

/// What a column was used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PrimaryKey,
    Required,
    Rank,
    Data,
}

/// Assignment of a grid column to a header key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRole {
    pub key: HeaderKey,
    /// Grid column index.
    pub column: usize,
    pub role: Role,
}

/// Result of assembling one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Assembly {
    pub table: Table,
    pub skipped: Vec<SkippedRow>,
    pub roles: Vec<ColumnRole>,
    /// Grid columns dropped as noise.
    pub trimmed: Vec<usize>,
}

impl Assembly {
    /// Grid column backing `key`.
    pub fn column_of(&self, key: &str) -> Option<usize> {
        self.roles
            .iter()
            .find(|r| r.key.as_str() == key)
            .map(|r| r.column)
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Assembled: {} records, {} columns, {} skipped, {} trimmed",
            self.table.len(),
            self.table.headers.len(),
            self.skipped.len(),
            self.trimmed.len()
        )
    }
}

// =============================================================================
// Assembly
// =============================================================================

struct Column {
    index: usize,
    label: String,
    inferred_rank: bool,
}

/// Assemble the records of `section`.
pub fn assemble(
    grid: &Grid,
    section: &SectionBoundary,
    options: &AssembleOptions,
) -> ExtractResult<Assembly> {
    let first_column = section.column_range(grid.width()).start;
    let header: Vec<String> = match (&options.fixed_headers, section.header_row) {
        // Fixed headers label the block's columns from its first column on.
        (Some(fixed), _) => std::iter::repeat(String::new())
            .take(first_column)
            .chain(fixed.iter().cloned())
            .collect(),
        (None, Some(r)) => grid.row(r).to_vec(),
        (None, None) => grid.column_labels.clone(),
    };
    let width = match options.fixed_headers {
        Some(_) => header.len().min(grid.width()),
        None => grid.width().max(header.len()),
    };

    let trimmed = if options.fixed_headers.is_some() {
        Vec::new()
    } else {
        noise_columns(grid, section, &header)
    };

    let mut columns: Vec<Column> = section
        .column_range(width)
        .filter(|c| !trimmed.contains(c))
        .filter_map(|c| {
            let raw = header.get(c).map(String::as_str).unwrap_or("");
            let label = canonical_label(raw, &options.rename_rules);
            if is_excluded(&label, options) || (label.is_empty() && options.drop_blank_headers) {
                return None;
            }
            let label = if label.is_empty() {
                format!("col_{}", c)
            } else {
                label
            };
            Some(Column {
                index: c,
                label,
                inferred_rank: false,
            })
        })
        .collect();

    let primary = match &options.primary_key {
        Some(key) => Some(
            columns
                .iter()
                .position(|col| is_label(&col.label, key))
                .ok_or_else(|| ExtractError::RequiredColumnNotFound { label: key.clone() })?,
        ),
        None => None,
    };

    if let Some(p) = primary {
        let primary_index = columns[p].index;
        if options.infer_rank {
            infer_rank(grid, section, primary_index, &mut columns);
        }
        if options.from_primary {
            columns.retain(|col| col.index >= primary_index || col.inferred_rank);
        }
    }

    if let Some(cut) = &options.cut_after {
        if let Some(pos) = columns.iter().position(|col| is_label(&col.label, cut)) {
            columns.truncate(pos + 1);
        }
    }

    let labels: Vec<String> = columns.iter().map(|c| c.label.clone()).collect();
    let keys = dedup(&labels);

    if let Some(minimum) = options.min_columns {
        if keys.len() < minimum {
            return Err(ExtractError::SectionTooSmall {
                shape: String::new(),
                found: keys.len(),
                minimum,
            });
        }
    }

    let primary_key = options
        .primary_key
        .as_deref()
        .and_then(|k| find_key(&keys, k));
    let mut required = Vec::new();
    for label in &options.required {
        let key = find_key(&keys, label)
            .ok_or_else(|| ExtractError::RequiredColumnNotFound { label: label.clone() })?;
        required.push(key);
    }

    let roles: Vec<ColumnRole> = columns
        .iter()
        .zip(&keys)
        .map(|(col, key)| ColumnRole {
            key: key.clone(),
            column: col.index,
            role: if Some(key) == primary_key.as_ref() {
                Role::PrimaryKey
            } else if required.contains(key) {
                Role::Required
            } else if col.inferred_rank || key.as_str() == "Rank" {
                Role::Rank
            } else {
                Role::Data
            },
        })
        .collect();
    for role in &roles {
        debug!(key = %role.key, column = role.column, role = ?role.role, "column role");
    }

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for r in section.rows() {
        if options.row_cap.is_some_and(|cap| records.len() >= cap) {
            break;
        }
        if columns.iter().all(|col| grid.cell(r, col.index).trim().is_empty()) {
            continue;
        }

        let record = Record::new(
            columns
                .iter()
                .zip(&keys)
                .map(|(col, key)| (key.clone(), grid.cell(r, col.index).trim().to_string()))
                .collect(),
        );

        let missing: Vec<String> = primary_key
            .iter()
            .chain(required.iter())
            .filter(|k| !record.has_value(k.as_str()))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            if options.stop_on_missing_key {
                debug!(row = r, "table ends at row without key");
                break;
            }
            skipped.push(SkippedRow {
                row: r,
                reason: "Missing key columns".to_string(),
                missing_fields: missing,
            });
            continue;
        }
        records.push(record);
    }

    if !skipped.is_empty() {
        warn!(count = skipped.len(), "rows skipped during assembly");
    }

    Ok(Assembly {
        table: Table::new(keys, records),
        skipped,
        roles,
        trimmed,
    })
}

fn is_excluded(label: &str, options: &AssembleOptions) -> bool {
    let norm = normalize_text(label);
    if norm.is_empty() {
        return false;
    }
    options
        .exclude_columns
        .iter()
        .any(|c| normalize_text(c) == norm)
        || options
            .exclude_prefixes
            .iter()
            .any(|p| norm.starts_with(&normalize_text(p)))
}

fn find_key(keys: &[HeaderKey], label: &str) -> Option<HeaderKey> {
    keys.iter().find(|k| is_label(k.as_str(), label)).cloned()
}

/// Label the column left of the primary key `Rank` when its first populated
/// value is an integer, whatever its header says (`#`, blank, `Pos`).
fn infer_rank(
    grid: &Grid,
    section: &SectionBoundary,
    primary_index: usize,
    columns: &mut Vec<Column>,
) {
    let Some(rank_index) = primary_index.checked_sub(1) else {
        return;
    };

    let probe_end = section.end.min(section.start + RANK_PROBE_ROWS);
    let first = (section.start..probe_end)
        .map(|r| grid.cell(r, rank_index).trim())
        .find(|v| !v.is_empty());
    if !first.is_some_and(|v| v.chars().all(|c| c.is_ascii_digit())) {
        return;
    }

    debug!(column = rank_index, "inferred rank column");
    match columns.iter_mut().find(|c| c.index == rank_index) {
        Some(col) => {
            col.label = "Rank".to_string();
            col.inferred_rank = true;
        }
        None => {
            let at = columns
                .iter()
                .position(|c| c.index > rank_index)
                .unwrap_or(columns.len());
            columns.insert(
                at,
                Column {
                    index: rank_index,
                    label: "Rank".to_string(),
                    inferred_rank: true,
                },
            );
        }
    }
}

// =============================================================================
// Key resolution
// =============================================================================

/// Resolves repeated labels (`PTS` vs `PTS_2`) for a whole table.
///
/// The populated-column set is computed once, so every row of the table
/// resolves a label to the same key.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    variant: usize,
    populated: HashSet<HeaderKey>,
}

impl KeyResolver {
    pub fn new(table: &Table, variant: usize) -> Self {
        let populated = table
            .headers
            .iter()
            .filter(|h| table.records.iter().any(|r| r.has_value(h.as_str())))
            .cloned()
            .collect();
        Self { variant, populated }
    }

    /// The variant key when any row has a value under it, else the base key.
    pub fn resolve(&self, base: &str) -> HeaderKey {
        let candidate = HeaderKey::variant(base, self.variant);
        if self.populated.contains(&candidate) {
            candidate
        } else {
            HeaderKey::new(base)
        }
    }
}

/// One-off form of [`KeyResolver::resolve`].
pub fn resolve_key(table: &Table, base: &str, variant: usize) -> HeaderKey {
    KeyResolver::new(table, variant).resolve(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::{find_sections, Strategy};

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn section_of(g: &Grid) -> SectionBoundary {
        find_sections(g, &Strategy::anchor("Team")).unwrap().remove(0)
    }

    #[test]
    fn test_assemble_simple() {
        let g = grid(&[
            &["Rank", "Team", "FG%", "TO"],
            &["1", "Alpha", "54.3%", "12"],
            &["2", "Beta", "0.543", "8"],
        ]);
        let options = AssembleOptions {
            primary_key: Some("Team".into()),
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        assert_eq!(assembly.table.len(), 2);
        assert_eq!(assembly.table.records[0].value("FG%"), "54.3%");
        assert_eq!(assembly.roles[1].role, Role::PrimaryKey);
        assert_eq!(assembly.roles[0].role, Role::Rank);
    }

    #[test]
    fn test_missing_primary_key_row_skipped() {
        let g = grid(&[
            &["Team", "League", "PTS"],
            &["Alpha", "A1", "10"],
            &["", "A1", "11"],
            &["Beta", "", "12"],
            &["Gamma", "B1", "13"],
        ]);
        let options = AssembleOptions {
            primary_key: Some("Team".into()),
            required: vec!["League".into()],
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        assert_eq!(assembly.table.len(), 2);
        assert_eq!(assembly.skipped.len(), 2);
        assert_eq!(assembly.skipped[0].row, 2);
        assert_eq!(assembly.skipped[1].missing_fields, vec!["League".to_string()]);
    }

    #[test]
    fn test_stop_on_missing_key_and_row_cap() {
        let g = grid(&[
            &["Team", "PTS"],
            &["Alpha", "10"],
            &["Beta", "11"],
            &["Gamma", "12"],
            &["", "13"],
            &["Delta", "14"],
        ]);
        let stop = AssembleOptions {
            primary_key: Some("Team".into()),
            stop_on_missing_key: true,
            ..Default::default()
        };
        assert_eq!(assemble(&g, &section_of(&g), &stop).unwrap().table.len(), 3);

        let capped = AssembleOptions {
            row_cap: Some(2),
            ..stop
        };
        assert_eq!(assemble(&g, &section_of(&g), &capped).unwrap().table.len(), 2);
    }

    #[test]
    fn test_cut_after_first_to() {
        let g = grid(&[
            &["Team", "PTS", "TO", "PTS", "TO", "Extra"],
            &["Alpha", "10", "3", "1", "2", "x"],
        ]);
        let options = AssembleOptions {
            cut_after: Some("TO".into()),
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        let headers: Vec<&str> = assembly.table.headers.iter().map(HeaderKey::as_str).collect();
        assert_eq!(headers, vec!["Team", "PTS", "TO"]);
    }

    #[test]
    fn test_infer_rank_from_primary() {
        let g = grid(&[
            &["Notes", "", "Team", "PTS"],
            &["x", "", "", "—"],
            &["y", "1", "Alpha", "10"],
            &["z", "2", "Beta", "9"],
        ]);
        let options = AssembleOptions {
            primary_key: Some("Team".into()),
            infer_rank: true,
            from_primary: true,
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        let headers: Vec<&str> = assembly.table.headers.iter().map(HeaderKey::as_str).collect();
        assert_eq!(headers, vec!["Rank", "Team", "PTS"]);
        assert_eq!(assembly.table.records[0].value("Rank"), "1");
        assert_eq!(assembly.column_of("Rank"), Some(1));
        assert_eq!(assembly.skipped.len(), 1);
    }

    #[test]
    fn test_infer_rank_under_hash_header() {
        let g = grid(&[
            &["#", "Team", "PTS", "REB"],
            &["1", "Alpha", "10", "5"],
            &["2", "Beta", "9", "6"],
        ]);
        let options = AssembleOptions {
            primary_key: Some("Team".into()),
            infer_rank: true,
            from_primary: true,
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        let headers: Vec<&str> = assembly.table.headers.iter().map(HeaderKey::as_str).collect();
        assert_eq!(headers, vec!["Rank", "Team", "PTS", "REB"]);
        assert_eq!(assembly.table.records[1].value("Rank"), "2");
    }

    #[test]
    fn test_text_left_of_primary_is_not_rank() {
        let g = grid(&[
            &["Manager", "Team", "PTS"],
            &["Nick", "Alpha", "10"],
        ]);
        let options = AssembleOptions {
            primary_key: Some("Team".into()),
            infer_rank: true,
            from_primary: true,
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        let headers: Vec<&str> = assembly.table.headers.iter().map(HeaderKey::as_str).collect();
        assert_eq!(headers, vec!["Team", "PTS"]);
    }

    #[test]
    fn test_blank_header_with_data_gets_positional_key() {
        let g = grid(&[
            &["Team", "", "", "PTS"],
            &["Alpha", "note", "", "10"],
            &["Beta", "", "—", "9"],
        ]);
        let assembly = assemble(&g, &section_of(&g), &AssembleOptions::default()).unwrap();
        let headers: Vec<&str> = assembly.table.headers.iter().map(HeaderKey::as_str).collect();
        assert_eq!(headers, vec!["Team", "col_1", "PTS"]);
        assert_eq!(assembly.trimmed, vec![2]);
    }

    #[test]
    fn test_drop_blank_headers() {
        let g = grid(&[
            &["Team", "", "PTS"],
            &["Alpha", "note", "10"],
        ]);
        let options = AssembleOptions {
            drop_blank_headers: true,
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        let headers: Vec<&str> = assembly.table.headers.iter().map(HeaderKey::as_str).collect();
        assert_eq!(headers, vec!["Team", "PTS"]);
    }

    #[test]
    fn test_exclusions() {
        let g = grid(&[
            &["Team", "Manager", "GENERAL INFO Notes", "PTS"],
            &["Alpha", "Nick", "n", "10"],
        ]);
        let options = AssembleOptions {
            exclude_columns: vec!["manager".into()],
            exclude_prefixes: vec!["General Info".into()],
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        assert_eq!(assembly.table.headers, vec![HeaderKey::new("Team"), HeaderKey::new("PTS")]);
    }

    #[test]
    fn test_fixed_headers_bound_width() {
        let g = grid(&[
            &["Team", "merged", "", "x"],
            &["Alpha", "3", "1", "junk"],
        ]);
        let options = AssembleOptions {
            fixed_headers: Some(vec!["Team".into(), "W".into(), "L".into()]),
            primary_key: Some("Team".into()),
            ..Default::default()
        };
        let assembly = assemble(&g, &section_of(&g), &options).unwrap();
        assert_eq!(assembly.table.headers.len(), 3);
        assert_eq!(assembly.table.records[0].value("L"), "1");
    }

    #[test]
    fn test_min_columns() {
        let g = grid(&[&["Team", "PTS"], &["Alpha", "10"]]);
        let options = AssembleOptions {
            min_columns: Some(16),
            ..Default::default()
        };
        let err = assemble(&g, &section_of(&g), &options)
            .unwrap_err()
            .for_shape("league-standings");
        assert!(err.to_string().contains("league-standings"));
    }

    #[test]
    fn test_missing_required_column_is_error() {
        let g = grid(&[&["Team", "PTS"], &["Alpha", "10"]]);
        let options = AssembleOptions {
            required: vec!["League".into()],
            ..Default::default()
        };
        let err = assemble(&g, &section_of(&g), &options).unwrap_err();
        assert_eq!(err.kind(), "RequiredColumnNotFound");
    }

    #[test]
    fn test_resolve_key_falls_back_per_table() {
        let g = grid(&[
            &["Team", "PTS", "REB", "PTS", "REB"],
            &["Alpha", "100", "40", "1", ""],
            &["Beta", "90", "45", "2", ""],
        ]);
        let table = assemble(&g, &section_of(&g), &AssembleOptions::default())
            .unwrap()
            .table;
        let resolver = KeyResolver::new(&table, 2);
        assert_eq!(resolver.resolve("PTS"), "PTS_2");
        assert_eq!(resolver.resolve("REB"), "REB");
        assert_eq!(resolve_key(&table, "AST", 2), "AST");
    }
}
