//! High-level pipeline API: source text to a typed table.
//!
//! Combines every step for one [`TableShape`]: ingestion with source-kind
//! detection, section discovery, section selection, assembly, the optional
//! season/totals split and the shape's default sort.
//!
//! # Example
//!
//! ```rust,ignore
//! use leaguegrid::pipeline::extract_file;
//! use leaguegrid::shape::builtin_shape;
//!
//! let shape = builtin_shape("history").unwrap();
//! let extraction = extract_file("ranking-2025.csv", &shape)?;
//! println!("{} teams", extraction.table.len());
//! ```

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::assemble::{assemble, ColumnRole, SkippedRow};
use crate::error::{ExtractError, ExtractResult};
use crate::models::{ColumnSpan, Grid, HeaderKey, SectionBoundary, SourceKind, Table};
use crate::parser::{ingest_bytes, ingest_file, ingest_text, Ingested};
use crate::rank::sort_table;
use crate::sections::{detect_separators, find_sections, split_season_totals, Strategy};
use crate::shape::TableShape;

/// Result of extracting one table.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    /// Shape that produced the table.
    pub shape: String,
    pub table: Table,
    /// Every section the strategy discovered.
    pub sections: Vec<SectionBoundary>,
    pub diagnostics: Diagnostics,
}

/// How the table was found and built.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub source_kind: SourceKind,
    pub encoding: Option<String>,
    pub separator: Option<char>,
    /// Grid rows.
    pub rows: usize,
    /// Grid width.
    pub columns: usize,
    /// Separator columns (block strategies only).
    pub separators: Vec<usize>,
    pub roles: Vec<ColumnRole>,
    pub skipped: Vec<SkippedRow>,
    pub trimmed: Vec<usize>,
    pub season_totals: Option<SeasonSplit>,
}

/// Season and totals columns of a split block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonSplit {
    pub seasons: ColumnSpan,
    pub totals: ColumnSpan,
    pub season_keys: Vec<HeaderKey>,
    pub total_keys: Vec<HeaderKey>,
}

/// Extract a table from source text of unknown kind.
pub fn extract(text: &str, shape: &TableShape) -> ExtractResult<Extraction> {
    extract_ingested(ingest_text(text)?, shape)
}

/// Extract a table from raw bytes (encoding is detected).
pub fn extract_bytes(bytes: &[u8], shape: &TableShape) -> ExtractResult<Extraction> {
    extract_ingested(ingest_bytes(bytes)?, shape)
}

/// Extract a table from a file.
pub fn extract_file<P: AsRef<Path>>(path: P, shape: &TableShape) -> ExtractResult<Extraction> {
    extract_ingested(ingest_file(path)?, shape)
}

/// Extract a table from an already ingested grid.
pub fn extract_ingested(ingested: Ingested, shape: &TableShape) -> ExtractResult<Extraction> {
    let Ingested {
        grid,
        kind,
        encoding,
        separator,
    } = ingested;
    let mut extraction = extract_grid(&grid, shape)?;
    extraction.diagnostics.source_kind = kind;
    extraction.diagnostics.encoding = encoding;
    extraction.diagnostics.separator = separator;
    Ok(extraction)
}

/// Extract a table from a grid.
pub fn extract_grid(grid: &Grid, shape: &TableShape) -> ExtractResult<Extraction> {
    let sections = find_sections(grid, &shape.strategy)?;
    let mut section = sections
        .get(shape.section)
        .cloned()
        .ok_or(ExtractError::SectionOutOfRange {
            index: shape.section,
            found: sections.len(),
        })?;

    let separators = match &shape.strategy {
        Strategy::SeparatorBlocks {
            sample_rows,
            threshold,
            ..
        } => detect_separators(grid, section.rows(), *sample_rows, *threshold),
        _ => Vec::new(),
    };

    let split = match shape.season_totals {
        Some(layout) => {
            let block = section
                .columns
                .unwrap_or_else(|| ColumnSpan::new(0, grid.width()));
            let split = split_season_totals(block, layout.totals_width, &shape.name)?;
            // Carry the entity block along with a later season block.
            if shape.section > 0 {
                if let Some(first) = sections.first().and_then(|s| s.columns) {
                    section.columns = Some(ColumnSpan::new(first.start, block.end));
                }
            }
            Some(split)
        }
        None => None,
    };

    let assembly = assemble(grid, &section, &shape.assembly).map_err(|e| e.for_shape(&shape.name))?;
    debug!(shape = %shape.name, "{}", assembly.summary());

    let season_totals = split.map(|split| {
        let keys_in = |span: ColumnSpan| -> Vec<HeaderKey> {
            assembly
                .roles
                .iter()
                .filter(|r| span.range().contains(&r.column))
                .map(|r| r.key.clone())
                .collect()
        };
        SeasonSplit {
            seasons: split.seasons,
            totals: split.totals,
            season_keys: keys_in(split.seasons),
            total_keys: keys_in(split.totals),
        }
    });

    let mut table = assembly.table;
    if let Some(sort) = &shape.default_sort {
        if table.has_header(&sort.key) {
            sort_table(&mut table, &sort.key, sort.direction);
        } else {
            debug!(key = %sort.key, "default sort key not in table");
        }
    }

    info!(
        shape = %shape.name,
        records = table.len(),
        columns = table.headers.len(),
        skipped = assembly.skipped.len(),
        "extracted table"
    );

    Ok(Extraction {
        shape: shape.name.clone(),
        table,
        sections,
        diagnostics: Diagnostics {
            source_kind: SourceKind::Delimited,
            encoding: None,
            separator: None,
            rows: grid.len(),
            columns: grid.width(),
            separators,
            roles: assembly.roles,
            skipped: assembly.skipped,
            trimmed: assembly.trimmed,
            season_totals,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::builtin_shape;

    #[test]
    fn test_extract_csv_with_anchor() {
        let csv = "Season 2025,,\nRank,Team,FG%,TO\n1,Alpha,54.3%,12\n2,Beta,0.543,8\n";
        let shape = TableShape::new("scores", Strategy::anchor("Team"));
        let extraction = extract(csv, &shape).unwrap();
        assert_eq!(extraction.table.len(), 2);
        assert_eq!(extraction.diagnostics.source_kind, SourceKind::Delimited);
        assert_eq!(extraction.diagnostics.separator, Some(','));
        assert_eq!(extraction.sections[0].header_row, Some(1));
    }

    #[test]
    fn test_section_out_of_range() {
        let csv = "Team,PTS\nAlpha,10\n";
        let mut shape = TableShape::new("scores", Strategy::anchor("Team"));
        shape.section = 3;
        let err = extract(csv, &shape).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::SectionOutOfRange { index: 3, found: 1 }
        ));
    }

    #[test]
    fn test_default_sort_applied() {
        let csv = ",Team,League,League Ranking,Category Standing\n\
                   ,Alpha,A1,2,5\n\
                   ,Beta,A1,1,2\n\
                   ,Gamma,B1,1,9\n";
        let shape = builtin_shape("history").unwrap();
        let extraction = extract(csv, &shape).unwrap();
        let order: Vec<&str> = extraction
            .table
            .records
            .iter()
            .map(|r| r.value("Team"))
            .collect();
        assert_eq!(order, vec!["Beta", "Alpha", "Gamma"]);
    }

    #[test]
    fn test_season_totals_split() {
        let csv = "Team,W,,2023,2024,2025,GP,W,L,PTS\n\
                   Alpha,3,,1,2,1,30,20,10,900\n\
                   Beta,2,,2,1,2,30,15,15,850\n";
        let shape = builtin_shape("season-totals").unwrap();
        let extraction = extract(csv, &shape).unwrap();
        let split = extraction.diagnostics.season_totals.unwrap();
        assert_eq!(split.seasons, ColumnSpan::new(3, 6));
        assert_eq!(split.totals, ColumnSpan::new(6, 10));
        assert_eq!(split.season_keys, vec![HeaderKey::new("2023"), HeaderKey::new("2024"), HeaderKey::new("2025")]);
        assert_eq!(split.total_keys[1], "W_2");
        assert_eq!(extraction.diagnostics.separators, vec![2]);
        assert_eq!(extraction.table.records[0].value("Team"), "Alpha");
    }

    #[test]
    fn test_season_totals_too_small() {
        let csv = "Team,W,,2025,GP,W\nAlpha,3,,1,30,20\n";
        let err = extract(csv, &builtin_shape("season-totals").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::SectionTooSmall { found: 3, minimum: 4, .. }
        ));
    }
}
