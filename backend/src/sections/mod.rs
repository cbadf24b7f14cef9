//! Section/block discoverer.
//!
//! One export usually holds several logical tables. They are found with
//! three interchangeable strategies:
//!
//! - **marker rows**: a row whose text contains every phrase of a
//!   [`MarkerSpec`] opens the next section
//! - **header anchor**: a row with a cell equal to a known label (e.g.
//!   `Team`) is the header row of the section below it
//! - **separator columns**: columns that are blank in nearly every sampled
//!   row split the grid into side-by-side column blocks
//!
//! A missing anchor or marker is an error, never an empty result.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};
use crate::headers::is_label;
use crate::models::{ColumnSpan, Grid, SectionBoundary};
use crate::normalize::{is_placeholder, normalize_text};

/// Rows sampled for separator and noise-column detection.
pub const DEFAULT_SAMPLE_ROWS: usize = 220;

/// Blank fraction at or above which a column is a separator.
pub const DEFAULT_SEPARATOR_THRESHOLD: f64 = 0.9;

/// Consecutive blank rows that end a section when no stop marker is set.
pub const DEFAULT_BLANK_RUN: usize = 8;

// =============================================================================
// Markers
// =============================================================================

/// A set of phrases that must all appear in one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub phrases: Vec<String>,
}

impl MarkerSpec {
    pub fn new(phrases: &[&str]) -> Self {
        Self {
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// True if the concatenated, normalized row text contains every phrase.
    pub fn matches(&self, row: &[String]) -> bool {
        if self.phrases.is_empty() {
            return false;
        }
        let text = normalize_text(&row.join(" "));
        self.phrases
            .iter()
            .all(|p| text.contains(&normalize_text(p)))
    }

    fn not_found(&self) -> ExtractError {
        ExtractError::RequiredMarkerNotFound {
            phrases: self.phrases.clone(),
        }
    }
}

/// First row at or after `from` matching `marker`.
pub fn find_marker_row(grid: &Grid, marker: &MarkerSpec, from: usize) -> Option<usize> {
    (from..grid.len()).find(|&r| marker.matches(grid.row(r)))
}

/// First row at or after `from` holding a cell equal to `label`.
///
/// With `column` set, only that column is inspected.
pub fn find_anchor_row(
    grid: &Grid,
    label: &str,
    column: Option<usize>,
    from: usize,
) -> Option<usize> {
    (from..grid.len()).find(|&r| anchor_column(grid.row(r), label, column).is_some())
}

/// Column index of `label` within a header row.
pub fn anchor_column(row: &[String], label: &str, column: Option<usize>) -> Option<usize> {
    match column {
        Some(c) => row.get(c).filter(|cell| is_label(cell, label)).map(|_| c),
        None => row.iter().position(|cell| is_label(cell, label)),
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// How a section ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionEnd {
    /// Rows matching any of these markers end the section (exclusive).
    #[serde(default)]
    pub markers: Vec<MarkerSpec>,

    /// Consecutive blank rows that end the section. Defaults to 1 when stop
    /// markers are set and to [`DEFAULT_BLANK_RUN`] otherwise.
    #[serde(default)]
    pub max_blank_run: Option<usize>,
}

impl SectionEnd {
    pub fn blank_limit(&self) -> usize {
        self.max_blank_run
            .unwrap_or(if self.markers.is_empty() {
                DEFAULT_BLANK_RUN
            } else {
                1
            })
            .max(1)
    }

    pub fn at_marker(markers: &[&[&str]]) -> Self {
        Self {
            markers: markers.iter().map(|m| MarkerSpec::new(m)).collect(),
            max_blank_run: None,
        }
    }
}

fn default_header_offset() -> usize {
    1
}

fn default_sample_rows() -> usize {
    DEFAULT_SAMPLE_ROWS
}

fn default_threshold() -> f64 {
    DEFAULT_SEPARATOR_THRESHOLD
}

/// Section discovery strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// Every row matching `marker` opens a section; the header sits
    /// `header_offset` rows below the marker and data starts right after.
    Marker {
        marker: MarkerSpec,
        #[serde(default = "default_header_offset")]
        header_offset: usize,
        #[serde(default)]
        end: SectionEnd,
    },

    /// Every row holding a cell equal to `label` is a header row. With
    /// `after`, the search starts below that (mandatory) marker.
    Anchor {
        label: String,
        #[serde(default)]
        column: Option<usize>,
        #[serde(default)]
        after: Option<MarkerSpec>,
        #[serde(default)]
        end: SectionEnd,
    },

    /// Header row found by `anchor`; separator columns split it into
    /// side-by-side blocks, one section each.
    SeparatorBlocks {
        anchor: String,
        #[serde(default = "default_sample_rows")]
        sample_rows: usize,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default)]
        end: SectionEnd,
    },

    /// Column label hints of a JSON table are the header; every row is data.
    Labels {
        #[serde(default)]
        anchor: Option<String>,
    },
}

impl Strategy {
    pub fn anchor(label: &str) -> Self {
        Strategy::Anchor {
            label: label.to_string(),
            column: None,
            after: None,
            end: SectionEnd::default(),
        }
    }
}

/// Locate sections in a grid.
pub fn find_sections(grid: &Grid, strategy: &Strategy) -> ExtractResult<Vec<SectionBoundary>> {
    let sections = match strategy {
        Strategy::Marker {
            marker,
            header_offset,
            end,
        } => marker_sections(grid, marker, *header_offset, end)?,
        Strategy::Anchor {
            label,
            column,
            after,
            end,
        } => anchor_sections(grid, label, *column, after.as_ref(), end)?,
        Strategy::SeparatorBlocks {
            anchor,
            sample_rows,
            threshold,
            end,
        } => separator_sections(grid, anchor, *sample_rows, *threshold, end)?,
        Strategy::Labels { anchor } => label_sections(grid, anchor.as_deref())?,
    };

    for s in &sections {
        debug!(
            header_row = ?s.header_row,
            start = s.start,
            end = s.end,
            columns = ?s.columns,
            "section discovered"
        );
    }
    Ok(sections)
}

fn marker_sections(
    grid: &Grid,
    marker: &MarkerSpec,
    header_offset: usize,
    end: &SectionEnd,
) -> ExtractResult<Vec<SectionBoundary>> {
    let mut sections = Vec::new();
    let mut from = 0;
    let mut stops = end.clone();
    stops.markers.push(marker.clone());

    while let Some(m) = find_marker_row(grid, marker, from) {
        let header_row = m + header_offset;
        let start = header_row + 1;
        let stop = section_end(grid, start, &stops.markers, stops.blank_limit(), |_| false);
        sections.push(SectionBoundary {
            start: start.min(stop),
            end: stop,
            header_row: Some(header_row),
            columns: None,
        });
        from = stop.max(m + 1);
    }

    if sections.is_empty() {
        return Err(marker.not_found());
    }
    Ok(sections)
}

fn anchor_sections(
    grid: &Grid,
    label: &str,
    column: Option<usize>,
    after: Option<&MarkerSpec>,
    end: &SectionEnd,
) -> ExtractResult<Vec<SectionBoundary>> {
    let mut from = match after {
        Some(marker) => find_marker_row(grid, marker, 0).ok_or_else(|| marker.not_found())? + 1,
        None => 0,
    };

    let mut sections = Vec::new();
    while let Some(header_row) = find_anchor_row(grid, label, column, from) {
        let start = header_row + 1;
        let stop = section_end(grid, start, &end.markers, end.blank_limit(), |row| {
            anchor_column(row, label, column).is_some()
        });
        sections.push(SectionBoundary {
            start,
            end: stop,
            header_row: Some(header_row),
            columns: None,
        });
        from = stop.max(start);
    }

    if sections.is_empty() {
        return Err(ExtractError::RequiredColumnNotFound {
            label: label.to_string(),
        });
    }
    Ok(sections)
}

fn separator_sections(
    grid: &Grid,
    anchor: &str,
    sample_rows: usize,
    threshold: f64,
    end: &SectionEnd,
) -> ExtractResult<Vec<SectionBoundary>> {
    let header_row =
        find_anchor_row(grid, anchor, None, 0).ok_or_else(|| ExtractError::RequiredColumnNotFound {
            label: anchor.to_string(),
        })?;
    let start = header_row + 1;
    let stop = section_end(grid, start, &end.markers, end.blank_limit(), |_| false);

    let separators = detect_separators(grid, start..stop, sample_rows, threshold);
    debug!(?separators, "separator columns");

    Ok(column_blocks(grid.width(), &separators)
        .into_iter()
        .map(|span| SectionBoundary {
            start,
            end: stop,
            header_row: Some(header_row),
            columns: Some(span),
        })
        .collect())
}

fn label_sections(grid: &Grid, anchor: Option<&str>) -> ExtractResult<Vec<SectionBoundary>> {
    if let Some(label) = anchor {
        if !grid.column_labels.iter().any(|l| is_label(l, label)) {
            return Err(ExtractError::RequiredColumnNotFound {
                label: label.to_string(),
            });
        }
    }
    Ok(vec![SectionBoundary {
        start: 0,
        end: grid.len(),
        header_row: None,
        columns: None,
    }])
}

/// Exclusive end row of a section whose data starts at `start`.
///
/// Stops at a row matching any of `markers` or `is_stop`, or after
/// `blank_limit` consecutive blank rows. Trailing blank rows are excluded.
pub fn section_end(
    grid: &Grid,
    start: usize,
    markers: &[MarkerSpec],
    blank_limit: usize,
    is_stop: impl Fn(&[String]) -> bool,
) -> usize {
    let mut last_content = start;
    let mut blank_run = 0;

    for r in start..grid.len() {
        let row = grid.row(r);
        if grid.is_blank_row(r) {
            blank_run += 1;
            if blank_run >= blank_limit {
                break;
            }
            continue;
        }
        if markers.iter().any(|m| m.matches(row)) || is_stop(row) {
            break;
        }
        blank_run = 0;
        last_content = r + 1;
    }
    last_content
}

// =============================================================================
// Separator columns
// =============================================================================

/// Columns blank in at least `threshold` of the first `sample_rows` rows of
/// `rows`.
pub fn detect_separators(
    grid: &Grid,
    rows: std::ops::Range<usize>,
    sample_rows: usize,
    threshold: f64,
) -> Vec<usize> {
    let end = rows.end.min(grid.len()).min(rows.start.saturating_add(sample_rows));
    let sampled = end.saturating_sub(rows.start);
    if sampled == 0 {
        return Vec::new();
    }

    (0..grid.width())
        .filter(|&c| {
            let blank = (rows.start..end)
                .filter(|&r| grid.cell(r, c).trim().is_empty())
                .count();
            blank as f64 / sampled as f64 >= threshold
        })
        .collect()
}

/// Maximal runs of non-separator columns.
pub fn column_blocks(width: usize, separators: &[usize]) -> Vec<ColumnSpan> {
    let mut blocks = Vec::new();
    let mut start = None;
    for c in 0..width {
        if separators.contains(&c) {
            if let Some(s) = start.take() {
                blocks.push(ColumnSpan::new(s, c));
            }
        } else if start.is_none() {
            start = Some(c);
        }
    }
    if let Some(s) = start {
        blocks.push(ColumnSpan::new(s, width));
    }
    blocks
}

/// A variable-width block of season columns followed by a fixed number of
/// totals columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonTotalsSpan {
    pub seasons: ColumnSpan,
    pub totals: ColumnSpan,
}

/// Split a block so its last `totals_width` columns are totals.
pub fn split_season_totals(
    block: ColumnSpan,
    totals_width: usize,
    shape: &str,
) -> ExtractResult<SeasonTotalsSpan> {
    if block.width() < totals_width {
        return Err(ExtractError::SectionTooSmall {
            shape: shape.to_string(),
            found: block.width(),
            minimum: totals_width,
        });
    }
    let split = block.end - totals_width;
    Ok(SeasonTotalsSpan {
        seasons: ColumnSpan::new(block.start, split),
        totals: ColumnSpan::new(split, block.end),
    })
}

// =============================================================================
// Noise columns
// =============================================================================

/// Columns of `section` whose header is blank/dash and whose sampled data
/// is entirely blank/dash.
pub fn noise_columns(grid: &Grid, section: &SectionBoundary, header: &[String]) -> Vec<usize> {
    let end = section.end.min(section.start.saturating_add(DEFAULT_SAMPLE_ROWS));
    section
        .column_range(grid.width())
        .filter(|&c| {
            header.get(c).map_or(true, |h| is_placeholder(h))
                && (section.start..end).all(|r| is_placeholder(grid.cell(r, c)))
        })
        .collect()
}
