//! Table shape definitions
//!
//! A shape says where one logical table lives in an export and how to
//! assemble it: the section strategy, which discovered section to take, the
//! assembly options and an optional default sort. Shapes are plain JSON so
//! new sheet layouts can be described without code changes.

use serde::{Deserialize, Serialize};

use crate::assemble::AssembleOptions;
use crate::error::{ShapeError, ShapeResult};
use crate::headers::default_rules;
use crate::models::Direction;
use crate::sections::{MarkerSpec, SectionEnd, Strategy};

/// A complete table shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableShape {
    /// Unique name, used for lookup.
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// How sections are discovered.
    pub strategy: Strategy,

    /// Index of the discovered section to assemble.
    #[serde(default)]
    pub section: usize,

    #[serde(default)]
    pub assembly: AssembleOptions,

    /// Split the section into season columns and trailing totals.
    #[serde(default)]
    pub season_totals: Option<SeasonTotals>,

    /// Sort applied to the assembled table.
    #[serde(default)]
    pub default_sort: Option<SortSpec>,
}

/// Season/totals block layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonTotals {
    /// Number of trailing totals columns.
    pub totals_width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    #[serde(default)]
    pub direction: Direction,
}

impl TableShape {
    /// Create a shape with default options.
    pub fn new(name: &str, strategy: Strategy) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            strategy,
            section: 0,
            assembly: AssembleOptions::default(),
            season_totals: None,
            default_sort: None,
        }
    }

    /// Parse and validate a shape from JSON.
    pub fn from_json(json: &str) -> ShapeResult<Self> {
        let shape: Self = serde_json::from_str(json)?;
        shape.validate()?;
        Ok(shape)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> ShapeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check structural consistency.
    pub fn validate(&self) -> ShapeResult<()> {
        if self.name.trim().is_empty() {
            return Err(ShapeError::Invalid("shape name is empty".into()));
        }
        if let Strategy::SeparatorBlocks {
            sample_rows,
            threshold,
            ..
        } = &self.strategy
        {
            if *sample_rows == 0 {
                return Err(ShapeError::Invalid(format!(
                    "{}: sample_rows must be positive",
                    self.name
                )));
            }
            if !(*threshold > 0.0 && *threshold <= 1.0) {
                return Err(ShapeError::Invalid(format!(
                    "{}: threshold must be in (0, 1], got {}",
                    self.name, threshold
                )));
            }
        }
        if self.season_totals.is_some_and(|s| s.totals_width == 0) {
            return Err(ShapeError::Invalid(format!(
                "{}: totals_width must be positive",
                self.name
            )));
        }
        if self
            .assembly
            .fixed_headers
            .as_ref()
            .is_some_and(|h| h.is_empty())
        {
            return Err(ShapeError::Invalid(format!(
                "{}: fixed_headers is empty",
                self.name
            )));
        }
        Ok(())
    }

    fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    fn with_assembly(mut self, assembly: AssembleOptions) -> Self {
        self.assembly = assembly;
        self
    }

    fn sorted_by(mut self, key: &str, direction: Direction) -> Self {
        self.default_sort = Some(SortSpec {
            key: key.to_string(),
            direction,
        });
        self
    }
}

// =============================================================================
// Built-in shapes
// =============================================================================

/// Header of the standings block under the "standings before matchup" marker.
pub const STANDINGS_HEADERS: [&str; 16] = [
    "#", "Team", "W", "L", "T", "W%", "GP", "FG%", "3P", "FT%", "PTS", "REB", "AST", "ST", "BLK",
    "TO",
];

/// Raw statistics hidden from general division standings.
const DIVISION_HIDDEN: [&str; 12] = [
    "gp",
    "fg%",
    "3p",
    "ft%",
    "pts",
    "reb",
    "ast",
    "st",
    "blk",
    "to",
    "general statistics fg%",
    "general statistics rankings gp",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// All built-in shapes.
pub fn builtin_shapes() -> Vec<TableShape> {
    vec![
        league_matchups(),
        league_standings(),
        champions_league(),
        history(),
        division_general(),
        division_weekly(),
        teams(),
        season_totals(),
    ]
}

/// Built-in shape by name.
pub fn builtin_shape(name: &str) -> Option<TableShape> {
    builtin_shapes().into_iter().find(|s| s.name == name)
}

fn league_matchups() -> TableShape {
    TableShape::new(
        "league-matchups",
        Strategy::Anchor {
            label: "Team".into(),
            column: None,
            after: Some(MarkerSpec::new(&["matchup live results"])),
            end: SectionEnd::at_marker(&[&["standings before matchup"]]),
        },
    )
    .describe("Live matchup results; consecutive rows are opponents")
    .with_assembly(AssembleOptions {
        primary_key: Some("Team".into()),
        infer_rank: true,
        from_primary: true,
        ..Default::default()
    })
}

fn league_standings() -> TableShape {
    TableShape::new(
        "league-standings",
        Strategy::Marker {
            marker: MarkerSpec::new(&["standings before matchup", "total statistics"]),
            header_offset: 1,
            end: SectionEnd::default(),
        },
    )
    .describe("League standings before the current matchup")
    .with_assembly(AssembleOptions {
        primary_key: Some("Team".into()),
        required: vec!["#".into()],
        fixed_headers: Some(strings(&STANDINGS_HEADERS)),
        stop_on_missing_key: true,
        row_cap: Some(12),
        min_columns: Some(STANDINGS_HEADERS.len()),
        ..Default::default()
    })
}

fn champions_league() -> TableShape {
    TableShape::new(
        "champions-league",
        Strategy::Marker {
            marker: MarkerSpec::new(&["champions league"]),
            header_offset: 1,
            end: SectionEnd::default(),
        },
    )
    .describe("Champions League table")
    .with_assembly(AssembleOptions {
        primary_key: Some("Team".into()),
        infer_rank: true,
        ..Default::default()
    })
}

fn history() -> TableShape {
    TableShape::new(
        "history",
        Strategy::Anchor {
            label: "Team".into(),
            column: Some(1),
            after: None,
            end: SectionEnd::default(),
        },
    )
    .describe("Season ranking sheet; totals first, category ranks as _2 columns")
    .with_assembly(AssembleOptions {
        primary_key: Some("Team".into()),
        required: vec!["League".into()],
        ..Default::default()
    })
    .sorted_by("Category Standing", Direction::Asc)
}

fn division_general() -> TableShape {
    TableShape::new("division-general", Strategy::Labels { anchor: None })
        .describe("General division standings without raw statistics")
        .with_assembly(AssembleOptions {
            exclude_columns: strings(&DIVISION_HIDDEN),
            exclude_prefixes: strings(&["general statistics", "general statistics rankings"]),
            drop_blank_headers: true,
            rename_rules: default_rules(),
            ..Default::default()
        })
        .sorted_by("Rank", Direction::Asc)
}

fn division_weekly() -> TableShape {
    TableShape::new("division-weekly", Strategy::Labels { anchor: None })
        .describe("Weekly division standings up to the first TO column")
        .with_assembly(AssembleOptions {
            cut_after: Some("TO".into()),
            drop_blank_headers: true,
            rename_rules: default_rules(),
            ..Default::default()
        })
        .sorted_by("Rank", Direction::Asc)
}

fn teams() -> TableShape {
    TableShape::new(
        "teams",
        Strategy::Labels {
            anchor: Some("Team".into()),
        },
    )
    .describe("Team directory with managers and leagues")
    .with_assembly(AssembleOptions {
        primary_key: Some("Team".into()),
        exclude_prefixes: strings(&["the greek nba fantasy championship general info"]),
        ..Default::default()
    })
}

fn season_totals() -> TableShape {
    let mut shape = TableShape::new(
        "season-totals",
        Strategy::SeparatorBlocks {
            anchor: "Team".into(),
            sample_rows: crate::sections::DEFAULT_SAMPLE_ROWS,
            threshold: crate::sections::DEFAULT_SEPARATOR_THRESHOLD,
            end: SectionEnd::default(),
        },
    )
    .describe("Per-season block followed by four totals columns")
    .with_assembly(AssembleOptions {
        primary_key: Some("Team".into()),
        ..Default::default()
    });
    shape.section = 1;
    shape.season_totals = Some(SeasonTotals { totals_width: 4 });
    shape
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_serialization() {
        for shape in builtin_shapes() {
            let json = shape.to_json().unwrap();
            let parsed = TableShape::from_json(&json).unwrap();
            assert_eq!(parsed, shape);
        }
    }

    #[test]
    fn test_builtin_names_unique() {
        let mut names: Vec<String> = builtin_shapes().into_iter().map(|s| s.name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(builtin_shape("league-standings").is_some());
        assert!(builtin_shape("nope").is_none());
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "name": "scores",
            "strategy": { "type": "anchor", "label": "Team" },
            "assembly": { "primary_key": "Team", "cut_after": "TO" }
        }"#;
        let shape = TableShape::from_json(json).unwrap();
        assert_eq!(shape.section, 0);
        assert_eq!(shape.assembly.cut_after.as_deref(), Some("TO"));
        match shape.strategy {
            Strategy::Anchor { end, .. } => assert_eq!(end.blank_limit(), 8),
            other => panic!("unexpected strategy {:?}", other),
        }
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let json = r#"{
            "name": "blocks",
            "strategy": { "type": "separator_blocks", "anchor": "Team", "threshold": 1.5 }
        }"#;
        let err = TableShape::from_json(json).unwrap_err();
        assert!(matches!(err, ShapeError::Invalid(_)));
    }

    #[test]
    fn test_unknown_strategy_is_json_error() {
        let err = TableShape::from_json(r#"{"name":"x","strategy":{"type":"magic"}}"#).unwrap_err();
        assert!(matches!(err, ShapeError::Json(_)));
    }
}
