//! # Leaguegrid - typed league tables from spreadsheet exports
//!
//! Leaguegrid turns hand-maintained league spreadsheets, exported as CSV or
//! as a GViz JSON response, into typed tables: standings, matchups,
//! histories and per-season blocks. Nothing in the export declares a schema;
//! tables are found by marker rows, anchor headers and blank separator
//! columns.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │  Export  │──▶│ Parser  │──▶│ Sections │──▶│ Assemble │──▶│ Rank/Compare│
//! │ CSV/GViz │   │ (grid)  │   │ (bounds) │   │ (table)  │   │   (views)   │
//! └──────────┘   └─────────┘   └──────────┘   └──────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leaguegrid::{builtin_shape, extract, sort_by, Direction};
//!
//! let shape = builtin_shape("history").unwrap();
//! let extraction = extract(&std::fs::read_to_string("history.csv")?, &shape)?;
//! for record in sort_by(&extraction.table, "PTS", Direction::Desc) {
//!     println!("{}", record.value("Team"));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Grid, typed values, header keys, tables
//! - [`normalize`] - Cell cleaning and number parsing
//! - [`headers`] - Header canonicalization and de-duplication
//! - [`parser`] - CSV and GViz ingestion with auto-detection
//! - [`sections`] - Section discovery strategies
//! - [`assemble`] - Table assembly and key resolution
//! - [`rank`] - Sorting, leaders and podiums
//! - [`compare`] - Category W/L/T comparator
//! - [`shape`] / [`catalog`] - Table shapes and their registry
//! - [`pipeline`] - End-to-end extraction
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Cells and headers
pub mod headers;
pub mod normalize;

// Parsing
pub mod parser;

// Extraction
pub mod assemble;
pub mod pipeline;
pub mod sections;

// Views
pub mod compare;
pub mod rank;

// Shapes
pub mod catalog;
pub mod shape;

pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExtractError, ExtractResult, IngestError, IngestResult, ServerError, ShapeError, ShapeResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ColumnSpan, Direction, Grid, HeaderKey, Record, SectionBoundary, SourceKind, StatKey, Table,
    TypedValue, ValueKind,
};

// =============================================================================
// Re-exports - Normalization
// =============================================================================

pub use headers::{canonicalize, dedup, RenameRule};
pub use normalize::{classify, clean, normalize_text, parse_number, to_number};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    detect_delimiter, detect_encoding, ingest, ingest_bytes, ingest_file, ingest_text, Ingested,
    Source,
};

// =============================================================================
// Re-exports - Extraction
// =============================================================================

pub use assemble::{assemble, resolve_key, AssembleOptions, Assembly, KeyResolver, SkippedRow};
pub use pipeline::{extract, extract_bytes, extract_file, extract_grid, Diagnostics, Extraction};
pub use sections::{detect_separators, find_sections, MarkerSpec, SectionEnd, Strategy};

// =============================================================================
// Re-exports - Ranking and comparison
// =============================================================================

pub use compare::{
    chunk_pairs, compare_entities, compare_stat, matchup_report, CategoryRecord, Matchup,
    MatchupReport, Outcome,
};
pub use rank::{category_leaders, compare_values, podiums, sort_by, sort_table};

// =============================================================================
// Re-exports - Shapes
// =============================================================================

pub use catalog::ShapeCatalog;
pub use shape::{builtin_shape, builtin_shapes, TableShape};

pub use config::AppConfig;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
