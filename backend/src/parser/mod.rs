//! Grid ingestion with encoding, source-kind and delimiter auto-detection.
//!
//! Two source encodings produce the same [`Grid`]:
//!
//! - delimited text (CSV export), see [`delimited`]
//! - JSON table object (gviz), see [`json_table`]
//!
//! No header logic lives here: the first row of a grid is not assumed to be
//! a header row.

pub mod delimited;
pub mod json_table;

use serde::Serialize;
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::models::{Grid, SourceKind};

pub use delimited::parse_delimited;
pub use json_table::{json_object_span, parse_json_table};

/// Raw source text tagged with its encoding.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    Delimited { text: &'a str, separator: char },
    JsonTable(&'a str),
}

impl<'a> Source<'a> {
    /// Comma-separated text.
    pub fn csv(text: &'a str) -> Self {
        Source::Delimited {
            text,
            separator: ',',
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Delimited { .. } => SourceKind::Delimited,
            Source::JsonTable(_) => SourceKind::JsonTable,
        }
    }
}

/// Result of ingestion with detection metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Ingested {
    pub grid: Grid,
    pub kind: SourceKind,
    /// Detected or used encoding (bytes input only).
    pub encoding: Option<String>,
    /// Separator used for delimited input.
    pub separator: Option<char>,
}

/// Ingest a source into a grid.
pub fn ingest(source: Source<'_>) -> IngestResult<Grid> {
    let grid = match source {
        Source::Delimited { text, separator } => Grid::new(parse_delimited(text, separator)?),
        Source::JsonTable(text) => parse_json_table(text)?,
    };
    debug!(
        kind = ?source.kind(),
        rows = grid.len(),
        width = grid.width(),
        "ingested grid"
    );
    Ok(grid)
}

/// Ingest text of unknown kind.
///
/// Text that announces itself as JSON (a gviz wrapper or a leading `{`) must
/// decode as a JSON table. Anything else is tokenized as delimited text.
pub fn ingest_text(text: &str) -> IngestResult<Ingested> {
    let text = text.trim_start_matches('\u{feff}');
    if looks_like_json(text) {
        let grid = ingest(Source::JsonTable(text))?;
        return Ok(Ingested {
            grid,
            kind: SourceKind::JsonTable,
            encoding: None,
            separator: None,
        });
    }

    let separator = detect_delimiter(text);
    let grid = ingest(Source::Delimited { text, separator })?;
    Ok(Ingested {
        grid,
        kind: SourceKind::Delimited,
        encoding: None,
        separator: Some(separator),
    })
}

/// Ingest raw bytes: detect encoding, decode, then [`ingest_text`].
pub fn ingest_bytes(bytes: &[u8]) -> IngestResult<Ingested> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let mut ingested = ingest_text(&content)?;
    ingested.encoding = Some(encoding);
    Ok(ingested)
}

/// Read and ingest a file.
pub fn ingest_file<P: AsRef<std::path::Path>>(path: P) -> IngestResult<Ingested> {
    let bytes = std::fs::read(path.as_ref())?;
    ingest_bytes(&bytes)
}

fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{')
        || trimmed.starts_with("/*O_o*/")
        || text.contains("google.visualization.Query.setResponse")
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "iso-8859-7" | "windows-1253" | "greek" => "windows-1253".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding label.
pub fn decode_content(bytes: &[u8], encoding: &str) -> IngestResult<String> {
    if matches!(encoding.to_lowercase().as_str(), "utf-8" | "utf8" | "ascii") {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let codec = encoding_rs::Encoding::for_label(encoding.as_bytes())
        .ok_or_else(|| IngestError::Encoding(format!("unsupported encoding '{}'", encoding)))?;
    let (decoded, _, had_errors) = codec.decode(bytes);
    if had_errors {
        debug!(encoding, "decoded with replacement characters");
    }
    Ok(decoded.into_owned())
}

/// Lines sampled when sniffing the delimiter.
const SNIFF_LINES: usize = 5;

/// Detect the delimiter from the first lines, ignoring quoted text.
///
/// A comma outside quotes always wins; otherwise the most frequent of
/// `;`, tab and `|`, falling back to a comma.
pub fn detect_delimiter(content: &str) -> char {
    let separators = [',', ';', '\t', '|'];
    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    let mut lines = 0;

    for ch in content.trim_start_matches(['\r', '\n']).chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => {
                lines += 1;
                if lines >= SNIFF_LINES {
                    break;
                }
            }
            _ if !in_quotes => {
                if let Some(i) = separators.iter().position(|&s| s == ch) {
                    counts[i] += 1;
                }
            }
            _ => {}
        }
    }

    if counts[0] > 0 {
        return ',';
    }
    let mut best_sep = ',';
    let mut best_count = 0;
    for (&sep, &count) in separators.iter().zip(&counts).skip(1) {
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_csv() {
        let grid = ingest(Source::csv("Rank,Team\n1,Alpha\n\n\n")).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.cell(1, 1), "Alpha");
    }

    #[test]
    fn test_ingest_text_detects_json() {
        let text = r#"google.visualization.Query.setResponse({"table":{"cols":[{"label":"Team"}],"rows":[{"c":[{"v":"Alpha"}]}]}});"#;
        let ingested = ingest_text(text).unwrap();
        assert_eq!(ingested.kind, SourceKind::JsonTable);
        assert_eq!(ingested.grid.cell(0, 0), "Alpha");
    }

    #[test]
    fn test_broken_json_is_not_decodable() {
        let err = ingest_text("{\"table\": {\"rows\": [}").unwrap_err();
        assert!(matches!(err, IngestError::SourceDecode(_)));
    }

    #[test]
    fn test_broken_csv_is_not_decodable() {
        let err = ingest_text("a,b\n\"never closed").unwrap_err();
        assert!(matches!(err, IngestError::SourceDecode(_)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("\n\na,b|c,d"), ',');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_quoted_title_does_not_pick_delimiter() {
        assert_eq!(detect_delimiter("\"a;b;c\",x\nTeam,PTS"), ',');
        assert_eq!(detect_delimiter("\"x,y\";Team;PTS\n1;2;3"), ';');

        let ingested = ingest_text("\"a;b;c\",x\nTeam,PTS\nAlpha,1\n").unwrap();
        assert_eq!(ingested.separator, Some(','));
        assert_eq!(ingested.grid.row(0), &["a;b;c", "x"]);
        assert_eq!(ingested.grid.row(1), &["Team", "PTS"]);
        assert_eq!(ingested.grid.cell(2, 1), "1");
    }

    #[test]
    fn test_ingest_bytes_utf8() {
        let ingested = ingest_bytes("Team,League\nΆλφα,Γ1".as_bytes()).unwrap();
        assert_eq!(ingested.kind, SourceKind::Delimited);
        assert_eq!(ingested.separator, Some(','));
        assert_eq!(ingested.grid.cell(1, 1), "Γ1");
    }

    #[test]
    fn test_bom_stripped() {
        let ingested = ingest_text("\u{feff}Rank,Team\n1,Alpha\n").unwrap();
        assert_eq!(ingested.grid.cell(0, 0), "Rank");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.contains("Soci"));
    }
}
