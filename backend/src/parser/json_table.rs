//! JSON-table (Google Visualization "gviz") decoding.
//!
//! The payload usually arrives wrapped in a JavaScript callback:
//!
//! ```text
//! /*O_o*/
//! google.visualization.Query.setResponse({"table":{"cols":[...],"rows":[{"c":[{"v":1,"f":"1"}]}]}});
//! ```
//!
//! Only the first balanced `{ ... }` object is parsed; braces inside
//! string literals do not count.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{IngestError, IngestResult};
use crate::models::{Grid, Row};

#[derive(Debug, Deserialize)]
struct Envelope {
    table: JsonTable,
}

#[derive(Debug, Default, Deserialize)]
struct JsonTable {
    #[serde(default)]
    cols: Vec<JsonColumn>,
    #[serde(default)]
    rows: Vec<JsonRow>,
}

#[derive(Debug, Deserialize)]
struct JsonColumn {
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonRow {
    #[serde(default)]
    c: Option<Vec<Option<JsonCell>>>,
}

#[derive(Debug, Deserialize)]
struct JsonCell {
    #[serde(default)]
    v: Value,
    #[serde(default)]
    f: Value,
}

/// Slice out the first balanced JSON object, if any.
pub fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a JSON-table payload into a grid with column label hints.
pub fn parse_json_table(text: &str) -> IngestResult<Grid> {
    let span = json_object_span(text)
        .ok_or_else(|| IngestError::SourceDecode("no JSON object found".to_string()))?;
    let envelope: Envelope = serde_json::from_str(span)
        .map_err(|e| IngestError::SourceDecode(format!("invalid JSON table: {}", e)))?;

    let labels: Vec<String> = envelope
        .table
        .cols
        .iter()
        // Unlabelled columns stay blank.
        .map(|c| c.label.as_deref().map(str::trim).unwrap_or("").to_string())
        .collect();

    let rows: Vec<Row> = envelope
        .table
        .rows
        .into_iter()
        .map(|r| {
            r.c.unwrap_or_default()
                .into_iter()
                .map(|cell| cell.map(|c| cell_value(&c)).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Grid::new(rows).with_labels(labels))
}

/// Formatted value first, then raw value, then empty.
fn cell_value(cell: &JsonCell) -> String {
    match &cell.f {
        Value::Null => value_to_string(&cell.v),
        f => value_to_string(f),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"/*O_o*/
google.visualization.Query.setResponse({"version":"0.6","status":"ok","table":{"cols":[{"id":"A","label":"Team","type":"string"},{"id":"B","label":"","type":"number"},{"id":"C","label":"FG%","type":"number"}],"rows":[{"c":[{"v":"Alpha"},{"v":12.0},{"v":0.543,"f":"54.3%"}]},{"c":[{"v":"Beta"},null,{"v":0.5}]},{"c":null}]}});"#;

    #[test]
    fn test_gviz_payload() {
        let grid = parse_json_table(PAYLOAD).unwrap();
        assert_eq!(grid.column_labels, vec!["Team", "", "FG%"]);
        assert_eq!(grid.len(), 2, "trailing empty row stripped");
        assert_eq!(grid.row(0), &["Alpha", "12", "54.3%"]);
        assert_eq!(grid.cell(1, 1), "");
        assert_eq!(grid.cell(1, 2), "0.5");
    }

    #[test]
    fn test_object_span_stops_at_balanced_brace() {
        let text = r#"setResponse({"table":{"cols":[{"label":"a}b"}]}}); /* } */"#;
        assert_eq!(
            json_object_span(text),
            Some(r#"{"table":{"cols":[{"label":"a}b"}]}}"#)
        );
        assert_eq!(json_object_span("{\"a\": {\"b\": 1}"), None);
    }

    #[test]
    fn test_missing_object_fails() {
        assert!(parse_json_table("Team,GP\nAlpha,3").is_err());
    }

    #[test]
    fn test_invalid_json_fails() {
        let err = parse_json_table("{\"table\": [").unwrap_err();
        assert!(err.to_string().contains("source not decodable"));
    }
}
