//! State-machine tokenizer for delimited text (CSV export).
//!
//! Handles quoted fields with doubled-quote escapes, separators and line
//! breaks inside quotes, and CRLF line endings. Carriage returns are
//! dropped wherever they appear.

use crate::error::{IngestError, IngestResult};
use crate::models::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the start of a field.
    FieldStart,
    /// Inside an unquoted field.
    Unquoted,
    /// Inside a quoted field.
    Quoted,
    /// Just saw a quote inside a quoted field: either an escape or the close.
    QuoteInQuoted,
    /// After the closing quote, before the next separator.
    AfterQuoted,
}

/// Tokenize delimited text into rows of raw cells.
///
/// Fails only on a quoted field left open at end of input.
pub fn parse_delimited(text: &str, separator: char) -> IngestResult<Vec<Row>> {
    let mut rows: Vec<Row> = Vec::new();
    let mut row: Row = Vec::new();
    let mut field = String::new();
    let mut state = State::FieldStart;
    let mut line = 1usize;
    let mut quote_line = 0usize;

    for ch in text.chars() {
        if ch == '\r' {
            continue;
        }

        state = match state {
            State::FieldStart | State::Unquoted => {
                if ch == separator {
                    row.push(std::mem::take(&mut field));
                    State::FieldStart
                } else if ch == '\n' {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                    line += 1;
                    State::FieldStart
                } else if ch == '"' && state == State::FieldStart {
                    quote_line = line;
                    State::Quoted
                } else {
                    field.push(ch);
                    State::Unquoted
                }
            }
            State::Quoted => {
                if ch == '"' {
                    State::QuoteInQuoted
                } else {
                    if ch == '\n' {
                        line += 1;
                    }
                    field.push(ch);
                    State::Quoted
                }
            }
            State::QuoteInQuoted => {
                if ch == '"' {
                    field.push('"');
                    State::Quoted
                } else if ch == separator {
                    row.push(std::mem::take(&mut field));
                    State::FieldStart
                } else if ch == '\n' {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                    line += 1;
                    State::FieldStart
                } else {
                    field.push(ch);
                    State::AfterQuoted
                }
            }
            State::AfterQuoted => {
                if ch == separator {
                    row.push(std::mem::take(&mut field));
                    State::FieldStart
                } else if ch == '\n' {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                    line += 1;
                    State::FieldStart
                } else {
                    field.push(ch);
                    State::AfterQuoted
                }
            }
        };
    }

    if state == State::Quoted {
        return Err(IngestError::SourceDecode(format!(
            "unterminated quoted field starting on line {}",
            quote_line
        )));
    }

    row.push(field);
    rows.push(row);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_rows() {
        let rows = parse_delimited("a,b,c\n1,2,3", ',').unwrap();
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
    }

    #[test]
    fn test_quoted_separator_and_newline() {
        let text = "Team,Note\n\"Alpha, FC\",\"line one\nline two\"\nBeta,x";
        let rows = parse_delimited(text, ',').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "Alpha, FC");
        assert_eq!(rows[1][1], "line one\nline two");
        assert_eq!(rows[2], vec!["Beta", "x"]);
    }

    #[test]
    fn test_doubled_quotes() {
        let rows = parse_delimited("\"say \"\"hi\"\"\",b", ',').unwrap();
        assert_eq!(rows[0], vec!["say \"hi\"", "b"]);
    }

    #[test]
    fn test_crlf_is_noop() {
        let rows = parse_delimited("a,b\r\n1,2\r\n", ',').unwrap();
        assert_eq!(rows[0], vec!["a", "b"]);
        assert_eq!(rows[1], vec!["1", "2"]);
        // Trailing newline leaves one empty row for the grid to strip.
        assert_eq!(rows[2], vec![""]);
    }

    #[test]
    fn test_mid_field_quote_is_literal() {
        let rows = parse_delimited("6'5\",x", ',').unwrap();
        assert_eq!(rows[0], vec!["6'5\"", "x"]);
    }

    #[test]
    fn test_unterminated_quote_fails() {
        let err = parse_delimited("a,\"open\nb,c", ',').unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_empty_fields_kept() {
        let rows = parse_delimited(",,x,", ',').unwrap();
        assert_eq!(rows[0], vec!["", "", "x", ""]);
    }
}
