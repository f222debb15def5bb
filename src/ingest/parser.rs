use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

pub const MIN_ROWS: usize = 1;
pub const MAX_ROWS: usize = 1000;

/// One CSV record. `line` is the 1-based record number, blank records
/// included; a blank record has no fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("The file must contain between 1 and 1000 rows. Found {0}.")]
    RowCount(usize),
    #[error("Malformed CSV on line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Parses headerless, comma-delimited text into rows and enforces the row
/// bounds on the raw count, before any row is inspected.
pub fn parse_rows(text: &str) -> Result<Vec<RawRow>, ParseError> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let rows = split_records(&text)?
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let line = idx + 1;
            parse_fields(record)
                .map(|fields| RawRow { line, fields })
                .map_err(|reason| ParseError::Malformed { line, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if !(MIN_ROWS..=MAX_ROWS).contains(&rows.len()) {
        return Err(ParseError::RowCount(rows.len()));
    }
    Ok(rows)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    FieldStart,
    Unquoted,
    Quoted,
    /// A `"` seen inside a quoted field: either half of a `""` escape or the
    /// closing quote.
    QuoteInQuoted,
}

/// Cuts the text into records on newlines outside quoted fields. The csv
/// reader drops empty lines, so records are cut here to keep blank rows
/// numbered. A quote only opens a quoted field as the first character of a
/// field; anywhere else it is literal text, as the csv reader reads it.
fn split_records(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut records = Vec::new();
    let mut state = Scan::FieldStart;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        state = match (state, ch) {
            (Scan::Quoted, '"') => Scan::QuoteInQuoted,
            (Scan::Quoted, _) => Scan::Quoted,
            (Scan::QuoteInQuoted, '"') => Scan::Quoted,
            (Scan::FieldStart, '"') => Scan::Quoted,
            (_, ',') => Scan::FieldStart,
            (_, '\n') => {
                records.push(&text[start..idx]);
                start = idx + 1;
                Scan::FieldStart
            }
            _ => Scan::Unquoted,
        };
    }

    if state == Scan::Quoted {
        return Err(ParseError::Malformed {
            line: records.len() + 1,
            reason: "quoted field is never closed".to_string(),
        });
    }
    if start < text.len() {
        records.push(&text[start..]);
    }
    Ok(records)
}

fn parse_fields(record: &str) -> Result<Vec<String>, String> {
    if record.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(record.as_bytes());
    let mut fields = StringRecord::new();
    reader.read_record(&mut fields).map_err(|err| err.to_string())?;

    let mut rest = StringRecord::new();
    if reader.read_record(&mut rest).map_err(|err| err.to_string())? {
        return Err("unexpected data after the end of the record".to_string());
    }
    Ok(fields.iter().map(str::to_string).collect())
}
