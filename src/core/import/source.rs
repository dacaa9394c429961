//! Record source
//!
//! Turns a blob body into a lazy sequence of records. Delimited text uses
//! its first row as the header; the JSON export document is an array of
//! objects. Data rows are numbered from 1; the header is row 0.

use crate::config::SourceFormat;
use crate::domain::{ParseError, Record};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::io::Cursor;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

enum Rows {
    Delimited {
        header: Vec<String>,
        records: StringRecordsIntoIter<Cursor<Vec<u8>>>,
        row: usize,
    },
    Json {
        items: std::iter::Enumerate<std::vec::IntoIter<Value>>,
    },
    Done,
}

/// Lazy, ordered, single-pass sequence of records
pub struct RecordSource {
    rows: Rows,
}

impl RecordSource {
    /// Open a source over `body`
    ///
    /// # Errors
    ///
    /// A header with empty or duplicate names, or a JSON body that is not an
    /// array, is a [`ParseError`] on row 0.
    pub fn open(body: Vec<u8>, format: SourceFormat, delimiter: u8) -> Result<Self, ParseError> {
        let body = strip_bom(body);
        let rows = match format {
            SourceFormat::Csv => open_delimited(body, delimiter)?,
            SourceFormat::Json => open_json(&body)?,
        };
        Ok(Self { rows })
    }

    /// Open a delimited source
    pub fn delimited(body: impl Into<Vec<u8>>, delimiter: u8) -> Result<Self, ParseError> {
        Self::open(body.into(), SourceFormat::Csv, delimiter)
    }

    /// Header names of a delimited source
    pub fn header(&self) -> Option<&[String]> {
        match self.rows {
            Rows::Delimited { ref header, .. } => Some(header),
            _ => None,
        }
    }
}

fn strip_bom(mut body: Vec<u8>) -> Vec<u8> {
    if body.starts_with(UTF8_BOM) {
        body.drain(..UTF8_BOM.len());
    }
    body
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

fn open_delimited(body: Vec<u8>, delimiter: u8) -> Result<Rows, ParseError> {
    let mut records = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(body))
        .into_records();

    let header = loop {
        match records.next() {
            None => return Ok(Rows::Done),
            Some(Err(e)) => return Err(ParseError::new(0, format!("unreadable header: {e}"))),
            Some(Ok(record)) if is_blank(&record) => continue,
            Some(Ok(record)) => break record,
        }
    };

    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(header.len());
    for (index, name) in header.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::new(0, format!("header column {} has no name", index + 1)));
        }
        if !seen.insert(name.to_string()) {
            return Err(ParseError::new(0, format!("duplicate header name '{name}'")));
        }
        names.push(name.to_string());
    }

    Ok(Rows::Delimited {
        header: names,
        records,
        row: 0,
    })
}

fn open_json(body: &[u8]) -> Result<Rows, ParseError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Rows::Done);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ParseError::new(0, format!("invalid JSON document: {e}")))?;

    match value {
        Value::Array(items) => Ok(Rows::Json {
            items: items.into_iter().enumerate(),
        }),
        _ => Err(ParseError::new(0, "JSON document must be an array of objects")),
    }
}

impl Iterator for RecordSource {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows {
            Rows::Delimited {
                ref header,
                ref mut records,
                ref mut row,
            } => loop {
                let record = match records.next()? {
                    Ok(record) => record,
                    Err(e) => {
                        *row += 1;
                        return Some(Err(ParseError::new(*row, e.to_string())));
                    }
                };
                if is_blank(&record) {
                    continue;
                }
                *row += 1;

                if record.len() != header.len() {
                    return Some(Err(ParseError::new(
                        *row,
                        format!("expected {} fields, found {}", header.len(), record.len()),
                    )));
                }

                let fields: Map<String, Value> = header
                    .iter()
                    .zip(record.iter())
                    .map(|(name, value)| (name.clone(), Value::String(value.to_string())))
                    .collect();
                return Some(Ok(Record::from_map(fields)));
            },
            Rows::Json { ref mut items } => {
                let (index, value) = items.next()?;
                let row = index + 1;
                Some(match value {
                    Value::Object(map) => Ok(Record::from_map(map)),
                    other => Err(ParseError::new(
                        row,
                        format!("expected an object, found {}", json_type(&other)),
                    )),
                })
            }
            Rows::Done => None,
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
