//! Export of list output as NDJSON or a JSON array.
//!
//! Each list row becomes one JSON object holding the record id and the
//! display value of every column, keyed by column selector.

use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::str::FromStr;

use crate::crud::{ListOutput, ListRow};

/// Error type for export operations
#[derive(Debug)]
pub enum ExportError {
    Json(serde_json::Error),
    Io(std::io::Error),
    UnknownFormat(String),
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Json(e) => write!(f, "JSON error: {}", e),
            ExportError::Io(e) => write!(f, "IO error: {}", e),
            ExportError::UnknownFormat(name) => write!(f, "Unknown export format: {}", name),
        }
    }
}

impl std::error::Error for ExportError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// One object per line
    #[default]
    Ndjson,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Ndjson => "application/x-ndjson",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ndjson" | "jsonl" => Ok(ExportFormat::Ndjson),
            "json" => Ok(ExportFormat::Json),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Flatten a list row into a JSON object.
pub fn row_object(row: &ListRow) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::from(row.id));
    for (selector, value) in &row.values {
        object.insert(selector.clone(), Value::String(value.clone()));
    }
    Value::Object(object)
}

/// NDJSON (newline delimited JSON) writer
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), ExportError> {
        serde_json::to_writer(&mut self.writer, record)?;
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ExportError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Streams records into a single JSON array
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    first: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Writes the opening bracket.
    pub fn new(mut writer: W) -> Result<Self, ExportError> {
        write!(writer, "[")?;
        Ok(Self { writer, first: true })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), ExportError> {
        if !self.first {
            write!(self.writer, ",")?;
        }
        self.first = false;
        serde_json::to_writer(&mut self.writer, record)?;
        Ok(())
    }

    /// Close the array and flush.
    pub fn finish(mut self) -> Result<(), ExportError> {
        write!(self.writer, "]")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Write every row of `list` in `format`.
pub fn export_list<W: Write>(
    list: &ListOutput,
    format: ExportFormat,
    writer: W,
) -> Result<usize, ExportError> {
    match format {
        ExportFormat::Ndjson => {
            let mut out = NdjsonWriter::new(writer);
            for row in &list.rows {
                out.write(&row_object(row))?;
            }
            out.flush()?;
        }
        ExportFormat::Json => {
            let mut out = JsonArrayWriter::new(writer)?;
            for row in &list.rows {
                out.write(&row_object(row))?;
            }
            out.finish()?;
        }
    }
    tracing::debug!("Exported {} row(s) of {}", list.rows.len(), list.table);
    Ok(list.rows.len())
}
