//! Positional merge of extraction records back onto the input dataset.
//!
//! Output row *i* is input row *i* plus record *i*. The merged table is then
//! split in two: a content table, and a markup table holding the bulky raw
//! markup with its status code. Both keep a leading `row` column so they
//! can be joined again later.

use crate::error::HydrateError;
use crate::models::{Dataset, ExtractionRecord};
use serde_json::Value;
use tracing::debug;

/// Positional index column present in every output table.
pub const ROW_COLUMN: &str = "row";

/// Record fields that go to the content table, in output order.
pub const CONTENT_FIELDS: [&str; 8] = [
    "title",
    "authors",
    "keywords",
    "summary",
    "text",
    "top_image",
    "images",
    "videos",
];

/// Record fields that go to the markup table, in output order.
pub const MARKUP_FIELDS: [&str; 2] = ["markup", "http_code"];

/// A rectangular table of rendered cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Input fields and record fields merged by position.
///
/// Layout per row: `row`, every input column, the eight content fields,
/// `markup`, `http_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratedDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    input_width: usize,
}

impl HydratedDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Split into the content table and the markup table.
    ///
    /// With `content_http_code` the content table also keeps `http_code`,
    /// which saves a later correction pass.
    pub fn split(self, content_http_code: bool) -> (Table, Table) {
        let content_end = 1 + self.input_width + CONTENT_FIELDS.len();
        let http_code_at = content_end + 1;

        let mut content_columns = self.columns[..content_end].to_vec();
        if content_http_code {
            content_columns.push(self.columns[http_code_at].clone());
        }
        let markup_columns: Vec<String> = std::iter::once(ROW_COLUMN)
            .chain(MARKUP_FIELDS)
            .map(str::to_string)
            .collect();

        let mut content_rows = Vec::with_capacity(self.rows.len());
        let mut markup_rows = Vec::with_capacity(self.rows.len());
        for mut row in self.rows {
            let tail = row.split_off(content_end);
            let mut markup_row = Vec::with_capacity(MARKUP_FIELDS.len() + 1);
            markup_row.push(row[0].clone());
            markup_row.extend(tail);
            if content_http_code {
                row.push(markup_row[2].clone());
            }
            content_rows.push(row);
            markup_rows.push(markup_row);
        }

        (
            Table {
                columns: content_columns,
                rows: content_rows,
            },
            Table {
                columns: markup_columns,
                rows: markup_rows,
            },
        )
    }
}

/// Render an input cell: strings verbatim, null as empty, anything else as JSON.
fn input_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn record_cells(record: ExtractionRecord) -> Result<Vec<String>, HydrateError> {
    Ok(vec![
        record.title,
        serde_json::to_string(&record.authors)?,
        serde_json::to_string(&record.keywords)?,
        record.summary,
        record.text,
        record.top_image,
        serde_json::to_string(&record.images)?,
        serde_json::to_string(&record.videos)?,
        record.markup,
        record.http_code.to_string(),
    ])
}

/// Merge extraction records onto the dataset they were produced from.
///
/// Records are consumed so their text and markup move into the merged rows
/// instead of being copied.
///
/// # Errors
///
/// [`HydrateError::SchemaMismatch`] when the two sides differ in length.
/// The batch is aborted rather than truncated.
pub fn merge(
    original: &Dataset,
    extracted: Vec<ExtractionRecord>,
) -> Result<HydratedDataset, HydrateError> {
    if original.len() != extracted.len() {
        return Err(HydrateError::SchemaMismatch {
            original: original.len(),
            extracted: extracted.len(),
        });
    }

    let columns: Vec<String> = std::iter::once(ROW_COLUMN)
        .map(str::to_string)
        .chain(original.columns.iter().cloned())
        .chain(CONTENT_FIELDS.iter().chain(&MARKUP_FIELDS).map(|f| f.to_string()))
        .collect();

    let rows = original
        .rows
        .iter()
        .zip(extracted)
        .enumerate()
        .map(|(i, (input, record))| {
            let mut row = Vec::with_capacity(columns.len());
            row.push(i.to_string());
            row.extend(original.columns.iter().map(|c| input_cell(input.get(c))));
            row.extend(record_cells(record)?);
            Ok(row)
        })
        .collect::<Result<Vec<_>, HydrateError>>()?;

    debug!(rows = rows.len(), columns = columns.len(), "Merged extraction records");
    Ok(HydratedDataset {
        columns,
        rows,
        input_width: original.columns.len(),
    })
}
