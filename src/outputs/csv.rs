//! CSV encoding of [`Table`]s.

use crate::aggregate::Table;
use crate::error::HydrateError;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, instrument};

/// Rows encoded per write, bounding the encoded copy held in memory.
const ROWS_PER_CHUNK: usize = 64;

fn encode_rows<'a, I>(rows: I) -> Result<Vec<u8>, HydrateError>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| HydrateError::Io(e.into_error()))
}

/// Encode a table as CSV with a header row.
pub fn encode_table(table: &Table) -> Result<Vec<u8>, HydrateError> {
    encode_rows(std::iter::once(&table.columns).chain(&table.rows))
}

/// Decode CSV with a header row into a table.
pub fn decode_table(bytes: &[u8]) -> Result<Table, HydrateError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let columns = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(Table { columns, rows })
}

/// Write a table to `path`, replacing any existing file.
///
/// Rows are encoded and written a chunk at a time, so the file is never
/// held in memory as a whole.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_table(table: &Table, path: &Path) -> Result<(), HydrateError> {
    let mut file = BufWriter::new(fs::File::create(path).await?);
    let mut bytes = 0usize;

    let header = encode_rows(std::iter::once(&table.columns))?;
    bytes += header.len();
    file.write_all(&header).await?;
    for chunk in table.rows.chunks(ROWS_PER_CHUNK) {
        let encoded = encode_rows(chunk)?;
        bytes += encoded.len();
        file.write_all(&encoded).await?;
    }
    file.flush().await?;

    info!(rows = table.len(), bytes, "Wrote table");
    Ok(())
}

/// Read a table previously written by [`write_table`].
pub async fn read_table(path: &Path) -> Result<Table, HydrateError> {
    let bytes = fs::read(path).await?;
    decode_table(&bytes)
}
