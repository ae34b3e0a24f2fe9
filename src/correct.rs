//! Copy status codes from markup tables into content tables.
//!
//! Content tables written without `http_code` can be corrected after the
//! fact: for each day the markup table's `http_code` column is joined onto
//! the content table by position and the result written to
//! `corrected_dir` as `{prefix}_{day}-hyd_http.csv`.
//!
//! Days are independent and run concurrently up to
//! `correction_concurrency`. A day with missing inputs is skipped; a day
//! whose tables disagree is reported as failed. Neither stops the others.

use crate::aggregate::Table;
use crate::config::HydrateConfig;
use crate::error::HydrateError;
use crate::outputs::csv::{read_table, write_table};
use crate::outputs::{content_file_name, corrected_file_name, markup_file_name};
use crate::utils::{days, ensure_writable_dir};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::io::ErrorKind;
use tracing::{error, info, instrument, warn};

const HTTP_CODE: &str = "http_code";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionSummary {
    pub corrected: Vec<NaiveDate>,
    /// Days whose content or markup table does not exist.
    pub skipped: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
}

/// Set the content table's `http_code` column from the markup table.
///
/// An existing `http_code` column is overwritten in place; otherwise one is
/// appended.
///
/// # Errors
///
/// - [`HydrateError::MissingColumn`] if the markup table has no `http_code`
/// - [`HydrateError::SchemaMismatch`] if the tables differ in row count
pub fn apply_http_code(mut content: Table, markup: &Table) -> Result<Table, HydrateError> {
    let source = markup
        .column_index(HTTP_CODE)
        .ok_or_else(|| HydrateError::MissingColumn(HTTP_CODE.to_string()))?;
    if content.len() != markup.len() {
        return Err(HydrateError::SchemaMismatch {
            original: content.len(),
            extracted: markup.len(),
        });
    }

    let target = content.column_index(HTTP_CODE);
    if target.is_none() {
        content.columns.push(HTTP_CODE.to_string());
    }
    for (row, markup_row) in content.rows.iter_mut().zip(&markup.rows) {
        let code = markup_row.get(source).cloned().unwrap_or_default();
        match target {
            Some(i) if i < row.len() => row[i] = code,
            _ => row.push(code),
        }
    }
    Ok(content)
}

/// Correct one day. Returns the number of rows written.
#[instrument(level = "info", skip_all, fields(%day))]
pub async fn correct_day(config: &HydrateConfig, day: NaiveDate) -> Result<usize, HydrateError> {
    let prefix = &config.file_prefix;
    let markup = read_table(&config.markup_dir.join(markup_file_name(prefix, day))).await?;
    let content = read_table(&config.content_dir.join(content_file_name(prefix, day))).await?;

    let corrected = apply_http_code(content, &markup)?;
    write_table(
        &corrected,
        &config.corrected_dir.join(corrected_file_name(prefix, day)),
    )
    .await?;
    Ok(corrected.len())
}

/// Correct every day from `start` to `end`, inclusive.
#[instrument(level = "info", skip_all, fields(%start, %end))]
pub async fn run(
    config: &HydrateConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CorrectionSummary, Box<dyn Error>> {
    ensure_writable_dir(&config.corrected_dir).await?;

    let mut results: Vec<(NaiveDate, Result<usize, HydrateError>)> = stream::iter(days(start, end))
        .map(|day| async move { (day, correct_day(config, day).await) })
        .buffer_unordered(config.correction_concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|(day, _)| *day);

    let mut summary = CorrectionSummary::default();
    for (day, result) in results {
        match result {
            Ok(rows) => {
                info!(%day, rows, "Corrected");
                summary.corrected.push(day);
            }
            Err(HydrateError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                warn!(%day, error = %e, "Hydrated tables missing; skipping day");
                summary.skipped.push(day);
            }
            Err(e) => {
                error!(%day, error = %e, "Correction failed");
                summary.failed.push(day);
            }
        }
    }

    info!(
        corrected = summary.corrected.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "Done."
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, d).unwrap()
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn markup() -> Table {
        table(
            &["row", "markup", "http_code"],
            &[&["0", "<html/>", "200"], &["1", "", "404"]],
        )
    }

    fn config(root: &Path) -> HydrateConfig {
        HydrateConfig {
            content_dir: root.join("hydrated"),
            markup_dir: root.join("hydrated/html"),
            corrected_dir: root.join("hydrated/http"),
            ..HydrateConfig::default()
        }
    }

    #[test]
    fn test_apply_appends_column() {
        let content = table(&["row", "title"], &[&["0", "A"], &["1", ""]]);
        let corrected = apply_http_code(content, &markup()).unwrap();
        assert_eq!(corrected.columns, vec!["row", "title", "http_code"]);
        assert_eq!(corrected.rows[0], vec!["0", "A", "200"]);
        assert_eq!(corrected.rows[1], vec!["1", "", "404"]);
    }

    #[test]
    fn test_apply_replaces_existing_column() {
        let content = table(
            &["row", "http_code", "title"],
            &[&["0", "0", "A"], &["1", "0", "B"]],
        );
        let corrected = apply_http_code(content, &markup()).unwrap();
        assert_eq!(corrected.columns.len(), 3);
        assert_eq!(corrected.rows[1], vec!["1", "404", "B"]);
    }

    #[test]
    fn test_apply_rejects_row_mismatch() {
        let content = table(&["row", "title"], &[&["0", "A"]]);
        assert!(matches!(
            apply_http_code(content, &markup()),
            Err(HydrateError::SchemaMismatch {
                original: 1,
                extracted: 2
            })
        ));
    }

    #[test]
    fn test_apply_requires_http_code_in_markup() {
        let content = table(&["row"], &[&["0"]]);
        let markup = table(&["row", "markup"], &[&["0", ""]]);
        assert!(matches!(
            apply_http_code(content, &markup),
            Err(HydrateError::MissingColumn(_))
        ));
    }

    #[tokio::test]
    async fn test_run_corrects_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.markup_dir).unwrap();
        let content = table(&["row", "title"], &[&["0", "A"], &["1", ""]]);
        write_table(&content, &config.content_dir.join("IN_2021-06-01-hyd.csv"))
            .await
            .unwrap();
        write_table(&markup(), &config.markup_dir.join("IN_2021-06-01-hyd_html.csv"))
            .await
            .unwrap();
        // Day 2 has disagreeing tables; day 3 has none at all.
        write_table(
            &table(&["row", "title"], &[&["0", "A"]]),
            &config.content_dir.join("IN_2021-06-02-hyd.csv"),
        )
        .await
        .unwrap();
        write_table(&markup(), &config.markup_dir.join("IN_2021-06-02-hyd_html.csv"))
            .await
            .unwrap();

        let summary = run(&config, day(1), day(3)).await.unwrap();
        assert_eq!(summary.corrected, vec![day(1)]);
        assert_eq!(summary.failed, vec![day(2)]);
        assert_eq!(summary.skipped, vec![day(3)]);

        let out = read_table(&config.corrected_dir.join("IN_2021-06-01-hyd_http.csv"))
            .await
            .unwrap();
        assert_eq!(out.rows[1], vec!["1", "", "404"]);
        assert!(!config.corrected_dir.join("IN_2021-06-02-hyd_http.csv").exists());
    }
}
