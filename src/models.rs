//! Data models for hydration tasks, per-stage results and datasets.
//!
//! This module defines the core data structures used throughout the application:
//! - [`UrlTask`]: One URL to hydrate, tagged with its input position
//! - [`ProbeResult`]: Outcome of the reachability check
//! - [`ExtractedArticle`] and [`Markup`]: Successful primary extraction
//! - [`ExtractionRecord`]: The fixed-schema terminal record for one URL
//! - [`Dataset`]: A day's ordered input records

use crate::error::{FeedError, HydrateError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

/// Status code used both for real 404s and for probes that failed outright.
pub const UNREACHABLE: u16 = 404;

/// One URL to hydrate.
///
/// `index` is the task's position in the original ordered input and is only
/// used to put results back in order after concurrent completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTask {
    pub index: usize,
    pub url: String,
}

impl UrlTask {
    /// Number an ordered list of URLs into tasks.
    pub fn batch<I, S>(urls: I) -> Vec<UrlTask>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(index, url)| UrlTask {
                index,
                url: url.into(),
            })
            .collect()
    }
}

/// Result of the reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub status_code: u16,
}

impl ProbeResult {
    pub fn new(status_code: u16) -> Self {
        Self { status_code }
    }

    /// The sentinel result for a 404 or a probe that could not complete.
    pub fn unreachable() -> Self {
        Self::new(UNREACHABLE)
    }

    pub fn is_unreachable(&self) -> bool {
        self.status_code == UNREACHABLE
    }
}

/// Raw markup as reported by the primary extractor.
///
/// Distinguishes a blank download ([`Markup::Empty`]) from a response the
/// extractor never treated as markup in the first place ([`Markup::Unset`]).
/// Both send the pipeline to the fallback fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Present(String),
    Empty,
    Unset,
}

impl Markup {
    /// Classify a downloaded body.
    pub fn from_body(body: String) -> Self {
        if body.trim().is_empty() {
            Markup::Empty
        } else {
            Markup::Present(body)
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Markup::Present(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Markup::Present(_) => "present",
            Markup::Empty => "empty",
            Markup::Unset => "unset",
        }
    }
}

/// Content produced by a successful primary extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub summary: String,
    pub text: String,
    pub top_image: String,
    pub images: BTreeSet<String>,
    pub videos: BTreeSet<String>,
    pub markup: Markup,
}

impl ExtractedArticle {
    /// An article with no content at all, used as a base by tests and stubs.
    pub fn blank(markup: Markup) -> Self {
        Self {
            title: String::new(),
            authors: Vec::new(),
            keywords: Vec::new(),
            summary: String::new(),
            text: String::new(),
            top_image: String::new(),
            images: BTreeSet::new(),
            videos: BTreeSet::new(),
            markup,
        }
    }

    /// Finalize into a terminal record with the markup that was settled on.
    pub fn into_record(self, markup: String, http_code: u16) -> ExtractionRecord {
        ExtractionRecord {
            title: self.title,
            authors: self.authors,
            keywords: self.keywords,
            summary: self.summary,
            text: self.text,
            top_image: self.top_image,
            images: self.images,
            videos: self.videos,
            markup,
            http_code,
        }
    }
}

/// The fixed-schema terminal record for one URL.
///
/// Every field is always present; a failed URL has empty strings and
/// collections and still carries the last known HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub summary: String,
    pub text: String,
    pub top_image: String,
    pub images: BTreeSet<String>,
    pub videos: BTreeSet<String>,
    pub markup: String,
    pub http_code: u16,
}

impl ExtractionRecord {
    /// A record with every content field empty.
    pub fn empty(http_code: u16) -> Self {
        ExtractedArticle::blank(Markup::Unset).into_record(String::new(), http_code)
    }

    /// The record for a URL that failed the reachability probe.
    pub fn unreachable() -> Self {
        Self::empty(UNREACHABLE)
    }

    /// True when nothing but the status code was filled in.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.authors.is_empty()
            && self.keywords.is_empty()
            && self.summary.is_empty()
            && self.text.is_empty()
            && self.top_image.is_empty()
            && self.images.is_empty()
            && self.videos.is_empty()
            && self.markup.is_empty()
    }
}

/// A day's ordered input records.
///
/// `columns` keeps the first-seen column order so the output tables list the
/// input fields the way the upstream file did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl Dataset {
    /// Build a dataset from parsed JSON.
    ///
    /// Two shapes are accepted:
    /// - an array of record objects: `[{"SOURCEURL": "..."}, ...]`
    /// - the column-oriented shape pandas writes by default:
    ///   `{"SOURCEURL": {"0": "...", "1": "..."}, ...}`
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Shape`] for anything else.
    pub fn from_json(value: Value) -> Result<Self, FeedError> {
        match value {
            Value::Array(items) => {
                let mut columns: Vec<String> = Vec::new();
                let mut rows = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let Value::Object(row) = item else {
                        return Err(FeedError::Shape(format!("record {i} is not an object")));
                    };
                    for key in row.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                    rows.push(row);
                }
                Ok(Dataset { columns, rows })
            }
            Value::Object(by_column) => {
                // Columns normally share one row index; later columns only
                // add the keys the first one lacked.
                let mut row_keys: Vec<&str> = Vec::new();
                let mut seen: HashSet<&str> = HashSet::new();
                for (column, cells) in &by_column {
                    let Value::Object(cells) = cells else {
                        return Err(FeedError::Shape(format!(
                            "column `{column}` is not an object of rows"
                        )));
                    };
                    for key in cells.keys() {
                        if seen.insert(key.as_str()) {
                            row_keys.push(key.as_str());
                        }
                    }
                }
                if row_keys.iter().all(|k| k.parse::<usize>().is_ok()) {
                    row_keys.sort_by_cached_key(|k| k.parse::<usize>().unwrap_or(usize::MAX));
                }

                let columns: Vec<String> = by_column.keys().cloned().collect();
                let rows = row_keys
                    .iter()
                    .map(|key| {
                        by_column
                            .iter()
                            .map(|(column, cells)| {
                                let cell = cells.get(key).cloned().unwrap_or(Value::Null);
                                (column.clone(), cell)
                            })
                            .collect::<Map<String, Value>>()
                    })
                    .collect();
                Ok(Dataset { columns, rows })
            }
            other => Err(FeedError::Shape(format!(
                "expected an array or object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The URL of every row, in order.
    ///
    /// A null or non-string cell yields an empty URL, which the prober treats
    /// as unreachable.
    ///
    /// # Errors
    ///
    /// [`HydrateError::MissingColumn`] if a non-empty dataset lacks `column`.
    pub fn urls(&self, column: &str) -> Result<Vec<String>, HydrateError> {
        if !self.rows.is_empty() && !self.columns.iter().any(|c| c == column) {
            return Err(HydrateError::MissingColumn(column.to_string()));
        }
        Ok(self
            .rows
            .iter()
            .map(|row| match row.get(column) {
                Some(Value::String(url)) => url.trim().to_string(),
                _ => String::new(),
            })
            .collect())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_task_batch_numbers_in_order() {
        let tasks = UrlTask::batch(["http://a.example", "http://b.example"]);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].index, 0);
        assert_eq!(tasks[1].index, 1);
        assert_eq!(tasks[1].url, "http://b.example");
    }

    #[test]
    fn test_probe_sentinel() {
        assert!(ProbeResult::unreachable().is_unreachable());
        assert!(!ProbeResult::new(200).is_unreachable());
        assert!(!ProbeResult::new(410).is_unreachable());
    }

    #[test]
    fn test_markup_from_body() {
        assert_eq!(Markup::from_body("  \n".into()), Markup::Empty);
        assert!(Markup::from_body("<html></html>".into()).is_present());
    }

    #[test]
    fn test_empty_record_keeps_status() {
        let record = ExtractionRecord::empty(500);
        assert!(record.is_empty());
        assert_eq!(record.http_code, 500);
        assert_eq!(ExtractionRecord::unreachable().http_code, 404);
    }

    #[test]
    fn test_record_serializes_every_field() {
        let json = serde_json::to_value(ExtractionRecord::unreachable()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "title", "authors", "keywords", "summary", "text", "top_image", "images",
                "videos", "markup", "http_code"
            ]
        );
    }

    #[test]
    fn test_dataset_from_records() {
        let ds = Dataset::from_json(json!([
            {"GLOBALEVENTID": 1, "SOURCEURL": "http://a.example"},
            {"GLOBALEVENTID": 2, "SOURCEURL": "http://b.example", "AvgTone": -1.5}
        ]))
        .unwrap();
        assert_eq!(ds.columns, vec!["GLOBALEVENTID", "SOURCEURL", "AvgTone"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(
            ds.urls("SOURCEURL").unwrap(),
            vec!["http://a.example", "http://b.example"]
        );
    }

    #[test]
    fn test_dataset_from_pandas_columns() {
        let ds = Dataset::from_json(json!({
            "SOURCEURL": {"0": "http://a.example", "10": "http://c.example", "2": "http://b.example"},
            "QuadClass": {"0": 1, "2": 4, "10": 3}
        }))
        .unwrap();
        assert_eq!(ds.columns, vec!["SOURCEURL", "QuadClass"]);
        assert_eq!(
            ds.urls("SOURCEURL").unwrap(),
            vec!["http://a.example", "http://b.example", "http://c.example"]
        );
        assert_eq!(ds.rows[2]["QuadClass"], json!(3));
    }

    #[test]
    fn test_dataset_from_pandas_columns_with_ragged_rows() {
        let ds = Dataset::from_json(json!({
            "SOURCEURL": {"0": "http://a.example"},
            "QuadClass": {"1": 2, "0": 1}
        }))
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.urls("SOURCEURL").unwrap(), vec!["http://a.example", ""]);
        assert_eq!(ds.rows[1]["QuadClass"], json!(2));
    }

    #[test]
    fn test_dataset_from_pandas_columns_at_day_scale() {
        const ROWS: usize = 20_000;
        let mut by_column = Map::new();
        for c in 0..12 {
            let cells: Map<String, Value> = (0..ROWS)
                .map(|r| (r.to_string(), Value::String(format!("http://site{c}.example/{r}"))))
                .collect();
            by_column.insert(format!("COL{c}"), Value::Object(cells));
        }

        let t0 = std::time::Instant::now();
        let ds = Dataset::from_json(Value::Object(by_column)).unwrap();
        let elapsed = t0.elapsed();

        assert_eq!(ds.len(), ROWS);
        assert_eq!(ds.columns.len(), 12);
        assert_eq!(ds.rows[ROWS - 1]["COL3"], json!(format!("http://site3.example/{}", ROWS - 1)));
        assert!(elapsed < std::time::Duration::from_secs(3), "took {elapsed:?}");
    }

    #[test]
    fn test_dataset_rejects_scalars() {
        assert!(matches!(
            Dataset::from_json(json!("nope")),
            Err(FeedError::Shape(_))
        ));
        assert!(matches!(
            Dataset::from_json(json!([1, 2])),
            Err(FeedError::Shape(_))
        ));
    }

    #[test]
    fn test_missing_url_column() {
        let ds = Dataset::from_json(json!([{"GLOBALEVENTID": 1}])).unwrap();
        assert!(matches!(
            ds.urls("SOURCEURL"),
            Err(HydrateError::MissingColumn(c)) if c == "SOURCEURL"
        ));
    }

    #[test]
    fn test_non_string_url_becomes_empty() {
        let ds = Dataset::from_json(json!([
            {"SOURCEURL": null},
            {"SOURCEURL": 42},
            {"SOURCEURL": " http://a.example "}
        ]))
        .unwrap();
        assert_eq!(ds.urls("SOURCEURL").unwrap(), vec!["", "", "http://a.example"]);
    }
}
