//! Persistence of hydrated tables.
//!
//! Each day produces two CSV files, kept apart because raw markup dwarfs
//! every other column:
//!
//! ```text
//! content_dir/
//! └── IN_2020-12-17-hyd.csv         # input fields + article content
//! markup_dir/
//! └── IN_2020-12-17-hyd_html.csv    # row, markup, http_code
//! corrected_dir/
//! └── IN_2020-12-17-hyd_http.csv    # content + http_code (see `correct`)
//! ```
//!
//! Every table starts with a `row` column holding the input position.

pub mod csv;

use chrono::NaiveDate;

/// `{prefix}_{day}-hyd.csv`
pub fn content_file_name(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}_{day}-hyd.csv")
}

/// `{prefix}_{day}-hyd_html.csv`
pub fn markup_file_name(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}_{day}-hyd_html.csv")
}

/// `{prefix}_{day}-hyd_http.csv`
pub fn corrected_file_name(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}_{day}-hyd_http.csv")
}
