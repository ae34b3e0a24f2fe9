//! Command-line interface definitions for the GDELT hydrator.
//!
//! Directory and concurrency flags override the matching fields of the
//! YAML configuration; everything else is configured through the file.

use crate::config::HydrateConfig;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the GDELT hydrator.
///
/// # Examples
///
/// ```sh
/// # Hydrate December 2020 with the default layout
/// gdelt_hydrator hydrate --start 2020-12-01 --end 2020-12-31
///
/// # Custom directories and a wider pool
/// gdelt_hydrator hydrate -s 2020-12-01 -e 2020-12-02 -d ./data --concurrency 48
///
/// # Copy status codes into the content tables afterwards
/// gdelt_hydrator correct -s 2020-12-01 -e 2020-12-31 -c config.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hydrate every day in a date range
    Hydrate {
        /// First day to process (YYYY-MM-DD)
        #[arg(short, long)]
        start: NaiveDate,

        /// Last day to process, inclusive (YYYY-MM-DD)
        #[arg(short, long)]
        end: NaiveDate,

        /// Optional path to config.yaml file
        #[arg(short, long, env = "GDELT_HYDRATOR_CONFIG")]
        config: Option<PathBuf>,

        /// Directory holding the daily input datasets
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Output directory for the content tables
        #[arg(long)]
        content_dir: Option<PathBuf>,

        /// Output directory for the markup tables
        #[arg(long)]
        markup_dir: Option<PathBuf>,

        /// Maximum URLs in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Copy status codes from the markup tables into the content tables
    Correct {
        /// First day to process (YYYY-MM-DD)
        #[arg(short, long)]
        start: NaiveDate,

        /// Last day to process, inclusive (YYYY-MM-DD)
        #[arg(short, long)]
        end: NaiveDate,

        /// Optional path to config.yaml file
        #[arg(short, long, env = "GDELT_HYDRATOR_CONFIG")]
        config: Option<PathBuf>,

        /// Output directory for the corrected tables
        #[arg(long)]
        corrected_dir: Option<PathBuf>,
    },
}

impl Command {
    pub fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Command::Hydrate { config, .. } | Command::Correct { config, .. } => config.as_ref(),
        }
    }

    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        match self {
            Command::Hydrate { start, end, .. } | Command::Correct { start, end, .. } => {
                (*start, *end)
            }
        }
    }

    /// Apply the flags that were given on top of `config`.
    pub fn apply_overrides(&self, config: &mut HydrateConfig) {
        match self {
            Command::Hydrate {
                data_dir,
                content_dir,
                markup_dir,
                concurrency,
                ..
            } => {
                if let Some(dir) = data_dir {
                    config.data_dir = dir.clone();
                }
                if let Some(dir) = content_dir {
                    config.content_dir = dir.clone();
                }
                if let Some(dir) = markup_dir {
                    config.markup_dir = dir.clone();
                }
                if let Some(n) = concurrency {
                    config.concurrency = *n;
                }
            }
            Command::Correct { corrected_dir, .. } => {
                if let Some(dir) = corrected_dir {
                    config.corrected_dir = dir.clone();
                }
            }
        }
    }
}
