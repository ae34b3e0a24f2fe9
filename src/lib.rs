//! # GDELT Hydrator
//!
//! Hydrates daily GDELT event datasets with the content of the news pages
//! their `SOURCEURL` column points at.
//!
//! ## Architecture
//!
//! For every day in a date range:
//! 1. **Loading**: read the day's dataset from disk or an upstream feed, retrying transient failures
//! 2. **Hydrating**: probe, extract, and backfill markup for every URL through a bounded worker pool
//! 3. **Merging**: concatenate records onto the input rows by position
//! 4. **Output**: write a content table and a markup table as CSV
//!
//! A separate correction pass copies the status codes from the markup
//! tables into the content tables.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod correct;
pub mod driver;
pub mod error;
pub mod feed;
pub mod hydrate;
pub mod models;
pub mod outputs;
pub mod utils;

#[cfg(test)]
mod test_support;
