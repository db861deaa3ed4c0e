// src/process/mod.rs

pub mod clean;
pub mod reconcile;
pub mod unify;

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::ingest;
use crate::model::{UnifiedTable, YearTable};

/// Run the whole reconciliation pipeline over a directory of per-year survey
/// files: normalize, clean, reconcile against the most recent year, unify.
pub fn build_unified_table(data_dir: &Path) -> Result<UnifiedTable> {
    let raw_tables = ingest::load_all(data_dir)?;

    let mut tables: Vec<YearTable> = raw_tables.into_iter().map(clean::clean_year).collect();
    for table in &tables {
        info!(year = table.year, rows = table.records.len(), "cleaned year");
    }

    // The most recent survey is the source of truth for static attributes.
    let ground_truth_year = tables
        .iter()
        .map(|t| t.year)
        .max()
        .expect("load_all rejects empty directories");
    reconcile::reconcile(&mut tables, ground_truth_year);

    Ok(unify::unify(tables))
}
