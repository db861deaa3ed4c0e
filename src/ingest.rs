// src/ingest.rs
//
// Discovery and raw parsing of the per-year survey exports. Each file becomes
// a RawYearTable of headers plus string rows; no interpretation happens here
// beyond pulling the survey year out of the file name.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::RawYearTable;

/// Recursively find survey files under `data_dir`, sorted for determinism.
pub fn scan_survey_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.csv", data_dir.display());
    let mut paths = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob pattern {pattern:?}"))? {
        paths.push(entry.context("reading directory entry")?);
    }
    paths.sort();
    Ok(paths)
}

/// Pull a 4-digit survey year out of a file name like `TrafficCounts2018.csv`.
pub fn extract_year_from_filename(name: &str) -> Option<i32> {
    let bytes = name.as_bytes();
    for window in bytes.windows(4) {
        if window.iter().all(u8::is_ascii_digit) {
            let year = window
                .iter()
                .fold(0i32, |acc, b| acc * 10 + i32::from(b - b'0'));
            if (2000..=2035).contains(&year) {
                return Some(year);
            }
        }
    }
    None
}

/// Read one survey file into a raw table. Malformed files fail the run with
/// context rather than yielding a partial table.
pub fn read_year_table(path: &Path) -> Result<RawYearTable> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let year = extract_year_from_filename(&file_name)
        .with_context(|| format!("no survey year in file name {file_name:?}"))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("reading headers of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("parsing {}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(file = %file_name, year, rows = rows.len(), "read survey file");
    Ok(RawYearTable {
        year,
        source: path.to_path_buf(),
        headers,
        rows,
    })
}

/// Load every survey file under `data_dir`, one table per year.
pub fn load_all(data_dir: &Path) -> Result<Vec<RawYearTable>> {
    let paths = scan_survey_files(data_dir)?;
    if paths.is_empty() {
        bail!("no survey files found under {}", data_dir.display());
    }

    let mut by_year: HashMap<i32, PathBuf> = HashMap::new();
    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        let table = read_year_table(&path)?;
        if let Some(previous) = by_year.insert(table.year, path.clone()) {
            bail!(
                "two files claim survey year {}: {} and {}",
                table.year,
                previous.display(),
                path.display()
            );
        }
        tables.push(table);
    }
    tables.sort_by_key(|t| t.year);
    info!(files = tables.len(), "loaded survey files");
    Ok(tables)
}

/// Trim whitespace and strip one layer of surrounding quotes.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse an optional float field; empty and unparseable values are missing.
pub fn parse_f64(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a coordinate that is either decimal degrees or sexagesimal
/// "deg:min:sec". Sexagesimal values take their sign from the degrees part
/// and are rounded to 5 decimal places.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return None;
    }
    if !cleaned.contains(':') {
        return cleaned.parse().ok();
    }

    let mut parts = cleaned.split(':');
    let degrees: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;

    let sign = if degrees > 0.0 {
        1.0
    } else if degrees < 0.0 {
        -1.0
    } else {
        0.0
    };
    let decimal = sign * (degrees.abs() + minutes / 60.0 + seconds / 3600.0);
    Some((decimal * 1e5).round() / 1e5)
}

/// Canonical string form of an identity component. Some years export numeric
/// station ids as floats ("123.0"); collapsing those to "123" lets the same
/// station match across years.
pub fn canonical_id(raw: &str) -> Option<String> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<f64>() {
        if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            return Some(format!("{}", v as i64));
        }
    }
    Some(cleaned)
}

/// Route numbers arrive as ints, floats, or float-formatted strings.
pub fn parse_route_number(raw: &str) -> Option<i64> {
    let v = parse_f64(raw)?;
    if v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}
