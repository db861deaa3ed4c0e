// src/store.rs
//
// The cached artifact: the unified table as one Parquet file, written once
// and reused by later runs, plus a small JSON run summary beside it.

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{
        Array, ArrayRef, Float64Array, Float64Builder, Int32Array, Int32Builder, Int64Array,
        Int64Builder, StringArray, StringBuilder,
    },
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression};
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::model::{IdentityKey, TrafficRecord, UnifiedTable};
use crate::process;

/// Arrow schema of the unified table. Identity and year are mandatory; every
/// other column is nullable.
pub fn unified_schema() -> Schema {
    Schema::new(vec![
        Field::new("station_id", DataType::Utf8, false),
        Field::new("route_identifier", DataType::Utf8, false),
        Field::new("route_number", DataType::Int64, false),
        Field::new("year", DataType::Int32, false),
        Field::new("average_daily_traffic", DataType::Float64, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
        Field::new("route_type", DataType::Utf8, true),
        Field::new("route_type_number", DataType::Float64, true),
        Field::new("route_mile_point", DataType::Float64, true),
        Field::new("route_leg_descrip", DataType::Utf8, true),
        Field::new("route_leg_beginmile", DataType::Float64, true),
        Field::new("route_leg_endmile", DataType::Float64, true),
        Field::new("county_id", DataType::Utf8, true),
        Field::new("county_name", DataType::Utf8, true),
        Field::new("pct_changed", DataType::Float64, true),
        Field::new("route", DataType::Utf8, true),
    ])
}

/// Build one RecordBatch holding the whole unified table.
pub fn to_record_batch(table: &UnifiedTable) -> Result<RecordBatch> {
    let n = table.rows.len();
    let mut station_id = StringBuilder::new();
    let mut route_identifier = StringBuilder::new();
    let mut route_number = Int64Builder::with_capacity(n);
    let mut year = Int32Builder::with_capacity(n);
    let mut adt = Float64Builder::with_capacity(n);
    let mut latitude = Float64Builder::with_capacity(n);
    let mut longitude = Float64Builder::with_capacity(n);
    let mut route_type = StringBuilder::new();
    let mut route_type_number = Float64Builder::with_capacity(n);
    let mut route_mile_point = Float64Builder::with_capacity(n);
    let mut route_leg_descrip = StringBuilder::new();
    let mut route_leg_beginmile = Float64Builder::with_capacity(n);
    let mut route_leg_endmile = Float64Builder::with_capacity(n);
    let mut county_id = StringBuilder::new();
    let mut county_name = StringBuilder::new();
    let mut pct_changed = Float64Builder::with_capacity(n);
    let mut route = StringBuilder::new();

    for rec in &table.rows {
        station_id.append_value(&rec.key.station_id);
        route_identifier.append_value(&rec.key.route_identifier);
        route_number.append_value(rec.key.route_number);
        year.append_value(rec.year);
        adt.append_option(rec.average_daily_traffic);
        latitude.append_option(rec.latitude);
        longitude.append_option(rec.longitude);
        route_type.append_option(rec.route_type.as_deref());
        route_type_number.append_option(rec.route_type_number);
        route_mile_point.append_option(rec.route_mile_point);
        route_leg_descrip.append_option(rec.route_leg_descrip.as_deref());
        route_leg_beginmile.append_option(rec.route_leg_beginmile);
        route_leg_endmile.append_option(rec.route_leg_endmile);
        county_id.append_option(rec.county_id.as_deref());
        county_name.append_option(rec.county_name.as_deref());
        pct_changed.append_option(rec.pct_changed);
        route.append_option(rec.route.as_deref());
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(station_id.finish()),
        Arc::new(route_identifier.finish()),
        Arc::new(route_number.finish()),
        Arc::new(year.finish()),
        Arc::new(adt.finish()),
        Arc::new(latitude.finish()),
        Arc::new(longitude.finish()),
        Arc::new(route_type.finish()),
        Arc::new(route_type_number.finish()),
        Arc::new(route_mile_point.finish()),
        Arc::new(route_leg_descrip.finish()),
        Arc::new(route_leg_beginmile.finish()),
        Arc::new(route_leg_endmile.finish()),
        Arc::new(county_id.finish()),
        Arc::new(county_name.finish()),
        Arc::new(pct_changed.finish()),
        Arc::new(route.finish()),
    ];
    RecordBatch::try_new(Arc::new(unified_schema()), columns).context("building record batch")
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("missing or mistyped column {name:?}"))
}

fn f64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| anyhow!("missing or mistyped column {name:?}"))
}

fn opt_string(arr: &StringArray, i: usize) -> Option<String> {
    if arr.is_null(i) {
        None
    } else {
        Some(arr.value(i).to_string())
    }
}

fn opt_f64(arr: &Float64Array, i: usize) -> Option<f64> {
    if arr.is_null(i) {
        None
    } else {
        Some(arr.value(i))
    }
}

/// Rebuild records from one batch of the cached table.
pub fn from_record_batch(batch: &RecordBatch) -> Result<Vec<TrafficRecord>> {
    let station_id = string_col(batch, "station_id")?;
    let route_identifier = string_col(batch, "route_identifier")?;
    let route_number = batch
        .column_by_name("route_number")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow!("missing or mistyped column \"route_number\""))?;
    let year = batch
        .column_by_name("year")
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow!("missing or mistyped column \"year\""))?;
    let adt = f64_col(batch, "average_daily_traffic")?;
    let latitude = f64_col(batch, "latitude")?;
    let longitude = f64_col(batch, "longitude")?;
    let route_type = string_col(batch, "route_type")?;
    let route_type_number = f64_col(batch, "route_type_number")?;
    let route_mile_point = f64_col(batch, "route_mile_point")?;
    let route_leg_descrip = string_col(batch, "route_leg_descrip")?;
    let route_leg_beginmile = f64_col(batch, "route_leg_beginmile")?;
    let route_leg_endmile = f64_col(batch, "route_leg_endmile")?;
    let county_id = string_col(batch, "county_id")?;
    let county_name = string_col(batch, "county_name")?;
    let pct_changed = f64_col(batch, "pct_changed")?;
    let route = string_col(batch, "route")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let key = IdentityKey {
            station_id: station_id.value(i).to_string(),
            route_identifier: route_identifier.value(i).to_string(),
            route_number: route_number.value(i),
        };
        let mut rec = TrafficRecord::new(key, year.value(i));
        rec.average_daily_traffic = opt_f64(adt, i);
        rec.latitude = opt_f64(latitude, i);
        rec.longitude = opt_f64(longitude, i);
        rec.route_type = opt_string(route_type, i);
        rec.route_type_number = opt_f64(route_type_number, i);
        rec.route_mile_point = opt_f64(route_mile_point, i);
        rec.route_leg_descrip = opt_string(route_leg_descrip, i);
        rec.route_leg_beginmile = opt_f64(route_leg_beginmile, i);
        rec.route_leg_endmile = opt_f64(route_leg_endmile, i);
        rec.county_id = opt_string(county_id, i);
        rec.county_name = opt_string(county_name, i);
        rec.pct_changed = opt_f64(pct_changed, i);
        rec.route = opt_string(route, i);
        rows.push(rec);
    }
    Ok(rows)
}

/// Write the unified table to `cache_path`, via a temp file then rename so a
/// failed run never leaves a half-written cache behind.
pub fn write_cache(table: &UnifiedTable, cache_path: &Path) -> Result<()> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let batch = to_record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .set_dictionary_enabled(true)
        .build();

    let temp_path = cache_path.with_extension("tmp");
    let file = File::create(&temp_path)
        .with_context(|| format!("creating {}", temp_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("opening parquet writer")?;
    writer.write(&batch).context("writing unified table")?;
    writer.close().context("closing parquet writer")?;
    fs::rename(&temp_path, cache_path).with_context(|| {
        format!(
            "renaming {} to {}",
            temp_path.display(),
            cache_path.display()
        )
    })?;
    info!(path = %cache_path.display(), rows = table.rows.len(), "wrote cache");
    Ok(())
}

/// Read a previously written cache back into a unified table.
pub fn read_cache(cache_path: &Path) -> Result<UnifiedTable> {
    let file =
        File::open(cache_path).with_context(|| format!("opening {}", cache_path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("opening parquet reader")?
        .build()
        .context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.context("reading record batch")?;
        rows.extend(from_record_batch(&batch)?);
    }
    info!(path = %cache_path.display(), rows = rows.len(), "loaded cache");
    Ok(UnifiedTable { rows })
}

#[derive(Debug, Serialize)]
struct RunSummary {
    rows: usize,
    stations: usize,
    years: Vec<i32>,
}

fn write_run_summary(table: &UnifiedTable, cache_path: &Path) -> Result<()> {
    let summary = RunSummary {
        rows: table.rows.len(),
        stations: table.station_count(),
        years: table.years(),
    };
    let path = cache_path.with_extension("summary.json");
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Reuse the cache when it exists; otherwise run the pipeline over `data_dir`
/// and write the cache plus a run summary.
pub fn load_or_build(data_dir: &Path, cache_path: &Path) -> Result<UnifiedTable> {
    if cache_path.is_file() {
        return read_cache(cache_path);
    }
    let table = process::build_unified_table(data_dir)?;
    write_cache(&table, cache_path)?;
    write_run_summary(&table, cache_path)?;
    Ok(table)
}
