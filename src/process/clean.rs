// src/process/clean.rs
//
// Per-year cleaning: pick the usable columns out of the normalized header
// set, extract typed records, apply the correction rules, and collapse
// identity collisions. The output table is identity-unique.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::ingest::{canonical_id, clean_str, parse_coordinate, parse_f64, parse_route_number};
use crate::model::{IdentityKey, RawYearTable, TrafficRecord, YearTable};
use crate::schema::columns::{self, canonical_headers};
use crate::schema::corrections::{dropped_columns, fix_route_type, fix_route_type_number};

/// Canonical column name → index into the raw rows. Duplicate canonical
/// names resolve first-wins; per-year drops and the row-sequence/secondary-id
/// columns never make it in.
fn select_columns(headers: &[String], year: i32) -> HashMap<String, usize> {
    let drops = dropped_columns(year);
    let mut selected: HashMap<String, usize> = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        if name == columns::ROW_NUMBER || name == "id2" {
            continue;
        }
        if drops.contains(&name.as_str()) {
            continue;
        }
        if !is_canonical(name) {
            continue;
        }
        selected.entry(name.clone()).or_insert(idx);
    }
    selected
}

fn is_canonical(name: &str) -> bool {
    matches!(
        name,
        columns::STATION_ID
            | columns::ROUTE_IDENTIFIER
            | columns::ROUTE_NUMBER
            | columns::YEAR
            | columns::AVERAGE_DAILY_TRAFFIC
            | columns::LATITUDE
            | columns::LONGITUDE
            | columns::ROUTE_TYPE
            | columns::ROUTE_TYPE_NUMBER
            | columns::ROUTE_MILE_POINT
            | columns::ROUTE_LEG_DESCRIP
            | columns::ROUTE_LEG_BEGINMILE
            | columns::ROUTE_LEG_ENDMILE
            | columns::COUNTY_ID
            | columns::COUNTY_NAME
    )
}

/// Clean one year's raw table into identity-unique typed records.
pub fn clean_year(raw: RawYearTable) -> YearTable {
    let survey_year = raw.year;
    let headers = canonical_headers(&raw.headers, &raw.rows);
    let selected = select_columns(&headers, survey_year);

    let field = |row: &[String], name: &str| -> Option<String> {
        selected.get(name).and_then(|&i| row.get(i).cloned())
    };

    // Exact-duplicate rows (over the selected columns) collapse to one.
    let mut projection: Vec<usize> = selected.values().copied().collect();
    projection.sort_unstable();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut records: Vec<TrafficRecord> = Vec::with_capacity(raw.rows.len());
    let mut missing_identity = 0usize;

    for row in &raw.rows {
        let projected: Vec<String> = projection
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or_default())
            .collect();
        if !seen.insert(projected) {
            continue;
        }

        let station_id = field(row, columns::STATION_ID).and_then(|v| canonical_id(&v));
        let route_identifier =
            field(row, columns::ROUTE_IDENTIFIER).and_then(|v| canonical_id(&v));
        let route_number =
            field(row, columns::ROUTE_NUMBER).and_then(|v| parse_route_number(&v));
        let (Some(station_id), Some(route_identifier), Some(route_number)) =
            (station_id, route_identifier, route_number)
        else {
            missing_identity += 1;
            continue;
        };

        let key = IdentityKey {
            station_id,
            route_identifier,
            route_number,
        };
        let year = field(row, columns::YEAR)
            .and_then(|v| parse_f64(&v))
            .map(|v| v as i32)
            .unwrap_or(survey_year);
        let mut rec = TrafficRecord::new(key, year);

        rec.average_daily_traffic =
            field(row, columns::AVERAGE_DAILY_TRAFFIC).and_then(|v| parse_f64(&v));
        rec.latitude = field(row, columns::LATITUDE).and_then(|v| parse_coordinate(&v));
        rec.longitude = field(row, columns::LONGITUDE).and_then(|v| parse_coordinate(&v));
        rec.route_type = field(row, columns::ROUTE_TYPE)
            .map(|v| clean_str(&v))
            .filter(|v| !v.is_empty());
        rec.route_type_number =
            field(row, columns::ROUTE_TYPE_NUMBER).and_then(|v| parse_f64(&v));
        rec.route_mile_point =
            field(row, columns::ROUTE_MILE_POINT).and_then(|v| parse_f64(&v));
        rec.route_leg_descrip = field(row, columns::ROUTE_LEG_DESCRIP)
            .map(|v| clean_str(&v))
            .filter(|v| !v.is_empty());
        rec.route_leg_beginmile =
            field(row, columns::ROUTE_LEG_BEGINMILE).and_then(|v| parse_f64(&v));
        rec.route_leg_endmile =
            field(row, columns::ROUTE_LEG_ENDMILE).and_then(|v| parse_f64(&v));
        rec.county_id = field(row, columns::COUNTY_ID)
            .map(|v| clean_str(&v))
            .filter(|v| !v.is_empty());
        rec.county_name = field(row, columns::COUNTY_NAME)
            .map(|v| clean_str(&v))
            .filter(|v| !v.is_empty());

        records.push(rec);
    }

    if missing_identity > 0 {
        debug!(
            year = survey_year,
            rows = missing_identity,
            "dropped rows missing an identity component"
        );
    }

    for rec in &mut records {
        if let Some(rt) = rec.route_type.take() {
            rec.route_type = Some(fix_route_type(&rt));
        }
        if let Some(n) = rec.route_type_number {
            rec.route_type_number = Some(fix_route_type_number(n));
        }
    }

    YearTable {
        year: survey_year,
        records: resolve_collisions(survey_year, records),
    }
}

/// Collapse rows sharing an identity: the measure becomes the group mean over
/// present values, the first row in file order represents the group. Residual
/// disagreement on non-measure attributes is kept from the first row and
/// logged.
fn resolve_collisions(year: i32, records: Vec<TrafficRecord>) -> Vec<TrafficRecord> {
    let mut order: Vec<IdentityKey> = Vec::new();
    let mut groups: HashMap<IdentityKey, Vec<TrafficRecord>> = HashMap::new();
    for rec in records {
        if !groups.contains_key(&rec.key) {
            order.push(rec.key.clone());
        }
        groups.entry(rec.key.clone()).or_default().push(rec);
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let group = groups.remove(&key).unwrap_or_default();
        let measured: Vec<f64> = group
            .iter()
            .filter_map(|r| r.average_daily_traffic)
            .collect();
        let mean = if measured.is_empty() {
            None
        } else {
            Some(measured.iter().sum::<f64>() / measured.len() as f64)
        };

        let mut iter = group.into_iter();
        let Some(mut first) = iter.next() else { continue };
        let disagreements = iter.filter(|r| first.static_attrs_differ(r)).count();
        if disagreements > 0 {
            warn!(
                year,
                station = %first.key.station_id,
                route = %first.key.route_identifier,
                route_number = first.key.route_number,
                rows = disagreements + 1,
                "identity collision disagrees beyond the measure; keeping first row"
            );
        }
        first.average_daily_traffic = mean;
        out.push(first);
    }
    out
}
