// src/schema/corrections.rs
//
// Dataset-specific correction rules, kept as one auditable table instead of
// conditionals buried in the pipeline. These encode known quirks of the
// 2009-2018 survey exports and must be preserved verbatim.

use crate::model::TrafficRecord;
use crate::schema::columns::COUNTY_NAME;

/// Per-year column drops: (year, canonical column). The county_name column in
/// these exports holds something else entirely and cannot be trusted.
pub const COLUMN_DROPS: &[(i32, &str)] = &[
    (2009, COUNTY_NAME),
    (2012, COUNTY_NAME),
    (2017, COUNTY_NAME),
];

/// Canonical columns to discard for the given survey year.
pub fn dropped_columns(year: i32) -> Vec<&'static str> {
    COLUMN_DROPS
        .iter()
        .filter(|(y, _)| *y == year)
        .map(|(_, col)| *col)
        .collect()
}

/// Route type code "L" is a legacy spelling of "S" (state route). Substring
/// replacement, so "L-1" becomes "S-1".
pub fn fix_route_type(raw: &str) -> String {
    raw.replace('L', "S")
}

/// Numeric route-type code 9 is a legacy spelling of 7.
pub fn fix_route_type_number(n: f64) -> f64 {
    if n == 9.0 {
        7.0
    } else {
        n
    }
}

/// Route 385 is an interstate regardless of what any year's export claims.
pub const INTERSTATE_ROUTE_NUMBER: i64 = 385;

/// Force route 385 to interstate coding. Applied before the composite route
/// label is derived so the label reflects the corrected type.
pub fn apply_interstate_override(record: &mut TrafficRecord) {
    if record.key.route_number == INTERSTATE_ROUTE_NUMBER {
        record.route_type = Some("I".to_string());
        record.route_type_number = Some(1.0);
    }
}
