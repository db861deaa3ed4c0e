// src/schema/columns.rs
//
// Canonical column vocabulary plus the many-to-one alias table that maps the
// raw per-year field names onto it. The survey files were exported by
// different tools in different years, so the same attribute shows up under
// half a dozen spellings.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const STATION_ID: &str = "station_id";
pub const ROUTE_IDENTIFIER: &str = "route_identifier";
pub const ROUTE_NUMBER: &str = "route_number";
pub const YEAR: &str = "year";
pub const AVERAGE_DAILY_TRAFFIC: &str = "average_daily_traffic";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ROUTE_TYPE: &str = "route_type";
pub const ROUTE_TYPE_NUMBER: &str = "route_type_number";
pub const ROUTE_MILE_POINT: &str = "route_mile_point";
pub const ROUTE_LEG_DESCRIP: &str = "route_leg_descrip";
pub const ROUTE_LEG_BEGINMILE: &str = "route_leg_beginmile";
pub const ROUTE_LEG_ENDMILE: &str = "route_leg_endmile";
pub const COUNTY_ID: &str = "county_id";
pub const COUNTY_NAME: &str = "county_name";
/// Internal row-sequence column carried by some exports; dropped in cleaning.
pub const ROW_NUMBER: &str = "row_number";

/// Raw (normalized) name → canonical name. Many-to-one by design.
pub static COLUMN_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (raws, canonical) in [
        (&["station", "stationnu", "stationnum"][..], STATION_ID),
        (&["milepoint", "metermile", "metermilep"][..], ROUTE_MILE_POINT),
        (&["latitude", "lat"][..], LATITUDE),
        (&["longitude", "long"][..], LONGITUDE),
        (&["aadtyr", "year", "factored1", "factoreda1"][..], YEAR),
        (&["routelrs", "maplrs"][..], ROUTE_IDENTIFIER),
        (&["termini", "descriptio"][..], ROUTE_LEG_DESCRIP),
        (&["beginmilep", "beginmile", "bmp"][..], ROUTE_LEG_BEGINMILE),
        (&["endmilepo", "endmilepoi", "emp"][..], ROUTE_LEG_ENDMILE),
        // "routetype" is a textual code in some years and a numeric code in
        // others; canonical_headers() untangles that below.
        (&["routetype", "rtetype", "routetypen", "routetype1"][..], ROUTE_TYPE),
        (
            &["rtenum", "rtenumb", "routenumb", "routenum", "routenumbe"][..],
            ROUTE_NUMBER,
        ),
        (&["county", "countyname", "countynam"][..], COUNTY_NAME),
        (&["countyid", "countynumb"][..], COUNTY_ID),
        (
            &["aadt", "factoreda", "count", "factoredaa"][..],
            AVERAGE_DAILY_TRAFFIC,
        ),
        (&["id1"][..], ROW_NUMBER),
    ] {
        for raw in raws {
            m.insert(*raw, canonical);
        }
    }
    m
});

/// Strip underscores, lowercase, trim. Applied to every raw header before the
/// alias lookup.
pub fn normalize_header(raw: &str) -> String {
    raw.replace('_', "").to_lowercase().trim().to_string()
}

/// Map raw headers to canonical names. Unrecognized columns keep their
/// normalized name and are ignored at typed-record extraction.
///
/// A column that lands on `route_type` but holds numeric values is renamed
/// `route_type_number`: some years carry both the textual code ("US", "S")
/// and the numeric code under colliding raw names.
pub fn canonical_headers(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut out: Vec<String> = headers
        .iter()
        .map(|h| {
            let normalized = normalize_header(h);
            match COLUMN_ALIASES.get(normalized.as_str()) {
                Some(canonical) => (*canonical).to_string(),
                None => normalized,
            }
        })
        .collect();

    for (idx, name) in out.iter_mut().enumerate() {
        if name == ROUTE_TYPE && column_is_numeric(rows, idx) {
            *name = ROUTE_TYPE_NUMBER.to_string();
        }
    }
    out
}

/// True when every non-empty value in the column parses as a float and at
/// least one value is present.
fn column_is_numeric(rows: &[Vec<String>], idx: usize) -> bool {
    let mut saw_value = false;
    for row in rows {
        let Some(raw) = row.get(idx) else { continue };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.parse::<f64>().is_err() {
            return false;
        }
        saw_value = true;
    }
    saw_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_raw_headers() {
        assert_eq!(normalize_header("Station_Nu "), "stationnu");
        assert_eq!(normalize_header("FACTORED_AA"), "factoredaa");
        assert_eq!(normalize_header("lat"), "lat");
    }

    #[test]
    fn aliases_are_many_to_one() {
        for raw in ["station", "stationnu", "stationnum"] {
            assert_eq!(COLUMN_ALIASES[raw], STATION_ID);
        }
        assert_eq!(COLUMN_ALIASES["factoredaa"], AVERAGE_DAILY_TRAFFIC);
        assert_eq!(COLUMN_ALIASES["maplrs"], ROUTE_IDENTIFIER);
        assert_eq!(COLUMN_ALIASES["id1"], ROW_NUMBER);
    }

    #[test]
    fn maps_headers_and_keeps_unrecognized() {
        let headers = vec!["Station_Nu".to_string(), "GmRotation".to_string()];
        let rows = vec![vec!["12".to_string(), "0.5".to_string()]];
        let out = canonical_headers(&headers, &rows);
        assert_eq!(out, vec!["station_id", "gmrotation"]);
    }

    #[test]
    fn numeric_route_type_becomes_route_type_number() {
        let headers = vec!["RouteType".to_string(), "Rte_Type".to_string()];
        let rows = vec![
            vec!["7".to_string(), "US".to_string()],
            vec!["9.0".to_string(), "S".to_string()],
            vec!["".to_string(), "I".to_string()],
        ];
        let out = canonical_headers(&headers, &rows);
        assert_eq!(out, vec!["route_type_number", "route_type"]);
    }

    #[test]
    fn all_empty_route_type_column_is_left_textual() {
        let headers = vec!["RouteType".to_string()];
        let rows = vec![vec!["".to_string()], vec!["  ".to_string()]];
        let out = canonical_headers(&headers, &rows);
        assert_eq!(out, vec!["route_type"]);
    }
}
