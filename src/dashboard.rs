// src/dashboard.rs
//
// The presentation layer's contract over the unified table, expressed as pure
// functions: (filter state, frame) in, option lists or chart data out. No
// server, no callbacks, no shared mutable state.

use serde::Serialize;
use std::env;

use crate::model::UnifiedTable;

/// Sentinel option meaning "no filter on this dimension".
pub const ALL: &str = "ALL";

/// One dropdown entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlicerOption {
    pub label: String,
    pub value: String,
}

/// Multi-select state of the three categorical slicers. An empty selection or
/// one containing the ALL sentinel leaves that dimension unfiltered.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub route_types: Vec<String>,
    pub county_names: Vec<String>,
    pub routes: Vec<String>,
}

fn unfiltered(selection: &[String]) -> bool {
    selection.is_empty() || selection.iter().any(|v| v == ALL)
}

fn selected(selection: &[String], value: Option<&str>) -> bool {
    if unfiltered(selection) {
        return true;
    }
    match value {
        Some(v) => selection.iter().any(|s| s == v),
        None => false,
    }
}

/// Which derived column feeds the plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Adt,
    Log10Adt,
    PctChange,
}

impl Scale {
    pub fn title(self) -> &'static str {
        match self {
            Scale::Adt => "Average Daily Traffic",
            Scale::Log10Adt => "Log10(Average Daily Traffic)",
            Scale::PctChange => "Total Pct Change",
        }
    }
}

/// One bubble on the geographic plot.
#[derive(Debug, Clone, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub size: f64,
    pub color: f64,
    pub text: String,
}

/// Per-year value series for the distribution plot, plus per-year medians.
#[derive(Debug, Clone, Serialize)]
pub struct YearDistribution {
    pub points: Vec<(i32, f64)>,
    pub medians: Vec<(i32, f64)>,
}

struct FrameRow {
    year: i32,
    latitude: Option<f64>,
    longitude: Option<f64>,
    average_daily_traffic: Option<f64>,
    log10_adt: Option<f64>,
    total_pct_change: Option<f64>,
    route_type: Option<String>,
    county_name: Option<String>,
    route: Option<String>,
    route_leg_descrip: Option<String>,
}

/// Read-only view of the unified table with the consumer-derived columns
/// (`log10_adt`, `total_pct_change`) precomputed. Safe to share across
/// consumers; nothing here mutates it.
pub struct DashboardFrame {
    rows: Vec<FrameRow>,
}

impl DashboardFrame {
    pub fn new(table: &UnifiedTable) -> Self {
        let rows = table
            .rows
            .iter()
            .map(|r| FrameRow {
                year: r.year,
                latitude: r.latitude,
                longitude: r.longitude,
                average_daily_traffic: r.average_daily_traffic,
                log10_adt: r
                    .average_daily_traffic
                    .filter(|v| *v > 0.0)
                    .map(f64::log10),
                total_pct_change: r.pct_changed,
                route_type: r.route_type.clone(),
                county_name: r.county_name.clone(),
                route: r.route.clone(),
                route_leg_descrip: r.route_leg_descrip.clone(),
            })
            .collect();
        Self { rows }
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.rows.iter().map(|r| r.year).max()
    }

    fn matches(&self, row: &FrameRow, filter: &FilterState) -> bool {
        selected(&filter.route_types, row.route_type.as_deref())
            && selected(&filter.county_names, row.county_name.as_deref())
            && selected(&filter.routes, row.route.as_deref())
    }

    fn options_for<F>(&self, keep: F, get: impl Fn(&FrameRow) -> Option<&str>) -> Vec<SlicerOption>
    where
        F: Fn(&FrameRow) -> bool,
    {
        let mut values: Vec<String> = self
            .rows
            .iter()
            .filter(|r| keep(r))
            .filter_map(|r| get(r).map(str::to_string))
            .collect();
        values.sort();
        values.dedup();

        let mut options = vec![SlicerOption {
            label: ALL.to_string(),
            value: ALL.to_string(),
        }];
        options.extend(values.into_iter().map(|v| SlicerOption {
            label: v.clone(),
            value: v,
        }));
        options
    }

    /// Route-type options, cascaded from the other two slicers.
    pub fn route_type_options(&self, filter: &FilterState) -> Vec<SlicerOption> {
        self.options_for(
            |r| {
                selected(&filter.county_names, r.county_name.as_deref())
                    && selected(&filter.routes, r.route.as_deref())
            },
            |r| r.route_type.as_deref(),
        )
    }

    /// County options, cascaded from the other two slicers.
    pub fn county_options(&self, filter: &FilterState) -> Vec<SlicerOption> {
        self.options_for(
            |r| {
                selected(&filter.route_types, r.route_type.as_deref())
                    && selected(&filter.routes, r.route.as_deref())
            },
            |r| r.county_name.as_deref(),
        )
    }

    /// Composite-route options, cascaded from the other two slicers.
    pub fn route_options(&self, filter: &FilterState) -> Vec<SlicerOption> {
        self.options_for(
            |r| {
                selected(&filter.route_types, r.route_type.as_deref())
                    && selected(&filter.county_names, r.county_name.as_deref())
            },
            |r| r.route.as_deref(),
        )
    }

    fn scale_value(row: &FrameRow, scale: Scale) -> Option<f64> {
        match scale {
            Scale::Adt => row.average_daily_traffic,
            Scale::Log10Adt => row.log10_adt,
            Scale::PctChange => row.total_pct_change,
        }
    }

    /// Bubble size follows the original layout: ln(adt)/2 for raw counts, the
    /// value itself for log10, |pct|/100 for percent change.
    fn scale_size(row: &FrameRow, scale: Scale) -> Option<f64> {
        match scale {
            Scale::Adt => row
                .average_daily_traffic
                .filter(|v| *v > 0.0)
                .map(|v| v.ln() / 2.0),
            Scale::Log10Adt => row.log10_adt,
            Scale::PctChange => row.total_pct_change.map(|v| v.abs() / 100.0),
        }
    }

    /// Geographic plot data for one year under the given filter. Rows without
    /// coordinates or without the scaled value are left off the map.
    pub fn map_points(&self, filter: &FilterState, scale: Scale, year: i32) -> Vec<MapPoint> {
        self.rows
            .iter()
            .filter(|r| r.year == year && self.matches(r, filter))
            .filter_map(|r| {
                let latitude = r.latitude?;
                let longitude = r.longitude?;
                let color = Self::scale_value(r, scale)?;
                let size = Self::scale_size(r, scale)?;
                let adt = r
                    .average_daily_traffic
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                let text = format!(
                    "Route: {}<br>Route Leg: {}<br>AverageDailyTraffic: {}",
                    r.route.as_deref().unwrap_or(""),
                    r.route_leg_descrip.as_deref().unwrap_or(""),
                    adt
                );
                Some(MapPoint {
                    latitude,
                    longitude,
                    size,
                    color,
                    text,
                })
            })
            .collect()
    }

    /// Distribution-over-time data under the given filter.
    pub fn year_distribution(&self, filter: &FilterState, scale: Scale) -> YearDistribution {
        let mut points: Vec<(i32, f64)> = self
            .rows
            .iter()
            .filter(|r| self.matches(r, filter))
            .filter_map(|r| Self::scale_value(r, scale).map(|v| (r.year, v)))
            .collect();
        points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut medians = Vec::new();
        let mut start = 0;
        while start < points.len() {
            let year = points[start].0;
            let mut end = start + 1;
            while end < points.len() && points[end].0 == year {
                end += 1;
            }
            let mut values: Vec<f64> = points[start..end].iter().map(|p| p.1).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            medians.push((year, median_of_sorted(&values)));
            start = end;
        }

        YearDistribution { points, medians }
    }
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Access token for the map tile provider, supplied by the environment.
pub fn mapbox_token() -> Option<String> {
    env::var("MAPBOX_KEY").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IdentityKey, TrafficRecord};

    fn row(
        station: &str,
        year: i32,
        adt: f64,
        route_type: &str,
        county: &str,
        route: &str,
    ) -> TrafficRecord {
        let key = IdentityKey {
            station_id: station.to_string(),
            route_identifier: "R".to_string(),
            route_number: 1,
        };
        let mut r = TrafficRecord::new(key, year);
        r.average_daily_traffic = Some(adt);
        r.latitude = Some(34.0);
        r.longitude = Some(-81.0);
        r.route_type = Some(route_type.to_string());
        r.county_name = Some(county.to_string());
        r.route = Some(route.to_string());
        r
    }

    fn frame() -> DashboardFrame {
        DashboardFrame::new(&UnifiedTable {
            rows: vec![
                row("1", 2017, 100.0, "I", "GREENVILLE", "I-385"),
                row("2", 2018, 1000.0, "I", "GREENVILLE", "I-385"),
                row("3", 2018, 10000.0, "US", "PICKENS", "US-123"),
            ],
        })
    }

    #[test]
    fn empty_and_all_selections_are_unfiltered() {
        let f = frame();
        let none = FilterState::default();
        let all = FilterState {
            route_types: vec![ALL.to_string()],
            ..Default::default()
        };
        assert_eq!(f.map_points(&none, Scale::Adt, 2018).len(), 2);
        assert_eq!(f.map_points(&all, Scale::Adt, 2018).len(), 2);
    }

    #[test]
    fn filters_compose() {
        let f = frame();
        let filter = FilterState {
            route_types: vec!["I".to_string()],
            county_names: vec!["PICKENS".to_string()],
            routes: vec![],
        };
        assert!(f.map_points(&filter, Scale::Adt, 2018).is_empty());
    }

    #[test]
    fn options_cascade_from_other_slicers() {
        let f = frame();
        let filter = FilterState {
            county_names: vec!["PICKENS".to_string()],
            ..Default::default()
        };
        let options = f.route_type_options(&filter);
        let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec![ALL, "US"]);
        // a slicer's own selection does not restrict its option list
        let filter = FilterState {
            route_types: vec!["I".to_string()],
            ..Default::default()
        };
        let values: Vec<String> = f
            .route_type_options(&filter)
            .into_iter()
            .map(|o| o.value)
            .collect();
        assert_eq!(values, vec![ALL.to_string(), "I".to_string(), "US".to_string()]);
    }

    #[test]
    fn log10_scale_values() {
        let f = frame();
        let points = f.map_points(&FilterState::default(), Scale::Log10Adt, 2018);
        let mut colors: Vec<f64> = points.iter().map(|p| p.color).collect();
        colors.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(colors, vec![3.0, 4.0]);
    }

    #[test]
    fn pct_change_scale_skips_first_observations() {
        let f = frame();
        // none of the fixture rows carry pct_changed
        assert!(f.map_points(&FilterState::default(), Scale::PctChange, 2018).is_empty());
    }

    #[test]
    fn year_distribution_medians() {
        let f = frame();
        let dist = f.year_distribution(&FilterState::default(), Scale::Adt);
        assert_eq!(dist.medians, vec![(2017, 100.0), (2018, 5500.0)]);
        assert_eq!(dist.points.len(), 3);
    }

    #[test]
    fn latest_year_found() {
        assert_eq!(frame().latest_year(), Some(2018));
    }
}
