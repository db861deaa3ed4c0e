// src/model.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One survey file as it came off disk: year-specific raw headers and string
/// rows. Ephemeral; discarded once normalized into typed records.
#[derive(Debug)]
pub struct RawYearTable {
    pub year: i32,
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The natural key of a survey station: one physical monitoring point on one
/// route. Unique within a single year after cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub station_id: String,
    pub route_identifier: String,
    pub route_number: i64,
}

/// One survey observation in canonical form.
///
/// Every attribute that can legitimately be absent before cross-year
/// reconciliation is an `Option`; the reconciler and the group fill close
/// those gaps where another year has the value. `pct_changed` and `route`
/// stay `None` until derivation runs over the unified table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub key: IdentityKey,
    pub year: i32,
    pub average_daily_traffic: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub route_type: Option<String>,
    pub route_type_number: Option<f64>,
    pub route_mile_point: Option<f64>,
    pub route_leg_descrip: Option<String>,
    pub route_leg_beginmile: Option<f64>,
    pub route_leg_endmile: Option<f64>,
    pub county_id: Option<String>,
    pub county_name: Option<String>,
    pub pct_changed: Option<f64>,
    pub route: Option<String>,
}

impl TrafficRecord {
    pub fn new(key: IdentityKey, year: i32) -> Self {
        Self {
            key,
            year,
            average_daily_traffic: None,
            latitude: None,
            longitude: None,
            route_type: None,
            route_type_number: None,
            route_mile_point: None,
            route_leg_descrip: None,
            route_leg_beginmile: None,
            route_leg_endmile: None,
            county_id: None,
            county_name: None,
            pct_changed: None,
            route: None,
        }
    }

    /// Overwrite the static (time-invariant) attributes with the ground-truth
    /// record's values. A field the ground truth actually has replaces ours
    /// even when ours is present; a field the ground truth is missing leaves
    /// ours alone. The measure and the year are never touched.
    pub fn overwrite_static_from(&mut self, truth: &TrafficRecord) {
        macro_rules! take_present {
            ($($field:ident),+ $(,)?) => {$(
                if truth.$field.is_some() {
                    self.$field = truth.$field.clone();
                }
            )+};
        }
        take_present!(
            latitude,
            longitude,
            route_type,
            route_type_number,
            route_mile_point,
            route_leg_descrip,
            route_leg_beginmile,
            route_leg_endmile,
            county_id,
            county_name,
        );
    }

    /// True when any static attribute differs from `other`'s. Used to surface
    /// identity collisions that disagree on more than the measure.
    pub fn static_attrs_differ(&self, other: &TrafficRecord) -> bool {
        self.latitude != other.latitude
            || self.longitude != other.longitude
            || self.route_type != other.route_type
            || self.route_type_number != other.route_type_number
            || self.route_mile_point != other.route_mile_point
            || self.route_leg_descrip != other.route_leg_descrip
            || self.route_leg_beginmile != other.route_leg_beginmile
            || self.route_leg_endmile != other.route_leg_endmile
            || self.county_id != other.county_id
            || self.county_name != other.county_name
    }
}

/// All cleaned records for one survey year, identity-unique.
#[derive(Debug, Clone)]
pub struct YearTable {
    pub year: i32,
    pub records: Vec<TrafficRecord>,
}

/// The single output artifact of the pipeline: every year concatenated,
/// gap-filled and derived, sorted by (station_id, route_identifier,
/// route_number, year). Callers treat it as immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedTable {
    pub rows: Vec<TrafficRecord>,
}

impl UnifiedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct years present, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.rows.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    /// Number of distinct identities.
    pub fn station_count(&self) -> usize {
        let mut keys: Vec<&IdentityKey> = self.rows.iter().map(|r| &r.key).collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }
}
