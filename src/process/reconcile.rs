// src/process/reconcile.rs
//
// Cross-year reconciliation: the ground-truth year (the most recent one) is
// authoritative for static attributes. Every identity it knows about gets its
// attributes stamped onto the matching rows of every other year.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::model::{IdentityKey, TrafficRecord, YearTable};

/// Propagate static attributes from `ground_truth_year` into all other years.
///
/// Ground-truth rows without the measure are dropped first: a station the
/// authoritative survey could not measure does not belong in it. The measure
/// and the year columns of the target years are never overwritten.
pub fn reconcile(tables: &mut [YearTable], ground_truth_year: i32) {
    let mut truth: HashMap<IdentityKey, TrafficRecord> = HashMap::new();
    for table in tables.iter_mut() {
        if table.year != ground_truth_year {
            continue;
        }
        let before = table.records.len();
        table
            .records
            .retain(|r| r.average_daily_traffic.is_some());
        let dropped = before - table.records.len();
        if dropped > 0 {
            debug!(
                year = ground_truth_year,
                rows = dropped,
                "dropped unmeasured ground-truth rows"
            );
        }
        for rec in &table.records {
            truth.insert(rec.key.clone(), rec.clone());
        }
    }

    let mut updated = 0usize;
    for table in tables.iter_mut() {
        if table.year == ground_truth_year {
            continue;
        }
        for rec in &mut table.records {
            if let Some(authoritative) = truth.get(&rec.key) {
                rec.overwrite_static_from(authoritative);
                updated += 1;
            }
        }
    }
    info!(
        ground_truth_year,
        identities = truth.len(),
        rows_updated = updated,
        "reconciled static attributes"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(station: &str) -> IdentityKey {
        IdentityKey {
            station_id: station.to_string(),
            route_identifier: "R1".to_string(),
            route_number: 100,
        }
    }

    fn rec(station: &str, year: i32, adt: Option<f64>) -> TrafficRecord {
        let mut r = TrafficRecord::new(key(station), year);
        r.average_daily_traffic = adt;
        r
    }

    #[test]
    fn ground_truth_attributes_overwrite_other_years() {
        let mut truth = rec("S1", 2018, Some(1000.0));
        truth.county_name = Some("GREENVILLE".to_string());
        truth.latitude = Some(34.85);

        let mut other = rec("S1", 2015, Some(800.0));
        other.county_name = Some("Greenwood".to_string()); // present but wrong

        let mut tables = vec![
            YearTable { year: 2015, records: vec![other] },
            YearTable { year: 2018, records: vec![truth] },
        ];
        reconcile(&mut tables, 2018);

        let updated = &tables[0].records[0];
        assert_eq!(updated.county_name.as_deref(), Some("GREENVILLE"));
        assert_eq!(updated.latitude, Some(34.85));
        // measure and year stay that year's own
        assert_eq!(updated.average_daily_traffic, Some(800.0));
        assert_eq!(updated.year, 2015);
    }

    #[test]
    fn missing_ground_truth_field_leaves_target_value() {
        let truth = rec("S1", 2018, Some(1000.0)); // county_name None

        let mut other = rec("S1", 2015, Some(800.0));
        other.county_name = Some("GREENVILLE".to_string());

        let mut tables = vec![
            YearTable { year: 2015, records: vec![other] },
            YearTable { year: 2018, records: vec![truth] },
        ];
        reconcile(&mut tables, 2018);
        assert_eq!(
            tables[0].records[0].county_name.as_deref(),
            Some("GREENVILLE")
        );
    }

    #[test]
    fn identities_absent_from_ground_truth_keep_their_own() {
        let truth = rec("S1", 2018, Some(1000.0));
        let mut other = rec("S9", 2015, Some(800.0));
        other.county_name = Some("PICKENS".to_string());

        let mut tables = vec![
            YearTable { year: 2015, records: vec![other] },
            YearTable { year: 2018, records: vec![truth] },
        ];
        reconcile(&mut tables, 2018);
        assert_eq!(tables[0].records[0].county_name.as_deref(), Some("PICKENS"));
    }

    #[test]
    fn unmeasured_ground_truth_rows_are_dropped() {
        let measured = rec("S1", 2018, Some(1000.0));
        let unmeasured = rec("S2", 2018, None);
        let mut tables = vec![YearTable {
            year: 2018,
            records: vec![measured, unmeasured],
        }];
        reconcile(&mut tables, 2018);
        assert_eq!(tables[0].records.len(), 1);
        assert_eq!(tables[0].records[0].key.station_id, "S1");
    }
}
