//! Fixed-radius perimeter classification.
//!
//! Counts the incidents within `radius_meters` of a point (after applying
//! the caller's filters), maps the count to a [`RiskLevel`], and builds
//! the per crime type breakdown and safety tips.

use std::collections::BTreeMap;

use crime_risk_crime_models::CrimeTypeCatalog;
use crime_risk_risk_models::{
    Coordinates, CrimeTypeCount, IncidentFilter, IncidentRecord, RiskAssessment,
};
use geo::{Distance as _, Haversine, Point};

use crate::config::RiskConfig;
use crate::{RiskError, tips};

/// Classifies the perimeter around `center`.
///
/// An empty (or fully filtered out) incident set yields a zero-count
/// `LOW` assessment rather than an error.
///
/// # Errors
///
/// Returns [`RiskError::Validation`] if `center` is NaN or out of range,
/// or if the filter's date bounds are inverted.
pub fn assess_perimeter(
    center: Coordinates,
    incidents: &[IncidentRecord],
    filter: &IncidentFilter,
    catalog: &CrimeTypeCatalog,
    config: &RiskConfig,
) -> Result<RiskAssessment, RiskError> {
    let center = center.validated()?;
    validate_filter(filter)?;

    let candidates: Vec<&IncidentRecord> = filtered(incidents, filter).collect();
    let nearby = within_radius(center, &candidates, config.radius_meters);

    log::debug!(
        "Perimeter ({}, {}): {} of {} incidents within {}m",
        center.lat,
        center.lng,
        nearby.len(),
        incidents.len(),
        config.radius_meters
    );

    Ok(build_assessment(center, &nearby, catalog, config))
}

/// Rejects a filter whose `date_from` is after its `date_to`.
///
/// # Errors
///
/// Returns [`RiskError::Validation`] for inverted date bounds.
pub fn validate_filter(filter: &IncidentFilter) -> Result<(), RiskError> {
    if let (Some(from), Some(to)) = (filter.date_from, filter.date_to)
        && from > to
    {
        return Err(RiskError::Validation {
            message: format!("dateFrom ({from}) is after dateTo ({to})"),
        });
    }
    Ok(())
}

/// Incidents that pass `filter` and carry usable coordinates.
pub(crate) fn filtered<'a>(
    incidents: &'a [IncidentRecord],
    filter: &'a IncidentFilter,
) -> impl Iterator<Item = &'a IncidentRecord> {
    incidents.iter().filter(move |incident| {
        incident.coordinates.is_some_and(|c| c.is_valid()) && filter.matches(incident)
    })
}

/// Incidents from `candidates` whose great-circle distance to `center` is
/// at most `radius_meters`.
pub(crate) fn within_radius<'a>(
    center: Coordinates,
    candidates: &[&'a IncidentRecord],
    radius_meters: f64,
) -> Vec<&'a IncidentRecord> {
    let origin = Point::new(center.lng, center.lat);
    candidates
        .iter()
        .copied()
        .filter(|incident| {
            incident.coordinates.is_some_and(|c| {
                Haversine.distance(origin, Point::new(c.lng, c.lat)) <= radius_meters
            })
        })
        .collect()
}

/// Groups `incidents` by crime type, largest first with ties broken by
/// ascending crime type ID.
///
/// Percentages are relative to `total`, which may exceed the sum of the
/// counts when some incidents have no crime type.
pub(crate) fn crime_type_breakdown(
    incidents: &[&IncidentRecord],
    total: u32,
    catalog: &CrimeTypeCatalog,
) -> Vec<CrimeTypeCount> {
    let mut counts: BTreeMap<i32, u32> = BTreeMap::new();
    for id in incidents.iter().filter_map(|i| i.crime_type_id) {
        *counts.entry(id).or_insert(0) += 1;
    }

    let mut breakdown: Vec<CrimeTypeCount> = counts
        .into_iter()
        .map(|(id, count)| CrimeTypeCount {
            crime_type_id: id,
            crime_type: catalog.name(id),
            count,
            percentage: percentage(count, total),
        })
        .collect();

    // Stable sort keeps the BTreeMap's ascending-ID order within ties.
    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown
}

fn percentage(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * f64::from(count) / f64::from(total)
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn count(incidents: &[&IncidentRecord]) -> u32 {
    incidents.len().min(u32::MAX as usize) as u32
}

fn build_assessment(
    center: Coordinates,
    nearby: &[&IncidentRecord],
    catalog: &CrimeTypeCatalog,
    config: &RiskConfig,
) -> RiskAssessment {
    let crime_count = count(nearby);
    let risk_level = config.thresholds.level_for(crime_count);
    let crime_type_breakdown = crime_type_breakdown(nearby, crime_count, catalog);
    let safety_tips = tips::safety_tips(risk_level, &crime_type_breakdown, config);

    RiskAssessment {
        center,
        radius_meters: config.radius_meters,
        risk_level,
        crime_count,
        crime_type_breakdown,
        safety_tips,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, TimeZone as _, Utc};
    use crime_risk_crime_models::{CaseStatus, CrimeType};
    use crime_risk_risk_models::RiskLevel;

    use super::*;

    fn catalog() -> CrimeTypeCatalog {
        CrimeTypeCatalog::new([
            CrimeType {
                id: 1,
                name: "Theft".to_string(),
                description: None,
            },
            CrimeType {
                id: 2,
                name: "Robbery".to_string(),
                description: None,
            },
            CrimeType {
                id: 3,
                name: "Physical Injury".to_string(),
                description: None,
            },
        ])
    }

    fn incident(id: i64, lat: f64, lng: f64, crime_type_id: Option<i32>) -> IncidentRecord {
        IncidentRecord {
            id,
            coordinates: Some(Coordinates::new(lat, lng)),
            crime_type_id,
            status: Some(CaseStatus::Open),
            barangay: Some("Poblacion".to_string()),
            incident_timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()),
        }
    }

    fn assess(center: Coordinates, incidents: &[IncidentRecord]) -> RiskAssessment {
        assess_perimeter(
            center,
            incidents,
            &IncidentFilter::default(),
            &catalog(),
            &RiskConfig::embedded(),
        )
        .unwrap()
    }

    #[test]
    fn counts_only_incidents_inside_radius() {
        let incidents = vec![
            incident(1, 14.4001, 121.0451, Some(1)),
            incident(2, 14.4002, 121.0452, Some(1)),
            incident(3, 14.41, 121.10, Some(2)),
        ];
        let result = assess(Coordinates::new(14.40, 121.045), &incidents);

        assert_eq!(result.crime_count, 2);
        assert_eq!(result.risk_level, RiskLevel::LowMedium);
        assert_eq!(result.crime_type_breakdown.len(), 1);
        assert_eq!(result.crime_type_breakdown[0].crime_type, "Theft");
        assert_eq!(result.crime_type_breakdown[0].count, 2);
        assert!((result.crime_type_breakdown[0].percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        // ~0.0027 degrees of latitude is ~300m; step well inside and
        // well outside.
        let incidents = vec![
            incident(1, 14.4026, 121.0, Some(1)),
            incident(2, 14.4029, 121.0, Some(1)),
        ];
        let result = assess(Coordinates::new(14.40, 121.0), &incidents);
        assert_eq!(result.crime_count, 1);
    }

    #[test]
    fn empty_incident_set_is_low_not_error() {
        let result = assess(Coordinates::new(14.40, 121.045), &[]);
        assert_eq!(result.crime_count, 0);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.crime_type_breakdown.is_empty());
        assert_eq!(result.safety_tips.len(), 1);
    }

    #[test]
    fn rejects_invalid_center() {
        let err = assess_perimeter(
            Coordinates::new(f64::NAN, 121.0),
            &[],
            &IncidentFilter::default(),
            &catalog(),
            &RiskConfig::embedded(),
        )
        .unwrap_err();
        assert!(matches!(err, RiskError::Validation { .. }));

        assert!(
            assess_perimeter(
                Coordinates::new(14.0, 200.0),
                &[],
                &IncidentFilter::default(),
                &catalog(),
                &RiskConfig::embedded(),
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_inverted_dates() {
        let filter = IncidentFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 5, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 4, 1),
            ..IncidentFilter::default()
        };
        assert!(
            assess_perimeter(
                Coordinates::new(14.4, 121.0),
                &[],
                &filter,
                &catalog(),
                &RiskConfig::embedded(),
            )
            .is_err()
        );
    }

    #[test]
    fn skips_incidents_without_coordinates() {
        let mut missing = incident(1, 14.4, 121.0, Some(1));
        missing.coordinates = None;
        let result = assess(Coordinates::new(14.4, 121.0), &[missing]);
        assert_eq!(result.crime_count, 0);
    }

    #[test]
    fn untyped_incidents_count_but_are_not_broken_down() {
        let incidents = vec![
            incident(1, 14.4, 121.0, Some(1)),
            incident(2, 14.4, 121.0, None),
        ];
        let result = assess(Coordinates::new(14.4, 121.0), &incidents);
        assert_eq!(result.crime_count, 2);
        assert_eq!(result.crime_type_breakdown.len(), 1);
        assert!((result.crime_type_breakdown[0].percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_sums_to_count_when_fully_typed() {
        let incidents: Vec<IncidentRecord> = (0..9)
            .map(|i| incident(i, 14.4, 121.0, Some(i32::try_from(i % 3).unwrap() + 1)))
            .collect();
        let result = assess(Coordinates::new(14.4, 121.0), &incidents);
        let sum: u32 = result.crime_type_breakdown.iter().map(|e| e.count).sum();
        assert_eq!(sum, result.crime_count);
        for entry in &result.crime_type_breakdown {
            assert!((0.0..=100.0).contains(&entry.percentage));
        }
    }

    #[test]
    fn breakdown_ties_sorted_by_id() {
        let incidents = vec![
            incident(1, 14.4, 121.0, Some(3)),
            incident(2, 14.4, 121.0, Some(1)),
            incident(3, 14.4, 121.0, Some(2)),
            incident(4, 14.4, 121.0, Some(2)),
        ];
        let result = assess(Coordinates::new(14.4, 121.0), &incidents);
        let ids: Vec<i32> = result
            .crime_type_breakdown
            .iter()
            .map(|e| e.crime_type_id)
            .collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn filters_apply_before_counting() {
        let mut settled = incident(2, 14.4, 121.0, Some(1));
        settled.status = Some(CaseStatus::CaseSettled);
        let incidents = vec![incident(1, 14.4, 121.0, Some(1)), settled];

        let filter = IncidentFilter {
            statuses: BTreeSet::from([CaseStatus::Open]),
            ..IncidentFilter::default()
        };
        let result = assess_perimeter(
            Coordinates::new(14.4, 121.0),
            &incidents,
            &filter,
            &catalog(),
            &RiskConfig::embedded(),
        )
        .unwrap();
        assert_eq!(result.crime_count, 1);
    }

    #[test]
    fn heavy_density_is_high_with_capped_tips() {
        let incidents: Vec<IncidentRecord> = (0..12)
            .map(|i| incident(i, 14.4, 121.0, Some(i32::try_from(i % 3).unwrap() + 1)))
            .collect();
        let result = assess(Coordinates::new(14.4, 121.0), &incidents);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.safety_tips.len(), 4);
    }
}
