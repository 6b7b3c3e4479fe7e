#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident, filter, and risk assessment types.
//!
//! These are the shapes consumed and produced by the risk engine in
//! `crime_risk_risk`. They are kept separate from the HTTP types in
//! `crime_risk_server_models` so the engine can be driven from the CLI
//! and tests without pulling in the web stack.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset as _, TimeDelta, Utc,
};
use crime_risk_crime_models::CaseStatus;
use geo::{Haversine, InterpolatePoint as _, Point};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in degrees (-180 to 180).
    pub lng: f64,
}

impl Coordinates {
    /// Creates a coordinate pair without validation.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and within WGS84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Returns `self` if valid.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinatesError`] for NaN, infinite, or
    /// out-of-range components.
    pub fn validated(self) -> Result<Self, InvalidCoordinatesError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(InvalidCoordinatesError {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }

    /// Great-circle midpoint between two points.
    ///
    /// Segments crossing the antimeridian stay on the short side of the
    /// globe. Antipodal points have no unique midpoint and fall back to the
    /// arithmetic mean.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        let mid = Haversine.point_at_ratio_between(self.to_point(), other.to_point(), 0.5);
        if mid.x().is_finite() && mid.y().is_finite() {
            Self {
                lat: mid.y(),
                lng: mid.x(),
            }
        } else {
            Self {
                lat: f64::midpoint(self.lat, other.lat),
                lng: f64::midpoint(self.lng, other.lng),
            }
        }
    }

    /// `geo` point (x = longitude, y = latitude).
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(self.lng, self.lat)
    }
}

/// Error returned when a coordinate pair is NaN or outside WGS84 bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinatesError {
    /// The rejected latitude.
    pub lat: f64,
    /// The rejected longitude.
    pub lng: f64,
}

impl std::fmt::Display for InvalidCoordinatesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinates ({}, {}): latitude must be within -90..90 and longitude within -180..180",
            self.lat, self.lng
        )
    }
}

impl std::error::Error for InvalidCoordinatesError {}

/// One recorded crime case, as far as risk computation cares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Case primary key.
    pub id: i64,
    /// Where the incident happened. Records without coordinates are
    /// ignored by every spatial computation.
    pub coordinates: Option<Coordinates>,
    /// Reference into the crime type catalog.
    pub crime_type_id: Option<i32>,
    /// Current case status.
    pub status: Option<CaseStatus>,
    /// Barangay the incident was recorded under.
    pub barangay: Option<String>,
    /// When the incident happened.
    pub incident_timestamp: Option<DateTime<Utc>>,
}

/// Optional restrictions applied to an incident set before counting.
///
/// Each dimension is AND-combined with the others. An empty set (or `None`
/// date bound) places no restriction on that dimension. Within a dimension
/// the values are OR-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentFilter {
    /// Crime type IDs to include.
    #[serde(default)]
    pub crime_type_ids: BTreeSet<i32>,
    /// Case statuses to include.
    #[serde(default)]
    pub statuses: BTreeSet<CaseStatus>,
    /// Barangay names to include (compared case-insensitively).
    #[serde(default)]
    pub barangays: BTreeSet<String>,
    /// Earliest incident date, inclusive.
    pub date_from: Option<NaiveDate>,
    /// Latest incident date, inclusive.
    pub date_to: Option<NaiveDate>,
    /// Seconds east of UTC of the calendar the date bounds refer to.
    #[serde(default)]
    pub utc_offset_secs: i32,
}

impl IncidentFilter {
    /// Whether no dimension restricts anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.crime_type_ids.is_empty()
            && self.statuses.is_empty()
            && self.barangays.is_empty()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// Whether `incident` passes every filter dimension.
    ///
    /// An incident missing the field a dimension filters on never passes
    /// that dimension.
    #[must_use]
    pub fn matches(&self, incident: &IncidentRecord) -> bool {
        if !self.crime_type_ids.is_empty()
            && !incident
                .crime_type_id
                .is_some_and(|id| self.crime_type_ids.contains(&id))
        {
            return false;
        }

        if !self.statuses.is_empty()
            && !incident
                .status
                .is_some_and(|status| self.statuses.contains(&status))
        {
            return false;
        }

        if !self.barangays.is_empty()
            && !incident.barangay.as_deref().is_some_and(|barangay| {
                let barangay = barangay.trim();
                self.barangays
                    .iter()
                    .any(|wanted| wanted.trim().eq_ignore_ascii_case(barangay))
            })
        {
            return false;
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(timestamp) = incident.incident_timestamp else {
                return false;
            };
            let date = timestamp.with_timezone(&self.offset()).date_naive();
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }

    /// Stable textual form of the filter, used in cache keys.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut out = String::new();

        let ids: Vec<String> = self.crime_type_ids.iter().map(ToString::to_string).collect();
        let _ = write!(out, "types={}", ids.join(","));

        let statuses: Vec<&str> = self.statuses.iter().map(AsRef::as_ref).collect();
        let _ = write!(out, ";status={}", statuses.join(","));

        let mut barangays: Vec<String> = self
            .barangays
            .iter()
            .map(|b| b.trim().to_lowercase())
            .collect();
        barangays.sort();
        barangays.dedup();
        let _ = write!(out, ";barangays={}", barangays.join(","));

        let _ = write!(
            out,
            ";from={};to={};offset={}",
            self.date_from.map(|d| d.to_string()).unwrap_or_default(),
            self.date_to.map(|d| d.to_string()).unwrap_or_default(),
            self.utc_offset_secs,
        );

        out
    }

    /// Offset the date bounds are interpreted in. Out-of-range values fall
    /// back to UTC.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }

    /// UTC instant at which the local `date_from` day starts.
    #[must_use]
    pub fn utc_start(&self) -> Option<NaiveDateTime> {
        self.date_from.map(|from| self.local_midnight_to_utc(from))
    }

    /// UTC instant at which the day after the local `date_to` day starts.
    ///
    /// `None` when there is no upper bound or it is the last representable
    /// date.
    #[must_use]
    pub fn utc_end_exclusive(&self) -> Option<NaiveDateTime> {
        self.date_to
            .and_then(|to| to.succ_opt())
            .map(|next| self.local_midnight_to_utc(next))
    }

    fn local_midnight_to_utc(&self, date: NaiveDate) -> NaiveDateTime {
        let midnight = date.and_time(NaiveTime::MIN);
        midnight
            .checked_sub_signed(TimeDelta::seconds(i64::from(self.offset().local_minus_utc())))
            .unwrap_or(midnight)
    }
}

/// Ordinal risk classification for a perimeter or route.
///
/// Variants are declared in ascending order, so the derived `Ord` matches
/// `LOW < LOW_MEDIUM < MEDIUM < MEDIUM_HIGH < HIGH`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// No incidents nearby.
    Low,
    /// A handful of incidents.
    LowMedium,
    /// Moderate incident density.
    Medium,
    /// Elevated incident density.
    MediumHigh,
    /// Heavy incident density.
    High,
}

impl RiskLevel {
    /// Collapses the five-level scale into the three-tier route bucket.
    ///
    /// `HIGH` and `MEDIUM_HIGH` count as high, `MEDIUM` as medium, and
    /// `LOW_MEDIUM` and `LOW` as low.
    #[must_use]
    pub const fn tier(self) -> RiskTier {
        match self {
            Self::High | Self::MediumHigh => RiskTier::High,
            Self::Medium => RiskTier::Medium,
            Self::LowMedium | Self::Low => RiskTier::Low,
        }
    }

    /// Returns all variants in ascending order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Low,
            Self::LowMedium,
            Self::Medium,
            Self::MediumHigh,
            Self::High,
        ]
    }
}

/// Coarse three-tier risk bucket used for grid cells and route segment
/// counts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskTier {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
}

/// Incident count for one crime type inside a perimeter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeTypeCount {
    /// Crime type catalog ID.
    pub crime_type_id: i32,
    /// Display name of the crime type.
    #[serde(rename = "type")]
    pub crime_type: String,
    /// Incidents of this type.
    pub count: u32,
    /// Share of the perimeter's total crime count (0-100).
    pub percentage: f64,
}

/// Computed risk for a single query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Center of the perimeter.
    pub center: Coordinates,
    /// Perimeter radius in meters.
    pub radius_meters: f64,
    /// Ordinal risk level derived from `crime_count`.
    pub risk_level: RiskLevel,
    /// Incidents counted within the perimeter.
    pub crime_count: u32,
    /// Per crime type counts, largest first. Incidents without a crime
    /// type are counted in `crime_count` but omitted here.
    pub crime_type_breakdown: Vec<CrimeTypeCount>,
    /// Short safety tips for the perimeter.
    pub safety_tips: Vec<String>,
}

/// One cell of the externally computed risk prediction grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPredictionCell {
    /// Cell center latitude, rounded to 3 decimals.
    pub latitude: f64,
    /// Cell center longitude, rounded to 3 decimals.
    pub longitude: f64,
    /// Classifier output.
    pub predicted_high_risk: bool,
    /// Predicted probability of being high risk (0-1).
    pub risk_probability: f64,
    /// Incidents actually observed in the cell.
    pub historical_crime_count: u32,
}

impl GridPredictionCell {
    /// Stable cell identity: `"{lat},{lng}"` at 3-decimal rounding.
    #[must_use]
    pub fn grid_cell_key(&self) -> String {
        format!(
            "{:.3},{:.3}",
            round_to_grid(self.latitude),
            round_to_grid(self.longitude)
        )
    }
}

/// Rounds a coordinate component to the 3-decimal (~110 m) grid.
#[must_use]
pub fn round_to_grid(value: f64) -> f64 {
    // `+ 0.0` turns -0.0 into 0.0 so both format as "0.000".
    (value * 1000.0).round() / 1000.0 + 0.0
}

/// Parameters passed to the grid prediction model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridQuery {
    /// Hour of day (0-23).
    pub hour: u8,
    /// Day of week (1 = Sunday ... 7 = Saturday).
    pub day: u8,
    /// Month (1-12).
    pub month: u8,
    /// Minimum probability for a cell to be kept.
    pub min_risk_probability: f64,
}

/// A sub-section of a route between two consecutive input points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSegment {
    /// Index of the segment's first point in the route.
    pub start_index: usize,
    /// Index of the segment's last point in the route.
    pub end_index: usize,
    /// Point the segment perimeter was centered on.
    pub center: Coordinates,
    /// Risk level of the segment perimeter.
    pub risk_level: RiskLevel,
    /// Collapsed tier of `risk_level`.
    pub tier: RiskTier,
    /// Incidents within the segment perimeter.
    pub crime_count: u32,
}

/// A travel route: ordered points plus optional provider metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoute {
    /// Route points in travel order.
    pub coordinates: Vec<Coordinates>,
    /// Route length in meters.
    pub distance: Option<f64>,
    /// Travel time in seconds.
    pub duration: Option<f64>,
}

/// Overall risk for a multi-point route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAssessment {
    /// Per segment classification, in travel order.
    pub segments: Vec<RouteSegment>,
    /// Worst segment risk level.
    pub risk_level: RiskLevel,
    /// Sum of segment crime counts (overlapping perimeters double count).
    pub total_crime_count: u32,
    /// Segments in the high tier.
    pub high_risk_segments: u32,
    /// Segments in the medium tier.
    pub medium_risk_segments: u32,
    /// Segments in the low tier.
    pub low_risk_segments: u32,
    /// 0-100, higher is safer.
    pub safety_score: u8,
    /// Route length in meters, passed through from the routing provider.
    pub distance: Option<f64>,
    /// Travel time in seconds, passed through from the routing provider.
    pub duration: Option<f64>,
    /// Crime types across the whole route, each incident counted once.
    pub crime_type_breakdown: Vec<CrimeTypeCount>,
    /// Short travel recommendations.
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn incident() -> IncidentRecord {
        IncidentRecord {
            id: 1,
            coordinates: Some(Coordinates::new(14.4, 121.04)),
            crime_type_id: Some(3),
            status: Some(CaseStatus::Open),
            barangay: Some("Poblacion".to_string()),
            incident_timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 10, 22, 30, 0).unwrap()),
        }
    }

    #[test]
    fn risk_levels_are_ordered() {
        let levels = RiskLevel::all();
        for pair in levels.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(RiskLevel::MediumHigh.to_string(), "MEDIUM_HIGH");
    }

    #[test]
    fn tiers_collapse_consistently() {
        assert_eq!(RiskLevel::High.tier(), RiskTier::High);
        assert_eq!(RiskLevel::MediumHigh.tier(), RiskTier::High);
        assert_eq!(RiskLevel::Medium.tier(), RiskTier::Medium);
        assert_eq!(RiskLevel::LowMedium.tier(), RiskTier::Low);
        assert_eq!(RiskLevel::Low.tier(), RiskTier::Low);
    }

    #[test]
    fn coordinates_reject_nan_and_out_of_range() {
        assert!(Coordinates::new(14.4, 121.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 121.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -181.0).is_valid());
        assert!(Coordinates::new(0.0, f64::INFINITY).validated().is_err());
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = IncidentFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&incident()));
        assert!(filter.matches(&IncidentRecord {
            crime_type_id: None,
            status: None,
            barangay: None,
            incident_timestamp: None,
            ..incident()
        }));
    }

    #[test]
    fn filter_dimensions_are_and_combined() {
        let filter = IncidentFilter {
            crime_type_ids: BTreeSet::from([3, 4]),
            statuses: BTreeSet::from([CaseStatus::Open]),
            ..IncidentFilter::default()
        };
        assert!(filter.matches(&incident()));

        let settled = IncidentRecord {
            status: Some(CaseStatus::CaseSettled),
            ..incident()
        };
        assert!(!filter.matches(&settled));

        let untyped = IncidentRecord {
            crime_type_id: None,
            ..incident()
        };
        assert!(!filter.matches(&untyped));
    }

    #[test]
    fn barangay_filter_ignores_case_and_whitespace() {
        let filter = IncidentFilter {
            barangays: BTreeSet::from([" poblacion ".to_string()]),
            ..IncidentFilter::default()
        };
        assert!(filter.matches(&incident()));
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let filter = IncidentFilter {
            date_from: Some(day),
            date_to: Some(day),
            ..IncidentFilter::default()
        };
        assert!(filter.matches(&incident()));

        let later = IncidentFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 5, 11),
            ..IncidentFilter::default()
        };
        assert!(!later.matches(&incident()));

        let undated = IncidentRecord {
            incident_timestamp: None,
            ..incident()
        };
        assert!(!filter.matches(&undated));
    }

    #[test]
    fn signature_is_order_and_case_insensitive() {
        let a = IncidentFilter {
            barangays: BTreeSet::from(["Poblacion".to_string(), "alabang".to_string()]),
            crime_type_ids: BTreeSet::from([2, 1]),
            ..IncidentFilter::default()
        };
        let b = IncidentFilter {
            barangays: BTreeSet::from(["Alabang".to_string(), "poblacion".to_string()]),
            crime_type_ids: BTreeSet::from([1, 2]),
            ..IncidentFilter::default()
        };
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), IncidentFilter::default().signature());
    }

    #[test]
    fn grid_cell_key_uses_three_decimals() {
        let cell = GridPredictionCell {
            latitude: 14.400_04,
            longitude: 121.04,
            predicted_high_risk: false,
            risk_probability: 0.1,
            historical_crime_count: 0,
        };
        assert_eq!(cell.grid_cell_key(), "14.400,121.040");
    }

    #[test]
    fn cells_either_side_of_zero_share_a_key() {
        let cell = |latitude| GridPredictionCell {
            latitude,
            longitude: 121.04,
            predicted_high_risk: false,
            risk_probability: 0.1,
            historical_crime_count: 0,
        };
        assert_eq!(cell(0.0004).grid_cell_key(), "0.000,121.040");
        assert_eq!(cell(-0.0004).grid_cell_key(), "0.000,121.040");
        assert_eq!(format!("{:.3}", round_to_grid(-0.0004)), "0.000");
        assert!(round_to_grid(-0.0004).is_sign_positive());
    }

    #[test]
    fn midpoint_of_short_segment_is_close_to_average() {
        let mid = Coordinates::new(14.40, 121.00).midpoint(Coordinates::new(14.42, 121.02));
        assert!((mid.lat - 14.41).abs() < 1e-4);
        assert!((mid.lng - 121.01).abs() < 1e-4);
    }

    #[test]
    fn midpoint_across_antimeridian_stays_near_it() {
        let mid = Coordinates::new(-17.0, 179.999).midpoint(Coordinates::new(-17.0, -179.999));
        assert!((mid.lat + 17.0).abs() < 1e-3);
        assert!(mid.lng.abs() > 179.99, "got {mid:?}");
    }

    #[test]
    fn midpoint_of_identical_points_is_the_point() {
        let point = Coordinates::new(14.4, 121.04);
        assert_eq!(point.midpoint(point), point);
    }

    #[test]
    fn date_bounds_follow_the_filter_offset() {
        // 2024-05-10T22:30Z is the morning of 2024-05-11 at UTC+8.
        let manila = 8 * 3600;
        let next_day = NaiveDate::from_ymd_opt(2024, 5, 11);
        let local = IncidentFilter {
            date_from: next_day,
            date_to: next_day,
            utc_offset_secs: manila,
            ..IncidentFilter::default()
        };
        assert!(local.matches(&incident()));

        let utc = IncidentFilter {
            utc_offset_secs: 0,
            ..local.clone()
        };
        assert!(!utc.matches(&incident()));
        assert_ne!(local.signature(), utc.signature());
    }

    #[test]
    fn utc_bounds_shift_by_offset() {
        let filter = IncidentFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 3, 1),
            utc_offset_secs: 8 * 3600,
            ..IncidentFilter::default()
        };
        let at = |month, day| {
            NaiveDate::from_ymd_opt(2024, month, day)
                .unwrap()
                .and_hms_opt(16, 0, 0)
                .unwrap()
        };
        assert_eq!(filter.utc_start(), Some(at(2, 29)));
        assert_eq!(filter.utc_end_exclusive(), Some(at(3, 1)));
    }

    #[test]
    fn out_of_range_offset_is_utc() {
        let filter = IncidentFilter {
            utc_offset_secs: i32::MAX,
            ..IncidentFilter::default()
        };
        assert_eq!(filter.offset().local_minus_utc(), 0);
    }

    #[test]
    fn breakdown_serializes_type_field() {
        let entry = CrimeTypeCount {
            crime_type_id: 1,
            crime_type: "Theft".to_string(),
            count: 2,
            percentage: 100.0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "Theft");
        assert_eq!(json["crimeTypeId"], 1);
    }
}
