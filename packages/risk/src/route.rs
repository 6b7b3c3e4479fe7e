//! Per segment route risk aggregation.
//!
//! Each pair of consecutive route points forms a segment. The segment's
//! perimeter is centered on its great-circle midpoint and classified with
//! the same radius and thresholds as a point query. The route as a whole takes the
//! worst segment level.

use std::collections::BTreeMap;

use crime_risk_crime_models::CrimeTypeCatalog;
use crime_risk_risk_models::{
    IncidentFilter, IncidentRecord, PlannedRoute, RiskLevel, RiskTier, RouteAssessment,
    RouteSegment,
};

use crate::config::{RiskConfig, RouteWeights};
use crate::perimeter::{count, crime_type_breakdown, filtered, validate_filter, within_radius};
use crate::{RiskError, tips};

/// Classifies every segment of `route` and aggregates the result.
///
/// # Errors
///
/// Returns [`RiskError::Validation`] if the route has fewer than two
/// points, any point is invalid, or the filter's dates are inverted.
pub fn assess_route(
    route: &PlannedRoute,
    incidents: &[IncidentRecord],
    filter: &IncidentFilter,
    catalog: &CrimeTypeCatalog,
    config: &RiskConfig,
) -> Result<RouteAssessment, RiskError> {
    if route.coordinates.len() < 2 {
        return Err(RiskError::Validation {
            message: "a route requires at least two points".to_string(),
        });
    }
    for point in &route.coordinates {
        point.validated()?;
    }
    validate_filter(filter)?;

    let candidates: Vec<&IncidentRecord> = filtered(incidents, filter).collect();

    let mut segments = Vec::with_capacity(route.coordinates.len() - 1);
    let mut route_incidents: BTreeMap<i64, &IncidentRecord> = BTreeMap::new();
    let mut total_crime_count = 0u32;

    for (index, pair) in route.coordinates.windows(2).enumerate() {
        let center = pair[0].midpoint(pair[1]);
        let nearby = within_radius(center, &candidates, config.radius_meters);
        let crime_count = count(&nearby);
        let risk_level = config.thresholds.level_for(crime_count);

        total_crime_count = total_crime_count.saturating_add(crime_count);
        for incident in nearby {
            route_incidents.insert(incident.id, incident);
        }

        segments.push(RouteSegment {
            start_index: index,
            end_index: index + 1,
            center,
            risk_level,
            tier: risk_level.tier(),
            crime_count,
        });
    }

    let risk_level = segments
        .iter()
        .map(|s| s.risk_level)
        .max()
        .unwrap_or(RiskLevel::Low);

    let (high, medium, low) = tier_counts(&segments);
    let safety_score = safety_score(high, medium, segments.len(), config.route);

    let unique: Vec<&IncidentRecord> = route_incidents.into_values().collect();
    let breakdown = crime_type_breakdown(&unique, count(&unique), catalog);
    let recommendations = tips::route_recommendations(risk_level, &breakdown, config);

    log::debug!(
        "Route of {} segments: {risk_level}, {high} high / {medium} medium / {low} low, score {safety_score}",
        segments.len()
    );

    Ok(RouteAssessment {
        segments,
        risk_level,
        total_crime_count,
        high_risk_segments: high,
        medium_risk_segments: medium,
        low_risk_segments: low,
        safety_score,
        distance: route.distance,
        duration: route.duration,
        crime_type_breakdown: breakdown,
        recommendations,
    })
}

fn tier_counts(segments: &[RouteSegment]) -> (u32, u32, u32) {
    segments
        .iter()
        .fold((0, 0, 0), |(high, medium, low), segment| match segment.tier {
            RiskTier::High => (high + 1, medium, low),
            RiskTier::Medium => (high, medium + 1, low),
            RiskTier::Low => (high, medium, low + 1),
        })
}

/// `100 - (high * W_high + medium * W_medium) / segments * 100`, clamped
/// to 0-100 and rounded.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn safety_score(high: u32, medium: u32, segments: usize, weights: RouteWeights) -> u8 {
    if segments == 0 {
        return 100;
    }
    let penalty = (f64::from(high) * weights.high_weight
        + f64::from(medium) * weights.medium_weight)
        / segments as f64
        * 100.0;
    (100.0 - penalty).clamp(0.0, 100.0).round() as u8
}
