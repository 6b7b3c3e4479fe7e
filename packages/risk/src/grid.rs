//! Grid prediction filtering and `GeoJSON` conversion.
//!
//! Takes the raw per-cell output of the risk prediction model, drops
//! cells that are neither likely nor historically active, collapses
//! duplicate cells, and emits one point feature per remaining cell.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike as _, TimeZone, Timelike as _, Utc};
use crime_risk_risk_models::{GridPredictionCell, GridQuery, RiskTier, round_to_grid};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;

use crate::RiskError;
use crate::config::GridBands;

/// Feature counts per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStatistics {
    /// Features emitted.
    pub total_features: u32,
    /// High-tier features.
    pub high_risk: u32,
    /// Medium-tier features.
    pub medium_risk: u32,
    /// Low-tier features.
    pub low_risk: u32,
}

/// Run metadata attached to the feature collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridMetadata {
    /// When the transform ran.
    pub generated_at: DateTime<Utc>,
    /// Model parameters the predictions were requested with.
    pub parameters: GridQuery,
    /// Feature counts per tier.
    pub statistics: GridStatistics,
}

/// Output of [`transform_grid`].
#[derive(Debug, Clone)]
pub struct GridTransform {
    /// One point feature per retained grid cell.
    pub features: Vec<Feature>,
    /// Run metadata.
    pub metadata: GridMetadata,
}

impl GridTransform {
    /// Converts into a `FeatureCollection` with the metadata as a
    /// `metadata` foreign member.
    #[must_use]
    pub fn into_feature_collection(self) -> FeatureCollection {
        let mut foreign_members = JsonObject::new();
        foreign_members.insert(
            "metadata".to_string(),
            serde_json::to_value(&self.metadata).unwrap_or(serde_json::Value::Null),
        );

        FeatureCollection {
            bbox: None,
            features: self.features,
            foreign_members: Some(foreign_members),
        }
    }
}

/// Derives the default model parameters from the current wall clock.
///
/// Day of week follows the model's convention of 1 = Sunday.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn default_grid_query<Tz: TimeZone>(now: &DateTime<Tz>, min_risk_probability: f64) -> GridQuery {
    GridQuery {
        hour: now.hour() as u8,
        day: now.weekday().number_from_sunday() as u8,
        month: now.month() as u8,
        min_risk_probability,
    }
}

/// Checks that every model parameter is within range.
///
/// # Errors
///
/// Returns [`RiskError::Validation`] naming the first bad parameter.
pub fn validate_grid_query(query: &GridQuery) -> Result<(), RiskError> {
    let invalid = |message: String| -> Result<(), RiskError> {
        Err(RiskError::Validation { message })
    };

    if query.hour > 23 {
        return invalid(format!("hour must be 0-23, got {}", query.hour));
    }
    if !(1..=7).contains(&query.day) {
        return invalid(format!("day must be 1-7 (1 = Sunday), got {}", query.day));
    }
    if !(1..=12).contains(&query.month) {
        return invalid(format!("month must be 1-12, got {}", query.month));
    }
    if !(0.0..=1.0).contains(&query.min_risk_probability) {
        return invalid(format!(
            "minRisk must be within 0-1, got {}",
            query.min_risk_probability
        ));
    }
    Ok(())
}

/// Filters, deduplicates, and converts grid predictions.
///
/// A cell is kept if its probability reaches the threshold, the model
/// flagged it high risk, or it has any historical crimes. Cells that share
/// a 3-decimal `(lat, lng)` key are collapsed into one; the entry with the
/// highest probability wins and keeps the position of the first
/// occurrence. An empty input produces an empty collection.
#[must_use]
pub fn transform_grid(
    predictions: &[GridPredictionCell],
    query: &GridQuery,
    bands: &GridBands,
    generated_at: DateTime<Utc>,
) -> GridTransform {
    let mut order: Vec<String> = Vec::new();
    let mut cells: BTreeMap<String, &GridPredictionCell> = BTreeMap::new();

    for cell in predictions.iter().filter(|cell| retained(cell, query)) {
        let key = cell.grid_cell_key();
        match cells.get_mut(&key) {
            Some(existing) => {
                if cell.risk_probability > existing.risk_probability {
                    *existing = cell;
                }
            }
            None => {
                order.push(key.clone());
                cells.insert(key, cell);
            }
        }
    }

    let mut statistics = GridStatistics::default();
    let features: Vec<Feature> = order
        .iter()
        .filter_map(|key| cells.get(key).map(|cell| (key, *cell)))
        .map(|(key, cell)| {
            let tier = bands.tier_for(cell.risk_probability);
            statistics.total_features += 1;
            match tier {
                RiskTier::High => statistics.high_risk += 1,
                RiskTier::Medium => statistics.medium_risk += 1,
                RiskTier::Low => statistics.low_risk += 1,
            }
            to_feature(cell, key, tier)
        })
        .collect();

    if predictions.len() != features.len() {
        log::debug!(
            "Grid transform kept {} of {} predictions",
            features.len(),
            predictions.len()
        );
    }

    GridTransform {
        features,
        metadata: GridMetadata {
            generated_at,
            parameters: *query,
            statistics,
        },
    }
}

fn retained(cell: &GridPredictionCell, query: &GridQuery) -> bool {
    cell.risk_probability >= query.min_risk_probability
        || cell.predicted_high_risk
        || cell.historical_crime_count > 0
}

fn to_feature(cell: &GridPredictionCell, key: &str, tier: RiskTier) -> Feature {
    let latitude = round_to_grid(cell.latitude);
    let longitude = round_to_grid(cell.longitude);

    let mut properties = JsonObject::new();
    properties.insert("latitude".to_string(), latitude.into());
    properties.insert("longitude".to_string(), longitude.into());
    properties.insert(
        "predictedHighRisk".to_string(),
        cell.predicted_high_risk.into(),
    );
    properties.insert("riskProbability".to_string(), cell.risk_probability.into());
    properties.insert(
        "historicalCrimeCount".to_string(),
        cell.historical_crime_count.into(),
    );
    properties.insert("riskLevel".to_string(), tier.as_ref().into());
    properties.insert("gridCell".to_string(), key.into());

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![longitude, latitude]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone as _;

    use super::*;
    use crate::config::RiskConfig;

    fn cell(lat: f64, lng: f64, probability: f64, high: bool, history: u32) -> GridPredictionCell {
        GridPredictionCell {
            latitude: lat,
            longitude: lng,
            predicted_high_risk: high,
            risk_probability: probability,
            historical_crime_count: history,
        }
    }

    fn query(min: f64) -> GridQuery {
        GridQuery {
            hour: 21,
            day: 6,
            month: 3,
            min_risk_probability: min,
        }
    }

    fn run(predictions: &[GridPredictionCell], min: f64) -> GridTransform {
        transform_grid(
            predictions,
            &query(min),
            &RiskConfig::embedded().grid,
            Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap(),
        )
    }

    fn property(feature: &Feature, name: &str) -> serde_json::Value {
        feature.properties.as_ref().unwrap()[name].clone()
    }

    #[test]
    fn duplicate_cells_emit_one_feature() {
        let predictions = vec![
            cell(14.400, 121.040, 0.8, true, 3),
            cell(14.400, 121.040, 0.75, true, 3),
        ];
        let result = run(&predictions, 0.5);
        assert_eq!(result.features.len(), 1);
        let feature = &result.features[0];
        assert_eq!(property(feature, "riskLevel"), "high");
        assert_eq!(property(feature, "gridCell"), "14.400,121.040");
        assert_eq!(property(feature, "riskProbability"), 0.8);
    }

    #[test]
    fn higher_probability_duplicate_wins() {
        let predictions = vec![
            cell(14.4001, 121.04, 0.45, false, 1),
            cell(14.4004, 121.04, 0.9, true, 1),
        ];
        let result = run(&predictions, 0.5);
        assert_eq!(result.features.len(), 1);
        assert_eq!(property(&result.features[0], "riskProbability"), 0.9);
    }

    #[test]
    fn grid_keys_are_unique() {
        let predictions: Vec<GridPredictionCell> = (0..50_i32)
            .map(|i| cell(14.4 + f64::from(i % 10) * 0.001, 121.0, 0.6, false, 0))
            .collect();
        let result = run(&predictions, 0.5);
        let keys: BTreeSet<String> = result
            .features
            .iter()
            .map(|f| property(f, "gridCell").as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys.len(), result.features.len());
        assert_eq!(keys.len(), 10);
    }

    #[test]
    fn historical_cells_always_retained() {
        let predictions = vec![
            cell(14.40, 121.04, 0.01, false, 2),
            cell(14.41, 121.04, 0.01, false, 0),
        ];
        let result = run(&predictions, 0.5);
        assert_eq!(result.features.len(), 1);
        assert_eq!(property(&result.features[0], "riskLevel"), "low");
        assert_eq!(property(&result.features[0], "historicalCrimeCount"), 2);
    }

    #[test]
    fn model_flag_retains_low_probability_cell() {
        let result = run(&[cell(14.40, 121.04, 0.2, true, 0)], 0.5);
        assert_eq!(result.features.len(), 1);
    }

    #[test]
    fn statistics_count_tiers() {
        let predictions = vec![
            cell(14.40, 121.04, 0.9, true, 0),
            cell(14.41, 121.04, 0.5, false, 0),
            cell(14.42, 121.04, 0.1, false, 4),
        ];
        let stats = run(&predictions, 0.5).metadata.statistics;
        assert_eq!(
            stats,
            GridStatistics {
                total_features: 3,
                high_risk: 1,
                medium_risk: 1,
                low_risk: 1,
            }
        );
    }

    #[test]
    fn empty_predictions_yield_empty_collection() {
        let result = run(&[], 0.5);
        assert!(result.features.is_empty());
        assert_eq!(result.metadata.statistics, GridStatistics::default());

        let json = serde_json::to_value(result.into_feature_collection()).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["metadata"]["statistics"]["totalFeatures"], 0);
        assert_eq!(json["metadata"]["parameters"]["hour"], 21);
    }

    #[test]
    fn point_geometry_is_lng_lat() {
        let result = run(&[cell(14.4, 121.04, 0.9, true, 0)], 0.5);
        let json = serde_json::to_value(&result.features[0]).unwrap();
        assert_eq!(json["geometry"]["coordinates"][0], 121.04);
        assert_eq!(json["geometry"]["coordinates"][1], 14.4);
    }

    #[test]
    fn default_query_uses_sunday_based_weekday() {
        // 2024-03-03 was a Sunday.
        let now = Utc.with_ymd_and_hms(2024, 3, 3, 7, 15, 0).unwrap();
        let q = default_grid_query(&now, 0.5);
        assert_eq!((q.hour, q.day, q.month), (7, 1, 3));
        assert!(validate_grid_query(&q).is_ok());
    }

    #[test]
    fn validation_rejects_out_of_range_parameters() {
        assert!(validate_grid_query(&GridQuery { hour: 24, ..query(0.5) }).is_err());
        assert!(validate_grid_query(&GridQuery { day: 0, ..query(0.5) }).is_err());
        assert!(validate_grid_query(&GridQuery { month: 13, ..query(0.5) }).is_err());
        assert!(validate_grid_query(&query(1.5)).is_err());
        assert!(validate_grid_query(&query(f64::NAN)).is_err());
    }
}
