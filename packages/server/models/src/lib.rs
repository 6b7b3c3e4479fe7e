#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crime risk server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the engine's result types so the wire contract can evolve on its
//! own.

use chrono::NaiveDate;
use crime_risk_risk_models::{Coordinates, CrimeTypeCount, RiskAssessment, RiskLevel};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Raw incident filter fields as they arrive on the wire.
///
/// Lists are comma-separated in query strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFilter {
    /// Crime type ids.
    pub crime_type_ids: Vec<String>,
    /// Case status names.
    pub status_filters: Vec<String>,
    /// Barangay names.
    pub barangay_filters: Vec<String>,
    /// Inclusive start date (`YYYY-MM-DD`).
    pub date_from: Option<String>,
    /// Inclusive end date (`YYYY-MM-DD`).
    pub date_to: Option<String>,
}

/// Query parameters for the perimeter endpoints.
///
/// `lat`/`lng` stay optional so a missing value gets a proper error body
/// instead of a bare extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerimeterQueryParams {
    /// Center latitude.
    pub lat: Option<f64>,
    /// Center longitude.
    pub lng: Option<f64>,
    /// Comma-separated crime type ids.
    pub crime_type_ids: Option<String>,
    /// Comma-separated case statuses.
    pub status_filters: Option<String>,
    /// Comma-separated barangay names.
    pub barangay_filters: Option<String>,
    /// Inclusive start date.
    pub date_from: Option<String>,
    /// Inclusive end date.
    pub date_to: Option<String>,
    /// Place name to mention in AI analysis.
    pub location_name: Option<String>,
}

impl PerimeterQueryParams {
    /// Splits the comma-separated filter fields.
    #[must_use]
    pub fn raw_filter(&self) -> RawFilter {
        RawFilter {
            crime_type_ids: split_csv(self.crime_type_ids.as_deref()),
            status_filters: split_csv(self.status_filters.as_deref()),
            barangay_filters: split_csv(self.barangay_filters.as_deref()),
            date_from: non_blank(self.date_from.as_deref()),
            date_to: non_blank(self.date_to.as_deref()),
        }
    }
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Numeric part of a perimeter assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPerimeter {
    /// Query center.
    pub center: Coordinates,
    /// Radius used, in meters.
    pub radius_meters: f64,
    /// Incidents per crime type, largest first.
    pub crime_type_breakdown: Vec<CrimeTypeCount>,
    /// Advice for the area.
    pub safety_tips: Vec<String>,
}

/// `GET /api/risk/perimeter` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPerimeterRisk {
    /// Risk level for the perimeter.
    pub risk_level: RiskLevel,
    /// Incidents within the perimeter.
    pub crime_count: u32,
    /// Breakdown and tips.
    pub perimeter: ApiPerimeter,
}

impl From<RiskAssessment> for ApiPerimeterRisk {
    fn from(assessment: RiskAssessment) -> Self {
        Self {
            risk_level: assessment.risk_level,
            crime_count: assessment.crime_count,
            perimeter: ApiPerimeter {
                center: assessment.center,
                radius_meters: assessment.radius_meters,
                crime_type_breakdown: assessment.crime_type_breakdown,
                safety_tips: assessment.safety_tips,
            },
        }
    }
}

/// `GET /api/risk/perimeter/analysis` response.
///
/// The numeric assessment is always present; `analysis` is `null` with
/// `error` set when the AI summary could not be produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPerimeterAnalysis {
    /// Numeric assessment.
    #[serde(flatten)]
    pub risk: ApiPerimeterRisk,
    /// AI-written analysis.
    pub analysis: Option<serde_json::Value>,
    /// Why `analysis` is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Query parameters for the grid endpoint. Missing values default to the
/// current local time and the configured minimum probability.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridQueryParams {
    /// Hour of day, 0-23.
    pub hour: Option<u8>,
    /// Day of week, 1 = Sunday through 7 = Saturday.
    pub day: Option<u8>,
    /// Month, 1-12.
    pub month: Option<u8>,
    /// Minimum probability to keep a cell.
    pub min_risk: Option<f64>,
}

/// `POST /api/risk/route` body.
///
/// Either `coordinates` (with optional `distance`/`duration`) or
/// `origin` + `destination` must be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// Route polyline in travel order.
    pub coordinates: Option<Vec<Coordinates>>,
    /// Start point to plan from.
    pub origin: Option<Coordinates>,
    /// End point to plan to.
    pub destination: Option<Coordinates>,
    /// Travel mode for planning (`walking`, `driving`, `cycling`).
    pub profile: Option<String>,
    /// Route length in meters.
    pub distance: Option<f64>,
    /// Travel time in seconds.
    pub duration: Option<f64>,
    /// Crime type ids.
    #[serde(default)]
    pub crime_type_ids: Vec<i32>,
    /// Case statuses.
    #[serde(default)]
    pub status_filters: Vec<String>,
    /// Barangay names.
    #[serde(default)]
    pub barangay_filters: Vec<String>,
    /// Inclusive start date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive end date.
    pub date_to: Option<NaiveDate>,
}

impl RouteRequest {
    /// Filter fields in their raw form.
    #[must_use]
    pub fn raw_filter(&self) -> RawFilter {
        RawFilter {
            crime_type_ids: self.crime_type_ids.iter().map(ToString::to_string).collect(),
            status_filters: self.status_filters.clone(),
            barangay_filters: self.barangay_filters.clone(),
            date_from: self.date_from.map(|d| d.to_string()),
            date_to: self.date_to.map(|d| d.to_string()),
        }
    }
}
