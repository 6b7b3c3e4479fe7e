#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crime risk computation.
//!
//! Three stateless operations over a snapshot of incident data:
//!
//! 1. [`perimeter::assess_perimeter`] counts incidents within a fixed
//!    radius of a point and maps the count to a [`RiskLevel`].
//! 2. [`grid::transform_grid`] filters and deduplicates model grid
//!    predictions into a `GeoJSON` feature collection.
//! 3. [`route::assess_route`] classifies each segment of a travel route
//!    and rolls the segments up into a worst-case assessment with a
//!    0-100 safety score.
//!
//! None of these touch the network or any shared state; fetching the
//! incidents and predictions is the caller's job.
//!
//! [`RiskLevel`]: crime_risk_risk_models::RiskLevel

pub mod config;
pub mod grid;
pub mod perimeter;
pub mod route;
pub mod tips;

use crime_risk_risk_models::InvalidCoordinatesError;
use thiserror::Error;

pub use config::RiskConfig;

/// Errors returned by the risk engine.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Caller supplied malformed input.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what was wrong.
        message: String,
    },

    /// Risk configuration is missing or inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what was wrong.
        message: String,
    },
}

impl From<InvalidCoordinatesError> for RiskError {
    fn from(e: InvalidCoordinatesError) -> Self {
        Self::Validation {
            message: e.to_string(),
        }
    }
}
