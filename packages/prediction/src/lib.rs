#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source of per-cell risk predictions for the grid endpoint.
//!
//! The model itself is trained and hosted outside this service; this crate
//! only asks it for a grid of scored cells at a given hour, weekday, and
//! month.

pub mod bigquery;

use async_trait::async_trait;
use crime_risk_http::HttpError;
use crime_risk_risk_models::{GridPredictionCell, GridQuery};
use thiserror::Error;

/// Errors from a prediction source.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Request to the model service failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// The model service answered with something we can't read.
    #[error("Invalid prediction response: {message}")]
    InvalidResponse {
        /// Description.
        message: String,
    },
}

/// Anything that can score the grid for a point in time.
#[async_trait]
pub trait GridPredictionSource: Send + Sync {
    /// Returns one scored cell per grid square. Only `hour`, `day`, and
    /// `month` of `query` are sent to the model.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError`] if the model cannot be queried.
    async fn predict(&self, query: &GridQuery) -> Result<Vec<GridPredictionCell>, PredictionError>;
}
