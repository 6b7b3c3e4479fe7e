#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route planning between two points.
//!
//! Route risk is computed over whatever polyline a [`RouteProvider`]
//! returns; distance and duration are passed through untouched.

pub mod mapbox;

use async_trait::async_trait;
use crime_risk_http::HttpError;
use crime_risk_risk_models::{Coordinates, PlannedRoute};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors from a route provider.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Request to the routing service failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// The routing service could not produce a route.
    #[error("Routing service error: {message}")]
    Upstream {
        /// Description.
        message: String,
    },

    /// The routing service answered with something we can't read.
    #[error("Invalid routing response: {message}")]
    InvalidResponse {
        /// Description.
        message: String,
    },
}

/// Travel mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RouteProfile {
    /// On foot.
    #[default]
    Walking,
    /// By car.
    Driving,
    /// By bicycle.
    Cycling,
}

/// Anything that can plan a route between two points.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Plans a route from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if no route can be planned.
    async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        profile: RouteProfile,
    ) -> Result<PlannedRoute, RoutingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_parses_case_insensitively() {
        assert_eq!("Driving".parse::<RouteProfile>().unwrap(), RouteProfile::Driving);
        assert_eq!(RouteProfile::default().as_ref(), "walking");
        assert!("flying".parse::<RouteProfile>().is_err());
    }
}
