//! Mapbox Directions implementation of [`RouteProvider`].

use async_trait::async_trait;
use crime_risk_http::RetryPolicy;
use crime_risk_risk_models::{Coordinates, PlannedRoute};
use serde_json::Value;

use crate::{RouteProfile, RouteProvider, RoutingError};

const API_BASE: &str = "https://api.mapbox.com";

/// Plans routes with the Mapbox Directions API.
pub struct MapboxRouteProvider {
    access_token: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl MapboxRouteProvider {
    /// Creates a provider with the given access token.
    #[must_use]
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            base_url: API_BASE.to_string(),
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a provider from `MAPBOX_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Config`] if the variable is not set.
    pub fn from_env() -> Result<Self, RoutingError> {
        let token = std::env::var("MAPBOX_ACCESS_TOKEN").map_err(|_| RoutingError::Config {
            message: "MAPBOX_ACCESS_TOKEN environment variable not set".to_string(),
        })?;
        Ok(Self::new(token))
    }

    fn url(&self, origin: Coordinates, destination: Coordinates, profile: RouteProfile) -> String {
        format!(
            "{}/directions/v5/mapbox/{profile}/{},{};{},{}",
            self.base_url, origin.lng, origin.lat, destination.lng, destination.lat
        )
    }
}

#[async_trait]
impl RouteProvider for MapboxRouteProvider {
    async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        profile: RouteProfile,
    ) -> Result<PlannedRoute, RoutingError> {
        let url = self.url(origin, destination, profile);

        let response = crime_risk_http::send_json(&self.retry, || {
            self.client.get(&url).query(&[
                ("geometries", "geojson"),
                ("overview", "full"),
                ("access_token", self.access_token.as_str()),
            ])
        })
        .await?;

        let route = parse_directions(&response)?;
        log::debug!(
            "Planned {profile} route with {} points ({:?} m)",
            route.coordinates.len(),
            route.distance
        );
        Ok(route)
    }
}

/// Reads the first route of a Directions response.
///
/// `GeoJSON` positions are `[lng, lat]`.
///
/// # Errors
///
/// * [`RoutingError::Upstream`] if `code` is not `Ok` or there are no routes
/// * [`RoutingError::InvalidResponse`] if the geometry is malformed
pub fn parse_directions(response: &Value) -> Result<PlannedRoute, RoutingError> {
    let code = response.get("code").and_then(Value::as_str).unwrap_or("");
    if code != "Ok" {
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| format!("Directions returned code {code:?}"), ToString::to_string);
        return Err(RoutingError::Upstream { message });
    }

    let route = response
        .get("routes")
        .and_then(Value::as_array)
        .and_then(|routes| routes.first())
        .ok_or_else(|| RoutingError::Upstream {
            message: "no route found between the given points".to_string(),
        })?;

    let positions = route
        .pointer("/geometry/coordinates")
        .and_then(Value::as_array)
        .ok_or_else(|| RoutingError::InvalidResponse {
            message: "route has no geometry coordinates".to_string(),
        })?;

    let coordinates = positions
        .iter()
        .map(|position| {
            let lng = position.get(0).and_then(Value::as_f64);
            let lat = position.get(1).and_then(Value::as_f64);
            lat.zip(lng)
                .map(|(lat, lng)| Coordinates::new(lat, lng))
                .ok_or_else(|| RoutingError::InvalidResponse {
                    message: format!("malformed position {position}"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PlannedRoute {
        coordinates,
        distance: route.get("distance").and_then(Value::as_f64),
        duration: route.get("duration").and_then(Value::as_f64),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_geojson_route() {
        let response = json!({
            "code": "Ok",
            "routes": [{
                "distance": 1234.5,
                "duration": 900.0,
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[121.04, 14.40], [121.045, 14.402], [121.05, 14.405]],
                },
            }],
        });

        let route = parse_directions(&response).unwrap();

        assert_eq!(route.coordinates.len(), 3);
        assert_eq!(route.coordinates[0], Coordinates::new(14.40, 121.04));
        assert_eq!(route.distance, Some(1234.5));
        assert_eq!(route.duration, Some(900.0));
    }

    #[test]
    fn no_route_is_upstream_error() {
        let response = json!({"code": "NoRoute", "message": "No route found", "routes": []});
        let err = parse_directions(&response).unwrap_err();
        assert_eq!(err.to_string(), "Routing service error: No route found");
    }

    #[test]
    fn empty_routes_is_upstream_error() {
        let response = json!({"code": "Ok", "routes": []});
        assert!(matches!(
            parse_directions(&response),
            Err(RoutingError::Upstream { .. })
        ));
    }

    #[test]
    fn malformed_position_is_invalid() {
        let response = json!({
            "code": "Ok",
            "routes": [{"geometry": {"coordinates": [[121.04]]}}],
        });
        assert!(matches!(
            parse_directions(&response),
            Err(RoutingError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn url_is_lng_lat_ordered() {
        let provider = MapboxRouteProvider::new("token".to_string());
        let url = provider.url(
            Coordinates::new(14.4, 121.04),
            Coordinates::new(14.5, 121.05),
            RouteProfile::Cycling,
        );
        assert_eq!(
            url,
            "https://api.mapbox.com/directions/v5/mapbox/cycling/121.04,14.4;121.05,14.5"
        );
    }
}
