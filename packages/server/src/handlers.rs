//! HTTP handler functions for the crime risk API.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use crime_risk_ai::AiError;
use crime_risk_ai::analysis::{AnalysisContext, generate_safety_analysis};
use crime_risk_crime_models::CrimeTypeCatalog;
use crime_risk_risk::grid::{default_grid_query, transform_grid, validate_grid_query};
use crime_risk_risk::perimeter::assess_perimeter;
use crime_risk_risk::route::assess_route;
use crime_risk_risk_models::{
    Coordinates, GridPredictionCell, GridQuery, IncidentFilter, IncidentRecord, PlannedRoute,
    RiskAssessment,
};
use crime_risk_routing::{RouteProfile, RoutingError};
use crime_risk_server_models::{
    ApiHealth, ApiPerimeterAnalysis, ApiPerimeterRisk, GridQueryParams, PerimeterQueryParams,
    RouteRequest,
};

use crate::filters::build_filter;
use crate::{ApiError, AppState};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/crime-types`
pub async fn crime_types(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let types = state
        .incidents
        .crime_types()
        .await
        .map_err(|e| ApiError::upstream("Failed to load crime types", &e))?;
    Ok(HttpResponse::Ok().json(types))
}

/// `GET /api/risk/perimeter`
pub async fn perimeter(
    state: web::Data<AppState>,
    params: web::Query<PerimeterQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let (assessment, _) = perimeter_assessment(&state, &params).await?;
    Ok(HttpResponse::Ok().json(ApiPerimeterRisk::from(assessment)))
}

/// `GET /api/risk/perimeter/analysis`
///
/// AI failures never fail the request: the numeric assessment is returned
/// with `analysis: null` and an `error` explaining why.
pub async fn perimeter_analysis(
    state: web::Data<AppState>,
    params: web::Query<PerimeterQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let (assessment, filter) = perimeter_assessment(&state, &params).await?;

    let (analysis, error) = match &state.llm {
        None => (None, Some("AI analysis is not configured".to_string())),
        Some(llm) => {
            let context = AnalysisContext {
                filter: &filter,
                location_name: params.location_name.as_deref(),
                cache_ttl: state.config.ai_cache_ttl,
            };
            match generate_safety_analysis(llm.as_ref(), state.cache.as_ref(), &assessment, &context)
                .await
                .and_then(|analysis| serde_json::to_value(analysis).map_err(AiError::from))
            {
                Ok(analysis) => (Some(analysis), None),
                Err(e) => {
                    log::warn!("Safety analysis failed, returning assessment only: {e}");
                    (None, Some("AI analysis failed".to_string()))
                }
            }
        }
    };

    Ok(HttpResponse::Ok().json(ApiPerimeterAnalysis {
        risk: ApiPerimeterRisk::from(assessment),
        analysis,
        error,
    }))
}

async fn perimeter_assessment(
    state: &AppState,
    params: &PerimeterQueryParams,
) -> Result<(RiskAssessment, IncidentFilter), ApiError> {
    let (Some(lat), Some(lng)) = (params.lat, params.lng) else {
        return Err(ApiError::validation("lat and lng are required"));
    };
    let center = Coordinates::new(lat, lng)
        .validated()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let filter = build_filter(&params.raw_filter(), state.config.utc_offset)?;

    let (incidents, catalog) = load_snapshot(state, &filter).await?;
    let assessment = assess_perimeter(center, &incidents, &filter, &catalog, &state.risk)?;

    Ok((assessment, filter))
}

async fn load_snapshot(
    state: &AppState,
    filter: &IncidentFilter,
) -> Result<(Vec<IncidentRecord>, CrimeTypeCatalog), ApiError> {
    let incidents = state
        .incidents
        .fetch_incidents(filter)
        .await
        .map_err(|e| ApiError::upstream("Failed to load incidents", &e))?;
    let crime_types = state
        .incidents
        .crime_types()
        .await
        .map_err(|e| ApiError::upstream("Failed to load crime types", &e))?;

    Ok((incidents, CrimeTypeCatalog::new(crime_types)))
}

/// `GET /api/predictions/grid`
pub async fn prediction_grid(
    state: web::Data<AppState>,
    params: web::Query<GridQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let now = Utc::now();
    let defaults = default_grid_query(
        &now.with_timezone(&state.config.utc_offset),
        state.risk.grid.default_min_risk,
    );
    let query = GridQuery {
        hour: params.hour.unwrap_or(defaults.hour),
        day: params.day.unwrap_or(defaults.day),
        month: params.month.unwrap_or(defaults.month),
        min_risk_probability: params.min_risk.unwrap_or(defaults.min_risk_probability),
    };
    validate_grid_query(&query)?;

    let predictions = grid_predictions(&state, &query).await?;
    let grid = transform_grid(&predictions, &query, &state.risk.grid, now);

    log::info!(
        "Grid h={} d={} m={} minRisk={}: {} features",
        query.hour,
        query.day,
        query.month,
        query.min_risk_probability,
        grid.metadata.statistics.total_features
    );

    Ok(HttpResponse::Ok().json(grid.into_feature_collection()))
}

/// Fetches model output for the query's time slot, through the cache.
/// `minRisk` is applied afterwards, so it is not part of the key.
async fn grid_predictions(
    state: &AppState,
    query: &GridQuery,
) -> Result<Vec<GridPredictionCell>, ApiError> {
    let key = format!("grid-predictions|{}|{}|{}", query.hour, query.day, query.month);

    if let Some(cells) = state
        .cache
        .get(&key)
        .and_then(|value| serde_json::from_value(value).ok())
    {
        log::debug!("Grid prediction cache hit for {key}");
        return Ok(cells);
    }

    let source = state.predictions.as_ref().ok_or_else(|| ApiError::Unavailable {
        message: "Grid predictions are not configured".to_string(),
    })?;

    let cells = source
        .predict(query)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch grid predictions", &e))?;

    match serde_json::to_value(&cells) {
        Ok(value) => state.cache.set(key, value, state.config.grid_cache_ttl),
        Err(e) => log::warn!("Not caching grid predictions: {e}"),
    }

    Ok(cells)
}

/// `POST /api/risk/route`
pub async fn route(
    state: web::Data<AppState>,
    body: web::Json<RouteRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let filter = build_filter(&request.raw_filter(), state.config.utc_offset)?;
    let planned = planned_route(&state, &request).await?;

    let (incidents, catalog) = load_snapshot(&state, &filter).await?;
    let assessment = assess_route(&planned, &incidents, &filter, &catalog, &state.risk)?;

    Ok(HttpResponse::Ok().json(assessment))
}

async fn planned_route(state: &AppState, request: &RouteRequest) -> Result<PlannedRoute, ApiError> {
    if let Some(coordinates) = &request.coordinates {
        return Ok(PlannedRoute {
            coordinates: coordinates.clone(),
            distance: request.distance,
            duration: request.duration,
        });
    }

    let (Some(origin), Some(destination)) = (request.origin, request.destination) else {
        return Err(ApiError::validation(
            "Provide either coordinates or origin and destination",
        ));
    };
    let origin = origin
        .validated()
        .map_err(|e| ApiError::validation(format!("origin: {e}")))?;
    let destination = destination
        .validated()
        .map_err(|e| ApiError::validation(format!("destination: {e}")))?;
    let profile = request
        .profile
        .as_deref()
        .map(str::parse::<RouteProfile>)
        .transpose()
        .map_err(|_| ApiError::validation("profile must be walking, driving, or cycling"))?
        .unwrap_or_default();

    let provider = state.routes.as_ref().ok_or_else(|| ApiError::Unavailable {
        message: "Route planning is not configured".to_string(),
    })?;

    provider
        .route(origin, destination, profile)
        .await
        .map_err(|e| match e {
            RoutingError::Upstream { message } => ApiError::Upstream { message },
            RoutingError::Config { message } => {
                log::error!("Route provider misconfigured: {message}");
                ApiError::Unavailable {
                    message: "Route planning is not configured".to_string(),
                }
            }
            other => ApiError::upstream("Failed to plan route", &other),
        })
}

/// Fallback for unknown `/api` paths.
pub async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound {
        message: "Not found".to_string(),
    })
}
