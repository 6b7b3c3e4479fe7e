#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for crime risk assessment.
//!
//! Serves perimeter risk, AI safety analysis, the prediction grid, and
//! route risk under `/api`. Incidents come from `PostgreSQL` or, for
//! offline runs, from JSON snapshot files. The prediction model, route
//! planner, and LLM are optional; endpoints that need a missing one
//! answer `503`.

pub mod config;
mod error;
pub mod filters;
mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use crime_risk_ai::providers::{LlmProvider, create_provider_from_env};
use crime_risk_cache::{InMemoryCache, ResponseCache};
use crime_risk_database::memory::InMemoryIncidentStore;
use crime_risk_database::{IncidentStore, PgIncidentStore, db};
use crime_risk_prediction::GridPredictionSource;
use crime_risk_prediction::bigquery::BigQueryPredictionSource;
use crime_risk_risk::config::RiskConfig;
use crime_risk_routing::RouteProvider;
use crime_risk_routing::mapbox::MapboxRouteProvider;

pub use config::ServerConfig;
pub use error::ApiError;

/// Shared application state.
pub struct AppState {
    /// Incident and crime type source.
    pub incidents: Arc<dyn IncidentStore>,
    /// Grid risk model, if configured.
    pub predictions: Option<Arc<dyn GridPredictionSource>>,
    /// Route planner, if configured.
    pub routes: Option<Arc<dyn RouteProvider>>,
    /// LLM for safety analysis, if configured.
    pub llm: Option<Arc<dyn LlmProvider>>,
    /// Shared cache for AI answers and grid predictions.
    pub cache: Arc<dyn ResponseCache>,
    /// Risk engine tuning.
    pub risk: RiskConfig,
    /// Server settings.
    pub config: ServerConfig,
}

/// Where incidents are loaded from.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// JSON array of incidents. When unset, `DATABASE_URL` is used.
    pub incidents_file: Option<PathBuf>,
    /// JSON array of crime types, only used with `incidents_file`.
    pub crime_types_file: Option<PathBuf>,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::validation(err.to_string()).into()
    }))
    .app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::validation(err.to_string()).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/crime-types", web::get().to(handlers::crime_types))
            .route("/risk/perimeter", web::get().to(handlers::perimeter))
            .route(
                "/risk/perimeter/analysis",
                web::get().to(handlers::perimeter_analysis),
            )
            .route("/risk/route", web::post().to(handlers::route))
            .route("/predictions/grid", web::get().to(handlers::prediction_grid))
            .default_service(web::to(handlers::not_found)),
    );
}

/// Builds the application state from the environment.
///
/// # Errors
///
/// Returns an error if the incident source or risk configuration cannot
/// be loaded. Optional collaborators that fail to configure are logged
/// and left out.
pub async fn build_state(options: &ServeOptions) -> std::io::Result<AppState> {
    let config = ServerConfig::from_env();
    let risk = RiskConfig::from_env().map_err(std::io::Error::other)?;

    let incidents: Arc<dyn IncidentStore> = match &options.incidents_file {
        Some(path) => Arc::new(
            InMemoryIncidentStore::from_json_files(path, options.crime_types_file.as_deref())
                .map_err(std::io::Error::other)?,
        ),
        None => {
            log::info!("Connecting to database...");
            let db = db::connect_from_env()
                .await
                .map_err(std::io::Error::other)?;
            Arc::new(PgIncidentStore::new(db))
        }
    };

    let predictions = optional("Grid predictions", BigQueryPredictionSource::from_env())
        .map(|source| Arc::new(source) as Arc<dyn GridPredictionSource>);
    let routes = optional("Route planning", MapboxRouteProvider::from_env())
        .map(|provider| Arc::new(provider) as Arc<dyn RouteProvider>);
    let llm = optional("AI analysis", create_provider_from_env()).map(Arc::from);

    Ok(AppState {
        incidents,
        predictions,
        routes,
        llm,
        cache: Arc::new(InMemoryCache::new(config.cache_max_entries)),
        risk,
        config,
    })
}

fn optional<T, E: std::fmt::Display>(feature: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => {
            log::info!("{feature} enabled");
            Some(value)
        }
        Err(e) => {
            log::warn!("{feature} disabled: {e}");
            None
        }
    }
}

/// Runs the HTTP server until shutdown.
///
/// # Errors
///
/// Returns an error if the state cannot be built or the server fails to
/// bind.
pub async fn run_server(options: ServeOptions) -> std::io::Result<()> {
    let state = web::Data::new(build_state(&options).await?);
    let bind_addr = state.config.bind_addr.clone();
    let port = state.config.port;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
