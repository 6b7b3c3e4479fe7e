#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the crime risk toolchain.
//!
//! ```text
//! crime_risk serve [--incidents incidents.json [--crime-types types.json]]
//! crime_risk perimeter --lat 14.40 --lng 121.04 [--incidents ...] [filters]
//! crime_risk grid [--predictions cells.json] [--hour 21 --day 6 --month 3] [--min-risk 0.5]
//! crime_risk route --route route.json [--incidents ...] [filters]
//! ```
//!
//! Without `--incidents`, incidents are read from `DATABASE_URL`. Results
//! are printed as pretty JSON.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crime_risk_crime_models::CrimeTypeCatalog;
use crime_risk_database::memory::InMemoryIncidentStore;
use crime_risk_database::{IncidentStore, PgIncidentStore, db};
use crime_risk_prediction::GridPredictionSource as _;
use crime_risk_prediction::bigquery::BigQueryPredictionSource;
use crime_risk_risk::config::RiskConfig;
use crime_risk_risk::grid::{default_grid_query, transform_grid, validate_grid_query};
use crime_risk_risk::perimeter::assess_perimeter;
use crime_risk_risk::route::assess_route;
use crime_risk_risk_models::{
    Coordinates, GridPredictionCell, GridQuery, IncidentFilter, PlannedRoute,
};
use crime_risk_server::filters::build_filter;
use crime_risk_server::{ServeOptions, ServerConfig, run_server};
use crime_risk_server_models::{ApiPerimeterRisk, RawFilter};
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "crime_risk", about = "Crime risk assessment toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Serve incidents from a JSON file instead of the database
        #[arg(long)]
        incidents: Option<PathBuf>,
        /// Crime type catalog JSON file (with --incidents)
        #[arg(long, requires = "incidents")]
        crime_types: Option<PathBuf>,
    },
    /// Assess crime risk around a point
    Perimeter {
        /// Latitude of the point
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude of the point
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Build the prediction grid as `GeoJSON`
    Grid {
        /// Model output JSON file; queries `BigQuery` when omitted
        #[arg(long)]
        predictions: Option<PathBuf>,
        /// Hour of day (0-23), defaults to now
        #[arg(long)]
        hour: Option<u8>,
        /// Day of week (1 = Sunday), defaults to today
        #[arg(long)]
        day: Option<u8>,
        /// Month (1-12), defaults to this month
        #[arg(long)]
        month: Option<u8>,
        /// Minimum risk probability for a cell to be shown
        #[arg(long)]
        min_risk: Option<f64>,
    },
    /// Assess crime risk along a route
    Route {
        /// Route JSON file: `{"coordinates": [{"lat", "lng"}, ...]}`
        #[arg(long)]
        route: PathBuf,
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Incidents JSON file; reads `DATABASE_URL` when omitted
    #[arg(long)]
    incidents: Option<PathBuf>,
    /// Crime type catalog JSON file
    #[arg(long, requires = "incidents")]
    crime_types: Option<PathBuf>,
}

#[derive(Args)]
struct FilterArgs {
    /// Crime type ids, comma-separated
    #[arg(long, value_delimiter = ',')]
    crime_type_ids: Vec<String>,
    /// Case statuses, comma-separated
    #[arg(long, value_delimiter = ',')]
    status: Vec<String>,
    /// Barangay names, comma-separated
    #[arg(long, value_delimiter = ',')]
    barangay: Vec<String>,
    /// Inclusive start date (YYYY-MM-DD)
    #[arg(long)]
    date_from: Option<String>,
    /// Inclusive end date (YYYY-MM-DD)
    #[arg(long)]
    date_to: Option<String>,
}

impl FilterArgs {
    fn build(self) -> Result<IncidentFilter, Box<dyn std::error::Error>> {
        let raw = RawFilter {
            crime_type_ids: self.crime_type_ids,
            status_filters: self.status,
            barangay_filters: self.barangay,
            date_from: self.date_from,
            date_to: self.date_to,
        };
        Ok(build_filter(&raw, ServerConfig::from_env().utc_offset)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            incidents,
            crime_types,
        } => {
            let options = ServeOptions {
                incidents_file: incidents,
                crime_types_file: crime_types,
            };
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(run_server(options))
            })
            .await??;
        }
        Commands::Perimeter {
            lat,
            lng,
            data,
            filter,
        } => {
            let filter = filter.build()?;
            let store = open_store(&data).await?;
            let incidents = store.fetch_incidents(&filter).await?;
            let catalog = CrimeTypeCatalog::new(store.crime_types().await?);

            let assessment = assess_perimeter(
                Coordinates::new(lat, lng),
                &incidents,
                &filter,
                &catalog,
                &RiskConfig::from_env()?,
            )?;
            print_json(&ApiPerimeterRisk::from(assessment))?;
        }
        Commands::Grid {
            predictions,
            hour,
            day,
            month,
            min_risk,
        } => {
            let risk = RiskConfig::from_env()?;
            let now = Utc::now();
            let defaults = default_grid_query(
                &now.with_timezone(&ServerConfig::from_env().utc_offset),
                risk.grid.default_min_risk,
            );
            let query = GridQuery {
                hour: hour.unwrap_or(defaults.hour),
                day: day.unwrap_or(defaults.day),
                month: month.unwrap_or(defaults.month),
                min_risk_probability: min_risk.unwrap_or(defaults.min_risk_probability),
            };
            validate_grid_query(&query)?;

            let cells: Vec<GridPredictionCell> = match predictions {
                Some(path) => read_json(&path)?,
                None => BigQueryPredictionSource::from_env()?.predict(&query).await?,
            };
            log::info!("Transforming {} grid predictions", cells.len());

            let grid = transform_grid(&cells, &query, &risk.grid, now);
            print_json(&grid.into_feature_collection())?;
        }
        Commands::Route {
            route,
            data,
            filter,
        } => {
            let planned: PlannedRoute = read_json(&route)?;
            let filter = filter.build()?;
            let store = open_store(&data).await?;
            let incidents = store.fetch_incidents(&filter).await?;
            let catalog = CrimeTypeCatalog::new(store.crime_types().await?);

            let assessment = assess_route(
                &planned,
                &incidents,
                &filter,
                &catalog,
                &RiskConfig::from_env()?,
            )?;
            print_json(&assessment)?;
        }
    }

    Ok(())
}

async fn open_store(data: &DataArgs) -> Result<Box<dyn IncidentStore>, Box<dyn std::error::Error>> {
    Ok(match &data.incidents {
        Some(path) => Box::new(InMemoryIncidentStore::from_json_files(
            path,
            data.crime_types.as_deref(),
        )?),
        None => Box::new(PgIncidentStore::new(db::connect_from_env().await?)),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_flags_split_on_commas() {
        let cli = Cli::try_parse_from([
            "crime_risk",
            "perimeter",
            "--lat",
            "14.4",
            "--lng",
            "121.04",
            "--incidents",
            "incidents.json",
            "--crime-type-ids",
            "1,2",
            "--status",
            "open",
        ])
        .unwrap();

        let Commands::Perimeter { filter, data, .. } = cli.command else {
            panic!("expected perimeter");
        };
        assert_eq!(data.incidents, Some(PathBuf::from("incidents.json")));
        let filter = filter.build().unwrap();
        assert_eq!(filter.crime_type_ids, [1, 2].into());
        assert_eq!(filter.statuses.len(), 1);
    }

    #[test]
    fn crime_types_require_incidents() {
        assert!(
            Cli::try_parse_from(["crime_risk", "serve", "--crime-types", "types.json"]).is_err()
        );
    }

    #[test]
    fn bad_filter_is_rejected() {
        let filter = FilterArgs {
            crime_type_ids: vec!["theft".to_string()],
            status: Vec::new(),
            barangay: Vec::new(),
            date_from: None,
            date_to: None,
        };
        assert!(filter.build().is_err());
    }
}
