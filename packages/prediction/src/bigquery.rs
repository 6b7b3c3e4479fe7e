//! `BigQuery` ML implementation of [`GridPredictionSource`].
//!
//! Runs `ML.PREDICT` over the grid table through the synchronous
//! `jobs.query` REST endpoint and reads the tabular response by column
//! name.

use async_trait::async_trait;
use crime_risk_http::RetryPolicy;
use crime_risk_risk_models::{GridPredictionCell, GridQuery, round_to_grid};
use serde_json::{Value, json};

use crate::{GridPredictionSource, PredictionError};

const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
const QUERY_TIMEOUT_MS: u64 = 30_000;

/// Scores the grid with a `BigQuery` ML model.
pub struct BigQueryPredictionSource {
    project: String,
    model: String,
    grid_table: String,
    access_token: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl BigQueryPredictionSource {
    /// Creates a source for `model` scored over `grid_table`, both fully
    /// qualified (`dataset.name` or `project.dataset.name`).
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::Config`] if a name contains anything
    /// other than letters, digits, `_`, `-`, or `.`.
    pub fn new(
        project: String,
        model: String,
        grid_table: String,
        access_token: String,
    ) -> Result<Self, PredictionError> {
        for (label, name) in [("project", &project), ("model", &model), ("grid table", &grid_table)] {
            if !is_identifier(name) {
                return Err(PredictionError::Config {
                    message: format!("invalid BigQuery {label} name: {name:?}"),
                });
            }
        }

        Ok(Self {
            project,
            model,
            grid_table,
            access_token,
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        })
    }

    /// Creates a source from `BIGQUERY_PROJECT`, `BIGQUERY_MODEL`,
    /// `BIGQUERY_GRID_TABLE`, and `GOOGLE_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::Config`] if a variable is missing or a
    /// name is invalid.
    pub fn from_env() -> Result<Self, PredictionError> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| PredictionError::Config {
                message: format!("{name} environment variable not set"),
            })
        };

        let project = var("BIGQUERY_PROJECT")?;
        let model = std::env::var("BIGQUERY_MODEL")
            .unwrap_or_else(|_| "crime_analytics.risk_model".to_string());
        let grid_table = std::env::var("BIGQUERY_GRID_TABLE")
            .unwrap_or_else(|_| "crime_analytics.grid_cells".to_string());
        let access_token = var("GOOGLE_ACCESS_TOKEN")?;

        Self::new(project, model, grid_table, access_token)
    }

    fn sql(&self) -> String {
        format!(
            "SELECT latitude, longitude, predicted_high_risk,
                    (SELECT p.prob FROM UNNEST(predicted_high_risk_probs) p
                     WHERE CAST(p.label AS STRING) IN ('1', 'true')) AS risk_probability,
                    historical_crime_count
             FROM ML.PREDICT(MODEL `{model}`, (
                 SELECT latitude, longitude,
                        @hour AS hour, @day AS day_of_week, @month AS month,
                        historical_crime_count
                 FROM `{grid}`))",
            model = self.model,
            grid = self.grid_table,
        )
    }

    fn request_body(&self, query: &GridQuery) -> Value {
        let param = |name: &str, value: u8| {
            json!({
                "name": name,
                "parameterType": {"type": "INT64"},
                "parameterValue": {"value": value.to_string()},
            })
        };

        json!({
            "query": self.sql(),
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": [
                param("hour", query.hour),
                param("day", query.day),
                param("month", query.month),
            ],
            "timeoutMs": QUERY_TIMEOUT_MS,
        })
    }
}

#[async_trait]
impl GridPredictionSource for BigQueryPredictionSource {
    async fn predict(&self, query: &GridQuery) -> Result<Vec<GridPredictionCell>, PredictionError> {
        let url = format!("{API_BASE}/projects/{}/queries", self.project);
        let body = self.request_body(query);

        log::debug!(
            "Requesting grid predictions for hour={} day={} month={}",
            query.hour,
            query.day,
            query.month
        );

        let response = crime_risk_http::send_json(&self.retry, || {
            self.client
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&body)
        })
        .await?;

        let cells = parse_query_response(&response)?;
        log::info!("Received {} grid predictions", cells.len());
        Ok(cells)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parses a `jobs.query` response into grid cells.
///
/// `BigQuery` returns every cell value as a string (or null) under
/// `rows[].f[].v`, in the column order of `schema.fields`. A response
/// without rows is an empty grid.
///
/// # Errors
///
/// Returns [`PredictionError::InvalidResponse`] if the job did not
/// complete, a required column is missing, or a non-null value cannot be
/// read. Null probabilities, counts, and flags are read as zero.
pub fn parse_query_response(response: &Value) -> Result<Vec<GridPredictionCell>, PredictionError> {
    if response.get("jobComplete").and_then(Value::as_bool) == Some(false) {
        return Err(PredictionError::InvalidResponse {
            message: "query did not complete within the timeout".to_string(),
        });
    }

    let Some(rows) = response.get("rows").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let fields: Vec<&str> = response
        .pointer("/schema/fields")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing schema.fields"))?
        .iter()
        .filter_map(|field| field.get("name").and_then(Value::as_str))
        .collect();

    let column = |name: &str| {
        fields
            .iter()
            .position(|field| *field == name)
            .ok_or_else(|| invalid(&format!("missing column {name}")))
    };

    let latitude = column("latitude")?;
    let longitude = column("longitude")?;
    let predicted_high_risk = column("predicted_high_risk")?;
    let risk_probability = column("risk_probability")?;
    let historical_crime_count = column("historical_crime_count")?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let cells = row
                .get("f")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid(&format!("row {index} has no cells")))?;
            let text = |column: usize| cells.get(column).and_then(|cell| cell.get("v")).and_then(Value::as_str);

            let coordinate = |column: usize, name: &str| {
                text(column)
                    .and_then(|v| v.parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| invalid(&format!("row {index} has no valid {name}")))
            };

            Ok(GridPredictionCell {
                latitude: round_to_grid(coordinate(latitude, "latitude")?),
                longitude: round_to_grid(coordinate(longitude, "longitude")?),
                predicted_high_risk: parse_flag(text(predicted_high_risk))
                    .ok_or_else(|| invalid(&format!("row {index} has an unreadable predicted_high_risk")))?,
                risk_probability: parse_probability(text(risk_probability))
                    .ok_or_else(|| invalid(&format!("row {index} has an unreadable risk_probability")))?,
                historical_crime_count: parse_count(text(historical_crime_count)).ok_or_else(|| {
                    invalid(&format!("row {index} has an unreadable historical_crime_count"))
                })?,
            })
        })
        .collect()
}

/// Null is `false`; anything other than a 0/1 or boolean label is `None`.
fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(str::trim) {
        None => Some(false),
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => Some(true),
        Some(v) if v == "0" || v.eq_ignore_ascii_case("false") => Some(false),
        Some(_) => None,
    }
}

/// Null is `0.0`; a non-null value must be a number within 0-1.
fn parse_probability(value: Option<&str>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(v) => v
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| (0.0..=1.0).contains(p)),
    }
}

/// Null is `0`. FLOAT64 columns arrive as `"3.0"`, so integral floats
/// are accepted.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_count(value: Option<&str>) -> Option<u32> {
    let Some(v) = value.map(str::trim) else {
        return Some(0);
    };
    v.parse::<u32>().ok().or_else(|| {
        v.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(n))
            .map(|n| n as u32)
    })
}

fn invalid(message: &str) -> PredictionError {
    PredictionError::InvalidResponse {
        message: message.to_string(),
    }
}
