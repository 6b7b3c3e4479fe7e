//! Read queries over the case management tables.
//!
//! Filter predicates are pushed into SQL with positional parameters; the
//! statement text is built by [`incident_query`] so it can be checked
//! without a live database.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDateTime, Utc};
use crime_risk_crime_models::{CaseStatus, CrimeType};
use crime_risk_risk_models::{Coordinates, IncidentFilter, IncidentRecord};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

const INCIDENT_SELECT: &str = "SELECT i.id, i.crime_type_id, i.case_status,
            i.latitude, i.longitude, i.incident_datetime,
            b.name AS barangay
     FROM crime_incidents i
     LEFT JOIN barangays b ON i.barangay_id = b.id
     WHERE i.latitude IS NOT NULL AND i.longitude IS NOT NULL";

/// Positional parameter list that hands out `$n` placeholders.
#[derive(Default)]
struct Params {
    values: Vec<DatabaseValue>,
}

impl Params {
    fn push(&mut self, value: DatabaseValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    fn push_all(&mut self, values: impl IntoIterator<Item = DatabaseValue>) -> String {
        values
            .into_iter()
            .map(|value| self.push(value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Builds the incident snapshot statement and its parameters for `filter`.
#[must_use]
pub fn incident_query(filter: &IncidentFilter) -> (String, Vec<DatabaseValue>) {
    let mut sql = String::from(INCIDENT_SELECT);
    let mut params = Params::default();

    if !filter.crime_type_ids.is_empty() {
        let placeholders = params.push_all(
            filter
                .crime_type_ids
                .iter()
                .map(|&id| DatabaseValue::Int32(id)),
        );
        let _ = write!(sql, " AND i.crime_type_id IN ({placeholders})");
    }

    if !filter.statuses.is_empty() {
        let placeholders = params.push_all(
            filter
                .statuses
                .iter()
                .map(|status| DatabaseValue::String(status.as_ref().to_string())),
        );
        let _ = write!(sql, " AND LOWER(i.case_status) IN ({placeholders})");
    }

    if !filter.barangays.is_empty() {
        let placeholders = params.push_all(
            filter
                .barangays
                .iter()
                .map(|name| DatabaseValue::String(name.trim().to_lowercase())),
        );
        let _ = write!(sql, " AND LOWER(TRIM(b.name)) IN ({placeholders})");
    }

    // Stored timestamps are UTC; the bounds are local days shifted to UTC.
    if let Some(start) = filter.utc_start() {
        let placeholder = params.push(DatabaseValue::DateTime(start));
        let _ = write!(sql, " AND i.incident_datetime >= {placeholder}");
    }

    // Inclusive end date: everything before midnight of the following day.
    if let Some(end) = filter.utc_end_exclusive() {
        let placeholder = params.push(DatabaseValue::DateTime(end));
        let _ = write!(sql, " AND i.incident_datetime < {placeholder}");
    }

    sql.push_str(" ORDER BY i.id");

    (sql, params.values)
}

/// Fetches the incidents matching `filter` that have coordinates.
///
/// Rows with a case status outside the known set keep the incident but
/// drop the status.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails, a row has no id or coordinates,
/// or a timestamp or crime type id cannot be read.
pub async fn fetch_incidents(
    db: &dyn Database,
    filter: &IncidentFilter,
) -> Result<Vec<IncidentRecord>, DbError> {
    let (sql, params) = incident_query(filter);
    let rows = db.query_raw_params(&sql, &params).await?;

    let incidents = rows
        .iter()
        .map(incident_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Fetched {} incidents", incidents.len());

    Ok(incidents)
}

fn incident_from_row(row: &Row) -> Result<IncidentRecord, DbError> {
    let id: i64 = row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse incident id: {e}"),
    })?;

    let latitude: f64 = row.to_value("latitude").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse latitude of incident {id}: {e}"),
    })?;
    let longitude: f64 = row.to_value("longitude").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse longitude of incident {id}: {e}"),
    })?;

    let status_text: Option<String> = row.to_value("case_status").unwrap_or(None);
    let status = status_text.and_then(|text| {
        text.trim()
            .parse::<CaseStatus>()
            .inspect_err(|_| log::debug!("Incident {id} has unknown case status {text:?}"))
            .ok()
    });

    let occurred: Option<NaiveDateTime> =
        row.to_value("incident_datetime")
            .map_err(|e| DbError::Conversion {
                message: format!("Failed to parse timestamp of incident {id}: {e}"),
            })?;
    let crime_type_id: Option<i32> =
        row.to_value("crime_type_id")
            .map_err(|e| DbError::Conversion {
                message: format!("Failed to parse crime type of incident {id}: {e}"),
            })?;

    Ok(IncidentRecord {
        id,
        coordinates: Some(Coordinates::new(latitude, longitude)),
        crime_type_id,
        status,
        barangay: row.to_value("barangay").unwrap_or(None),
        incident_timestamp: occurred
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)),
    })
}

/// Loads the crime type catalog.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row has no id or name.
pub async fn crime_types(db: &dyn Database) -> Result<Vec<CrimeType>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, name, description FROM crime_types ORDER BY id",
            &[],
        )
        .await?;

    rows.iter()
        .map(|row| {
            Ok(CrimeType {
                id: row.to_value("id").map_err(|e| DbError::Conversion {
                    message: format!("Failed to parse crime type id: {e}"),
                })?,
                name: row.to_value("name").map_err(|e| DbError::Conversion {
                    message: format!("Failed to parse crime type name: {e}"),
                })?,
                description: row.to_value("description").unwrap_or(None),
            })
        })
        .collect()
}
