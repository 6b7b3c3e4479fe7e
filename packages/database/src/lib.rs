#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident and crime type access for the risk service.
//!
//! The case management system owns the `crime_incidents`, `barangays`, and
//! `crime_types` tables; this crate only reads them. Handlers depend on the
//! [`IncidentStore`] trait so tests and the offline CLI can swap in
//! [`memory::InMemoryIncidentStore`].

pub mod db;
pub mod memory;
pub mod queries;

use async_trait::async_trait;
use crime_risk_crime_models::CrimeType;
use crime_risk_risk_models::{IncidentFilter, IncidentRecord};
use switchy_database::Database;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// Could not open a connection.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },
}

/// Read-only source of incident snapshots and the crime type catalog.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Returns incidents with coordinates that match `filter`.
    ///
    /// Implementations may apply the filter partially; the risk engine
    /// re-applies it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backing store fails.
    async fn fetch_incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>, DbError>;

    /// Returns every crime type, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backing store fails.
    async fn crime_types(&self) -> Result<Vec<CrimeType>, DbError>;
}

/// [`IncidentStore`] backed by the shared Postgres database.
pub struct PgIncidentStore {
    db: Box<dyn Database>,
}

impl PgIncidentStore {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(db: Box<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
    async fn fetch_incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>, DbError> {
        queries::fetch_incidents(self.db.as_ref(), filter).await
    }

    async fn crime_types(&self) -> Result<Vec<CrimeType>, DbError> {
        queries::crime_types(self.db.as_ref()).await
    }
}
