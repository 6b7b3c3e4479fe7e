//! In-memory [`IncidentStore`] for tests and offline runs.

use std::path::Path;

use async_trait::async_trait;
use crime_risk_crime_models::CrimeType;
use crime_risk_risk_models::{IncidentFilter, IncidentRecord};

use crate::{DbError, IncidentStore};

/// Fixed snapshot of incidents and crime types.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIncidentStore {
    incidents: Vec<IncidentRecord>,
    crime_types: Vec<CrimeType>,
}

impl InMemoryIncidentStore {
    /// Creates a store over the given snapshot.
    #[must_use]
    pub fn new(incidents: Vec<IncidentRecord>, mut crime_types: Vec<CrimeType>) -> Self {
        crime_types.sort_by_key(|t| t.id);
        Self {
            incidents,
            crime_types,
        }
    }

    /// Loads incidents, and optionally crime types, from JSON array files.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conversion`] if a file cannot be read or parsed.
    pub fn from_json_files(
        incidents: &Path,
        crime_types: Option<&Path>,
    ) -> Result<Self, DbError> {
        let incidents: Vec<IncidentRecord> = read_json(incidents)?;
        let crime_types: Vec<CrimeType> = match crime_types {
            Some(path) => read_json(path)?,
            None => Vec::new(),
        };
        log::info!(
            "Loaded {} incidents and {} crime types from disk",
            incidents.len(),
            crime_types.len()
        );
        Ok(Self::new(incidents, crime_types))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DbError> {
    let text = std::fs::read_to_string(path).map_err(|e| DbError::Conversion {
        message: format!("Failed to read {}: {e}", path.display()),
    })?;
    serde_json::from_str(&text).map_err(|e| DbError::Conversion {
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn fetch_incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentRecord>, DbError> {
        Ok(self
            .incidents
            .iter()
            .filter(|incident| incident.coordinates.is_some() && filter.matches(incident))
            .cloned()
            .collect())
    }

    async fn crime_types(&self) -> Result<Vec<CrimeType>, DbError> {
        Ok(self.crime_types.clone())
    }
}
