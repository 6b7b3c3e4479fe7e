#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Case status and crime type catalog definitions.
//!
//! Crime cases are recorded by municipal staff against a catalog of crime
//! types maintained in the database. This crate holds the closed set of
//! case statuses and the catalog lookup used to turn crime type IDs into
//! display names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Investigation status of a recorded crime case.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum CaseStatus {
    /// Newly recorded, not yet acted on.
    #[serde(rename = "open")]
    #[strum(serialize = "open")]
    Open,
    /// Actively being investigated.
    #[serde(rename = "under investigation")]
    #[strum(serialize = "under investigation")]
    UnderInvestigation,
    /// Resolved.
    #[serde(rename = "case settled")]
    #[strum(serialize = "case settled")]
    CaseSettled,
    /// Referred to the barangay conciliation panel.
    #[serde(rename = "lupon")]
    #[strum(serialize = "lupon")]
    Lupon,
    /// Filed directly with the prosecutor.
    #[serde(rename = "direct filing")]
    #[strum(serialize = "direct filing")]
    DirectFiling,
    /// Logged for record purposes only.
    #[serde(rename = "for record")]
    #[strum(serialize = "for record")]
    ForRecord,
}

impl CaseStatus {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Open,
            Self::UnderInvestigation,
            Self::CaseSettled,
            Self::Lupon,
            Self::DirectFiling,
            Self::ForRecord,
        ]
    }
}

/// A row in the `crime_types` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeType {
    /// Database primary key.
    pub id: i32,
    /// Human-readable crime type name (e.g. "Theft").
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
}

/// In-memory lookup from crime type ID to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrimeTypeCatalog {
    names: BTreeMap<i32, String>,
}

impl CrimeTypeCatalog {
    /// Builds a catalog from database rows.
    #[must_use]
    pub fn new(types: impl IntoIterator<Item = CrimeType>) -> Self {
        Self {
            names: types.into_iter().map(|t| (t.id, t.name)).collect(),
        }
    }

    /// Returns the display name for a crime type ID.
    ///
    /// IDs missing from the catalog render as `"Unknown (<id>)"`.
    #[must_use]
    pub fn name(&self, id: i32) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown ({id})"))
    }

    /// Number of known crime types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "Under Investigation".parse::<CaseStatus>().unwrap(),
            CaseStatus::UnderInvestigation
        );
        assert_eq!("LUPON".parse::<CaseStatus>().unwrap(), CaseStatus::Lupon);
        assert!("closed".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn status_display_matches_stored_value() {
        for status in CaseStatus::all() {
            let text = status.to_string();
            assert_eq!(text.parse::<CaseStatus>().unwrap(), *status);
        }
        assert_eq!(CaseStatus::DirectFiling.as_ref(), "direct filing");
    }

    #[test]
    fn status_serializes_with_spaces() {
        let json = serde_json::to_string(&CaseStatus::CaseSettled).unwrap();
        assert_eq!(json, "\"case settled\"");
    }

    #[test]
    fn catalog_falls_back_for_unknown_ids() {
        let catalog = CrimeTypeCatalog::new([CrimeType {
            id: 1,
            name: "Theft".to_string(),
            description: None,
        }]);
        assert_eq!(catalog.name(1), "Theft");
        assert_eq!(catalog.name(9), "Unknown (9)");
        assert_eq!(catalog.len(), 1);
    }
}
