//! Conversion of wire filter fields into an [`IncidentFilter`].

use chrono::{DateTime, FixedOffset, NaiveDate};
use crime_risk_crime_models::CaseStatus;
use crime_risk_risk_models::IncidentFilter;
use crime_risk_server_models::RawFilter;

use crate::ApiError;

/// Parses and validates raw filter fields.
///
/// Dates accept `YYYY-MM-DD` or a full RFC 3339 timestamp (its date part
/// is used). Date bounds are calendar days at `offset`.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] for a non-numeric crime type id, an
/// unknown case status, an unreadable date, or inverted date bounds.
pub fn build_filter(raw: &RawFilter, offset: FixedOffset) -> Result<IncidentFilter, ApiError> {
    let crime_type_ids = raw
        .crime_type_ids
        .iter()
        .map(|id| {
            id.trim()
                .parse::<i32>()
                .map_err(|_| ApiError::validation(format!("Invalid crime type id: {id:?}")))
        })
        .collect::<Result<_, _>>()?;

    let statuses = raw
        .status_filters
        .iter()
        .map(|status| {
            status.trim().parse::<CaseStatus>().map_err(|_| {
                ApiError::validation(format!("Unknown case status: {status:?}"))
            })
        })
        .collect::<Result<_, _>>()?;

    let barangays = raw
        .barangay_filters
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect();

    let filter = IncidentFilter {
        crime_type_ids,
        statuses,
        barangays,
        date_from: raw.date_from.as_deref().map(|d| parse_date("dateFrom", d)).transpose()?,
        date_to: raw.date_to.as_deref().map(|d| parse_date("dateTo", d)).transpose()?,
        utc_offset_secs: offset.local_minus_utc(),
    };

    crime_risk_risk::perimeter::validate_filter(&filter)?;

    Ok(filter)
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| ApiError::validation(format!("Invalid {field}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn raw() -> RawFilter {
        RawFilter::default()
    }

    fn build(raw: &RawFilter) -> Result<IncidentFilter, ApiError> {
        build_filter(raw, FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn empty_raw_filter_is_unrestricted() {
        assert!(build(&raw()).unwrap().is_empty());
    }

    #[test]
    fn parses_every_dimension() {
        let filter = build(&RawFilter {
            crime_type_ids: vec!["1".to_string(), " 4".to_string()],
            status_filters: vec!["Under Investigation".to_string(), "open".to_string()],
            barangay_filters: vec!["Poblacion".to_string(), " ".to_string()],
            date_from: Some("2024-01-01".to_string()),
            date_to: Some("2024-03-31T23:59:59+08:00".to_string()),
        })
        .unwrap();

        assert_eq!(filter.crime_type_ids, BTreeSet::from([1, 4]));
        assert_eq!(
            filter.statuses,
            BTreeSet::from([CaseStatus::Open, CaseStatus::UnderInvestigation])
        );
        assert_eq!(filter.barangays.len(), 1);
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.date_to, NaiveDate::from_ymd_opt(2024, 3, 31));
    }

    #[test]
    fn rejects_bad_crime_type_id() {
        let err = build(&RawFilter {
            crime_type_ids: vec!["theft".to_string()],
            ..raw()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid crime type id: \"theft\"");
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(
            build(&RawFilter {
                status_filters: vec!["closed".to_string()],
                ..raw()
            })
            .is_err()
        );
    }

    #[test]
    fn rejects_bad_or_inverted_dates() {
        assert!(
            build(&RawFilter {
                date_from: Some("yesterday".to_string()),
                ..raw()
            })
            .is_err()
        );
        assert!(
            build(&RawFilter {
                date_from: Some("2024-02-01".to_string()),
                date_to: Some("2024-01-01".to_string()),
                ..raw()
            })
            .is_err()
        );
    }

    #[test]
    fn carries_the_calendar_offset() {
        let filter = build_filter(
            &RawFilter {
                date_from: Some("2024-03-02".to_string()),
                ..raw()
            },
            FixedOffset::east_opt(8 * 3600).unwrap(),
        )
        .unwrap();

        assert_eq!(filter.utc_offset_secs, 8 * 3600);
    }
}
