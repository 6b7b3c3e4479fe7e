//! Server settings read from the environment.

use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset as _, Utc};

/// Runtime settings for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
    /// Lifetime of cached AI analyses.
    pub ai_cache_ttl: Duration,
    /// Cache size that triggers a sweep of expired entries.
    pub cache_max_entries: usize,
    /// Lifetime of cached grid predictions.
    pub grid_cache_ttl: Duration,
    /// Local time zone used for default grid parameters.
    pub utc_offset: FixedOffset,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            ai_cache_ttl: crime_risk_cache::DEFAULT_TTL,
            cache_max_entries: crime_risk_cache::DEFAULT_MAX_ENTRIES,
            grid_cache_ttl: Duration::from_secs(15 * 60),
            utc_offset: philippine_time(),
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT`, `AI_CACHE_TTL_SECS`,
    /// `AI_CACHE_MAX_ENTRIES`, `GRID_CACHE_TTL_SECS`, and
    /// `RISK_UTC_OFFSET_HOURS`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |name: &str, default: u64| parse_or(name, lookup(name), default);

        let utc_offset = lookup("RISK_UTC_OFFSET_HOURS")
            .and_then(|hours| {
                let offset = hours
                    .trim()
                    .parse::<i32>()
                    .ok()
                    .and_then(|h| h.checked_mul(3600))
                    .and_then(FixedOffset::east_opt);
                if offset.is_none() {
                    log::warn!("Ignoring invalid RISK_UTC_OFFSET_HOURS={hours:?}");
                }
                offset
            })
            .unwrap_or(defaults.utc_offset);

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            ai_cache_ttl: Duration::from_secs(parse(
                "AI_CACHE_TTL_SECS",
                defaults.ai_cache_ttl.as_secs(),
            )),
            cache_max_entries: parse_or(
                "AI_CACHE_MAX_ENTRIES",
                lookup("AI_CACHE_MAX_ENTRIES"),
                defaults.cache_max_entries,
            ),
            grid_cache_ttl: Duration::from_secs(parse(
                "GRID_CACHE_TTL_SECS",
                defaults.grid_cache_ttl.as_secs(),
            )),
            utc_offset,
        }
    }
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {name}={raw:?}");
            default
        }),
    }
}

fn philippine_time() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = config(&[]);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.ai_cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.utc_offset.local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("BIND_ADDR", "0.0.0.0"),
            ("PORT", "9000"),
            ("AI_CACHE_TTL_SECS", "60"),
            ("AI_CACHE_MAX_ENTRIES", "5"),
            ("RISK_UTC_OFFSET_HOURS", "-5"),
        ]);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.ai_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_max_entries, 5);
        assert_eq!(config.utc_offset.local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config(&[("PORT", "eighty"), ("RISK_UTC_OFFSET_HOURS", "99")]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.utc_offset.local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn overflowing_offset_falls_back() {
        let config = config(&[("RISK_UTC_OFFSET_HOURS", "999999999")]);
        assert_eq!(config.utc_offset.local_minus_utc(), 8 * 3600);
    }
}
