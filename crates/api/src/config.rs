//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::BrandId;
use uuid::Uuid;

/// Brand that may not enter partnerships unless configured otherwise.
pub const DEFAULT_BLOCKED_BRAND: &str = "c9b27e5f-5fa2-41bc-a539-1ce87d02a2f9";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `5002`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; partnerships are kept in
///   memory when unset
/// - `BLOCKED_BRAND_IDS`: comma separated brand UUIDs refused at creation
///   (default: [`DEFAULT_BLOCKED_BRAND`]); entries that are not UUIDs are
///   skipped
/// - `OUTBOX_RETRY_INTERVAL_SECS`: period of the outbox retry sweep
///   (default: `5`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub blocked_brands: Vec<BrandId>,
    pub outbox_retry_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            blocked_brands: std::env::var("BLOCKED_BRAND_IDS")
                .map(|list| parse_brands(&list))
                .unwrap_or(defaults.blocked_brands),
            outbox_retry_interval: std::env::var("OUTBOX_RETRY_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.outbox_retry_interval),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5002,
            log_level: "info".to_string(),
            database_url: None,
            blocked_brands: parse_brands(DEFAULT_BLOCKED_BRAND),
            outbox_retry_interval: Duration::from_secs(5),
        }
    }
}

fn parse_brands(list: &str) -> Vec<BrandId> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Uuid::parse_str(s) {
            Ok(uuid) => Some(BrandId::from_uuid(uuid)),
            Err(e) => {
                tracing::warn!(value = s, error = %e, "ignoring invalid blocked brand id");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5002);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.outbox_retry_interval, Duration::from_secs(5));
        assert_eq!(
            config.blocked_brands,
            vec![BrandId::from_uuid(
                Uuid::parse_str(DEFAULT_BLOCKED_BRAND).unwrap()
            )]
        );
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:5002");
    }

    #[test]
    fn test_parse_brands_skips_invalid_entries() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let brands = parse_brands(&format!(" {a}, nope ,,{b}"));
        assert_eq!(
            brands,
            vec![BrandId::from_uuid(a), BrandId::from_uuid(b)]
        );
    }

    #[test]
    fn test_empty_list_blocks_nothing() {
        assert!(parse_brands("").is_empty());
    }
}
