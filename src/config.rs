//! Environment-driven configuration

use crate::engine::{EngineOptions, GetPriceSource};
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_BIND_ADDRESS: &str = "COUPON_BIND_ADDRESS";
pub const ENV_PORT: &str = "COUPON_PORT";
pub const ENV_LOG_LEVEL: &str = "COUPON_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "COUPON_LOG_FORMAT";
pub const ENV_DEFAULT_EXPIRY_HOURS: &str = "COUPON_DEFAULT_EXPIRY_HOURS";
pub const ENV_BXGY_PRICE_SOURCE: &str = "COUPON_BXGY_PRICE_SOURCE";

/// Longest accepted default expiry: one hundred years.
pub const MAX_DEFAULT_EXPIRY_HOURS: i64 = 24 * 365 * 100;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub coupons: CouponConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CouponConfig {
    /// Expiry given to coupons created without one
    pub default_expiry_hours: i64,
    pub bxgy_price_source: GetPriceSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Compact,
            },
            coupons: CouponConfig {
                default_expiry_hours: 24,
                bxgy_price_source: GetPriceSource::InlineFallback,
            },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl FromStr for GetPriceSource {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cart-only" => Ok(Self::CartOnly),
            "inline-fallback" => Ok(Self::InlineFallback),
            other => Err(ConfigError::Validation(format!(
                "unsupported bxgy price source `{other}` (expected cart-only|inline-fallback)"
            ))),
        }
    }
}

fn parse_override<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidEnvOverride {
                    key: key.to_string(),
                    value,
                })
        })
        .transpose()
}

impl AppConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from defaults patched by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind_address) = lookup(ENV_BIND_ADDRESS) {
            config.server.bind_address = bind_address.trim().to_string();
        }
        if let Some(port) = parse_override(&lookup, ENV_PORT)? {
            config.server.port = port;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.logging.level = level.trim().to_string();
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.logging.format = format.parse()?;
        }
        if let Some(hours) = parse_override(&lookup, ENV_DEFAULT_EXPIRY_HOURS)? {
            config.coupons.default_expiry_hours = hours;
        }
        if let Some(source) = lookup(ENV_BXGY_PRICE_SOURCE) {
            config.coupons.bxgy_price_source = source.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DEFAULT_EXPIRY_HOURS).contains(&self.coupons.default_expiry_hours) {
            return Err(ConfigError::Validation(format!(
                "default expiry must be between 1 and {MAX_DEFAULT_EXPIRY_HOURS} hours"
            )));
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.server.bind_address, self.server.port);
        raw.parse()
            .map_err(|_| ConfigError::InvalidEnvOverride {
                key: ENV_BIND_ADDRESS.to_string(),
                value: self.server.bind_address.clone(),
            })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            price_source: self.coupons.bxgy_price_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).expect("defaults are valid");
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.socket_addr().expect("valid address").to_string(),
            "0.0.0.0:8000"
        );
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            (ENV_BIND_ADDRESS, "127.0.0.1"),
            (ENV_PORT, "9090"),
            (ENV_LOG_FORMAT, "JSON"),
            (ENV_DEFAULT_EXPIRY_HOURS, "48"),
            (ENV_BXGY_PRICE_SOURCE, "cart-only"),
        ])
        .expect("overrides are valid");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.coupons.default_expiry_hours, 48);
        assert_eq!(
            config.engine_options().price_source,
            GetPriceSource::CartOnly
        );
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = load(&[(ENV_PORT, "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnvOverride {
                key: ENV_PORT.to_string(),
                value: "eighty".to_string(),
            }
        );
    }

    #[test]
    fn zero_expiry_is_rejected() {
        assert!(matches!(
            load(&[(ENV_DEFAULT_EXPIRY_HOURS, "0")]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn expiry_above_range_is_rejected() {
        assert!(matches!(
            load(&[(ENV_DEFAULT_EXPIRY_HOURS, "9000000000000")]),
            Err(ConfigError::Validation(_))
        ));

        let max = MAX_DEFAULT_EXPIRY_HOURS.to_string();
        let config = load(&[(ENV_DEFAULT_EXPIRY_HOURS, max.as_str())]).expect("upper bound is valid");
        assert_eq!(config.coupons.default_expiry_hours, MAX_DEFAULT_EXPIRY_HOURS);
    }

    #[test]
    fn unknown_price_source_is_rejected() {
        assert!(load(&[(ENV_BXGY_PRICE_SOURCE, "guess")]).is_err());
    }
}
