//! Environment configuration

use std::collections::HashMap;
use thiserror::Error;

use crate::domain::value_objects::Money;
use crate::notifications::DEFAULT_BATCH_SIZE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub push_subject: String,
    pub push_batch_size: usize,
    pub shipping_fee: Money,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let max_connections = or("DATABASE_MAX_CONNECTIONS", "10");
        let port = or("PORT", "8083");
        let batch = or("PUSH_BATCH_SIZE", &DEFAULT_BATCH_SIZE.to_string());
        let fee = or("SHIPPING_FEE", "0.00");

        let shipping_fee: Money = fee.parse().map_err(|_| ConfigError::Invalid { key: "SHIPPING_FEE", value: fee.clone() })?;
        if shipping_fee.is_negative() {
            return Err(ConfigError::Invalid { key: "SHIPPING_FEE", value: fee });
        }

        Ok(Self {
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            max_connections: max_connections.parse().map_err(|_| ConfigError::Invalid { key: "DATABASE_MAX_CONNECTIONS", value: max_connections.clone() })?,
            port: port.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: port.clone() })?,
            nats_url: get("NATS_URL"),
            push_subject: or("PUSH_SUBJECT", "push.send"),
            push_batch_size: batch.parse::<usize>().ok().filter(|b| *b > 0).ok_or(ConfigError::Invalid { key: "PUSH_BATCH_SIZE", value: batch.clone() })?,
            shipping_fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::from_vars(vars(&[("DATABASE_URL", "postgres://localhost/orders")])).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.max_connections, 10);
        assert_eq!(cfg.push_subject, "push.send");
        assert_eq!(cfg.push_batch_size, 500);
        assert_eq!(cfg.shipping_fee, Money::ZERO);
        assert!(cfg.nats_url.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(AppConfig::from_vars(HashMap::new()), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_invalid_values() {
        let base = [("DATABASE_URL", "postgres://x")];
        let with = |k: &str, v: &str| { let mut m = vars(&base); m.insert(String::from(k), String::from(v)); m };
        assert!(matches!(AppConfig::from_vars(with("PORT", "http")), Err(ConfigError::Invalid { key: "PORT", .. })));
        assert!(matches!(AppConfig::from_vars(with("SHIPPING_FEE", "-1")), Err(ConfigError::Invalid { key: "SHIPPING_FEE", .. })));
        assert!(matches!(AppConfig::from_vars(with("PUSH_BATCH_SIZE", "0")), Err(ConfigError::Invalid { key: "PUSH_BATCH_SIZE", .. })));
        assert_eq!(AppConfig::from_vars(with("SHIPPING_FEE", "2.5")).unwrap().shipping_fee, Money::from_minor(250));
    }
}
