//! Runtime settings, read from the environment (and a `.env` file if present).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Longest accepted discount lifetime: 100 years.
const MAX_DISCOUNT_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long `apply` waits for the redemption worker.
    pub redemption_timeout: Duration,
    /// Pending redemption jobs accepted before callers get `Busy`.
    pub queue_capacity: usize,
    /// Length of generated discount codes.
    pub code_length: usize,
    /// Lifetime of a discount created without an explicit expiration.
    pub discount_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redemption_timeout: Duration::from_secs(5),
            queue_capacity: 1024,
            code_length: 8,
            discount_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Build a config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let parse = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            match lookup(key) {
                None => Ok(None),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| ConfigError::Invalid { key, value }),
            }
        };

        let size = |key: &'static str| -> Result<Option<usize>, ConfigError> {
            parse(key)?
                .map(|v| {
                    usize::try_from(v).map_err(|_| ConfigError::Invalid {
                        key,
                        value: v.to_string(),
                    })
                })
                .transpose()
        };

        let discount_ttl = match parse("DISCOUNT_TTL_MINUTES")? {
            None => defaults.discount_ttl,
            Some(minutes) => minutes
                .checked_mul(60)
                .filter(|secs| *secs <= MAX_DISCOUNT_TTL_SECS)
                .map(Duration::from_secs)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "DISCOUNT_TTL_MINUTES",
                    value: minutes.to_string(),
                })?,
        };

        let config = Self {
            redemption_timeout: parse("REDEMPTION_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.redemption_timeout),
            queue_capacity: size("REDEMPTION_QUEUE_CAPACITY")?.unwrap_or(defaults.queue_capacity),
            code_length: size("DISCOUNT_CODE_LENGTH")?.unwrap_or(defaults.code_length),
            discount_ttl,
        };

        if config.queue_capacity == 0 {
            return Err(ConfigError::Zero("REDEMPTION_QUEUE_CAPACITY"));
        }
        if config.code_length == 0 {
            return Err(ConfigError::Zero("DISCOUNT_CODE_LENGTH"));
        }
        if config.redemption_timeout.is_zero() {
            return Err(ConfigError::Zero("REDEMPTION_TIMEOUT_MS"));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_use_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn keys_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("REDEMPTION_TIMEOUT_MS", "250"),
            ("REDEMPTION_QUEUE_CAPACITY", "4"),
            ("DISCOUNT_CODE_LENGTH", "12"),
            ("DISCOUNT_TTL_MINUTES", "90"),
        ]))
        .unwrap();

        assert_eq!(config.redemption_timeout, Duration::from_millis(250));
        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.code_length, 12);
        assert_eq!(config.discount_ttl, Duration::from_secs(90 * 60));
    }

    #[test]
    fn timeout_is_independent_of_discount_ttl() {
        let config = Config::from_lookup(lookup(&[("DISCOUNT_TTL_MINUTES", "1")])).unwrap();
        assert_eq!(config.redemption_timeout, Config::default().redemption_timeout);
    }

    #[test]
    fn unparsable_value_fails() {
        let result = Config::from_lookup(lookup(&[("REDEMPTION_TIMEOUT_MS", "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "REDEMPTION_TIMEOUT_MS",
                ..
            })
        ));
    }

    #[test]
    fn oversized_ttl_fails() {
        for minutes in [u64::MAX.to_string(), "100000000000000".to_string()] {
            let result = Config::from_lookup(lookup(&[("DISCOUNT_TTL_MINUTES", minutes.as_str())]));
            assert!(matches!(
                result,
                Err(ConfigError::Invalid {
                    key: "DISCOUNT_TTL_MINUTES",
                    ..
                })
            ));
        }
    }

    #[test]
    fn zero_capacity_fails() {
        let result = Config::from_lookup(lookup(&[("REDEMPTION_QUEUE_CAPACITY", "0")]));
        assert!(matches!(
            result,
            Err(ConfigError::Zero("REDEMPTION_QUEUE_CAPACITY"))
        ));
    }
}
