//! Centralized configuration for the token service.
//!
//! All configuration is loaded from environment variables and validated
//! at startup.

use crate::error::TokenError;
use key_common::{SigningAlgorithm, MIN_KEY_SIZE_BITS};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Largest RSA modulus the service will generate.
pub const MAX_KEY_SIZE_BITS: usize = 4096;

/// How new key ids are minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyIdStrategy {
    /// Random v4 UUID
    Uuid,
    /// `<prefix>-<uuid>`
    Prefixed(String),
}

impl KeyIdStrategy {
    /// Mint a fresh key id.
    #[must_use]
    pub fn generate(&self) -> String {
        let id = uuid::Uuid::new_v4();
        match self {
            Self::Uuid => id.to_string(),
            Self::Prefixed(prefix) => format!("{prefix}-{id}"),
        }
    }
}

impl FromStr for KeyIdStrategy {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("uuid") {
            return Ok(Self::Uuid);
        }
        match s.split_once(':') {
            Some((kind, prefix)) if kind.eq_ignore_ascii_case("prefixed") => {
                let prefix = prefix.trim();
                if prefix.is_empty() {
                    return Err(TokenError::config("KEY_ID_STRATEGY prefix must not be empty"));
                }
                Ok(Self::Prefixed(prefix.to_string()))
            }
            _ => Err(TokenError::config(format!("Invalid KEY_ID_STRATEGY: {s}"))),
        }
    }
}

/// Parameters for generating a signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    /// Signing algorithm
    pub algorithm: SigningAlgorithm,
    /// RSA modulus size; EC keys use the curve size but must still meet the floor
    pub key_size_bits: usize,
    /// Key id strategy
    pub kid_strategy: KeyIdStrategy,
}

impl KeySpec {
    /// Create a key spec with random UUID key ids.
    #[must_use]
    pub const fn new(algorithm: SigningAlgorithm, key_size_bits: usize) -> Self {
        Self {
            algorithm,
            key_size_bits,
            kid_strategy: KeyIdStrategy::Uuid,
        }
    }

    /// Set the key id strategy.
    #[must_use]
    pub fn with_kid_strategy(mut self, strategy: KeyIdStrategy) -> Self {
        self.kid_strategy = strategy;
        self
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::new(SigningAlgorithm::RS256, MIN_KEY_SIZE_BITS)
    }
}

/// Token service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// JWT issuer claim and rotation event issuer
    pub jwt_issuer: String,
    /// Signing key parameters
    pub key: KeySpec,
    /// Interval between scheduled rotations
    pub rotation_interval: Duration,
    /// Maximum number of public keys retained
    pub history_capacity: usize,
    /// Snapshot file for a durable history; in-memory when unset
    pub history_path: Option<PathBuf>,
    /// Audience used when a request names none
    pub default_audience: String,
    /// Default token validity
    pub token_validity_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jwt_issuer: "auth-platform".to_string(),
            key: KeySpec::default(),
            rotation_interval: Duration::from_secs(60 * 60),
            history_capacity: 5,
            history_path: None,
            default_audience: "auth-platform".to_string(),
            token_validity_minutes: 15,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, TokenError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TokenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let jwt_issuer = lookup("JWT_ISSUER").unwrap_or(defaults.jwt_issuer);
        let algorithm = match lookup("SIGNING_ALGORITHM") {
            Some(value) => value
                .parse::<SigningAlgorithm>()
                .map_err(|e| TokenError::config(format!("Invalid SIGNING_ALGORITHM: {e}")))?,
            None => defaults.key.algorithm,
        };
        let key_size_bits = parse_var(&lookup, "SIGNING_KEY_SIZE", defaults.key.key_size_bits)?;
        let kid_strategy = match lookup("KEY_ID_STRATEGY") {
            Some(value) => value.parse()?,
            None => defaults.key.kid_strategy,
        };
        let rotation_minutes: u64 = parse_var(
            &lookup,
            "KEY_ROTATION_INTERVAL_MINUTES",
            defaults.rotation_interval.as_secs() / 60,
        )?;
        let rotation_secs = rotation_minutes.checked_mul(60).ok_or_else(|| {
            TokenError::config(format!(
                "KEY_ROTATION_INTERVAL_MINUTES must be between 1 and 1440, got {rotation_minutes}"
            ))
        })?;
        let history_capacity =
            parse_var(&lookup, "KEY_HISTORY_CAPACITY", defaults.history_capacity)?;
        let history_path = lookup("KEY_HISTORY_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let default_audience = lookup("DEFAULT_AUDIENCE").unwrap_or(defaults.default_audience);
        let token_validity_minutes =
            parse_var(&lookup, "TOKEN_VALIDITY_MINUTES", defaults.token_validity_minutes)?;

        let config = Self {
            jwt_issuer,
            key: KeySpec {
                algorithm,
                key_size_bits,
                kid_strategy,
            },
            rotation_interval: Duration::from_secs(rotation_secs),
            history_capacity,
            history_path,
            default_audience,
            token_validity_minutes,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.jwt_issuer.trim().is_empty() {
            return Err(TokenError::config("JWT_ISSUER must not be empty"));
        }
        if !(MIN_KEY_SIZE_BITS..=MAX_KEY_SIZE_BITS).contains(&self.key.key_size_bits) {
            return Err(TokenError::config(format!(
                "SIGNING_KEY_SIZE must be between {MIN_KEY_SIZE_BITS} and {MAX_KEY_SIZE_BITS}, \
                 got {}",
                self.key.key_size_bits
            )));
        }
        let minutes = self.rotation_interval.as_secs() / 60;
        if !(1..=1440).contains(&minutes) {
            return Err(TokenError::config(format!(
                "KEY_ROTATION_INTERVAL_MINUTES must be between 1 and 1440, got {minutes}"
            )));
        }
        if self.history_capacity == 0 {
            return Err(TokenError::config("KEY_HISTORY_CAPACITY must be at least 1"));
        }
        if !(1..=10_080).contains(&self.token_validity_minutes) {
            return Err(TokenError::config(format!(
                "TOKEN_VALIDITY_MINUTES must be between 1 and 10080, got {}",
                self.token_validity_minutes
            )));
        }
        Ok(())
    }
}

/// Parse a variable with a default value.
fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, TokenError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| TokenError::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();

        assert_eq!(config.jwt_issuer, "auth-platform");
        assert_eq!(config.key.algorithm, SigningAlgorithm::RS256);
        assert_eq!(config.key.key_size_bits, 2048);
        assert_eq!(config.key.kid_strategy, KeyIdStrategy::Uuid);
        assert_eq!(config.rotation_interval, Duration::from_secs(3600));
        assert_eq!(config.history_capacity, 5);
        assert!(config.history_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("JWT_ISSUER", "https://auth.example.com"),
            ("SIGNING_ALGORITHM", "es256"),
            ("SIGNING_KEY_SIZE", "3072"),
            ("KEY_ID_STRATEGY", "prefixed:sig"),
            ("KEY_ROTATION_INTERVAL_MINUTES", "30"),
            ("KEY_HISTORY_CAPACITY", "8"),
            ("KEY_HISTORY_PATH", "/var/lib/token/keys.json"),
            ("TOKEN_VALIDITY_MINUTES", "60"),
        ]))
        .unwrap();

        assert_eq!(config.key.algorithm, SigningAlgorithm::ES256);
        assert_eq!(config.key.key_size_bits, 3072);
        assert_eq!(config.key.kid_strategy, KeyIdStrategy::Prefixed("sig".to_string()));
        assert_eq!(config.rotation_interval, Duration::from_secs(1800));
        assert_eq!(config.history_capacity, 8);
        assert_eq!(config.history_path, Some(PathBuf::from("/var/lib/token/keys.json")));
        assert_eq!(config.token_validity_minutes, 60);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for vars in [
            [("SIGNING_KEY_SIZE", "2047")],
            [("SIGNING_KEY_SIZE", "8192")],
            [("SIGNING_ALGORITHM", "HS256")],
            [("KEY_ROTATION_INTERVAL_MINUTES", "0")],
            [("KEY_HISTORY_CAPACITY", "0")],
            [("KEY_ID_STRATEGY", "prefixed:")],
            [("TOKEN_VALIDITY_MINUTES", "abc")],
        ] {
            let result = Config::from_lookup(lookup_from(&vars));
            assert!(matches!(result, Err(TokenError::Config(_))), "accepted {vars:?}");
        }
    }

    #[test]
    fn test_rejects_overflowing_rotation_interval() {
        // 2^62 + 60 minutes wraps to exactly one hour when converted unchecked.
        for minutes in ["18446744073709551615", "4611686018427387964", "1441"] {
            let result =
                Config::from_lookup(lookup_from(&[("KEY_ROTATION_INTERVAL_MINUTES", minutes)]));
            assert!(matches!(result, Err(TokenError::Config(_))), "accepted {minutes}");
        }
    }

    #[test]
    fn test_kid_strategy_generates_unique_ids() {
        let strategy = KeyIdStrategy::Prefixed("sig".to_string());
        let a = strategy.generate();
        let b = strategy.generate();

        assert!(a.starts_with("sig-"));
        assert_ne!(a, b);
        assert_eq!(KeyIdStrategy::Uuid.generate().len(), 36);
    }
}
