//! Type-Safe Configuration with Validation
//!
//! Settings come from environment variables (with `.env` support). Parsing
//! goes through a lookup function so tests never touch process state.

use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for the clock-skew tolerance.
pub const MAX_CLOCK_SKEW_SECONDS: u64 = 300;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid key cache capacity
    #[error("Invalid KEY_CACHE_CAPACITY: must be at least 1")]
    InvalidCapacity,

    /// Clock skew out of range
    #[error("Invalid CLOCK_SKEW_SECONDS: {0} exceeds 300")]
    InvalidClockSkew(u64),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Which checks an authentication runs beyond token verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Token verification only
    #[default]
    Simple,
    /// Also consult the token blacklist and the user directory
    Strict,
}

impl AuthMode {
    /// Name as used in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Strict => "strict",
        }
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "strict" => Ok(Self::Strict),
            other => Err(format!("expected simple or strict, got {other}")),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge verifier configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of remote public keys mirrored locally.
    ///
    /// Should be at least the issuer's history capacity, or tokens signed
    /// with keys the issuer still retains can fail to resolve here.
    pub key_cache_capacity: usize,
    /// Tolerance applied to the expiry check, in seconds
    pub clock_skew_seconds: u64,
    /// Required `iss` claim, if any
    pub expected_issuer: Option<String>,
    /// Simple or strict authentication
    pub auth_mode: AuthMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_cache_capacity: 10,
            clock_skew_seconds: 0,
            expected_issuer: None,
            auth_mode: AuthMode::Simple,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            key_cache_capacity: parse_env(
                &lookup,
                "KEY_CACHE_CAPACITY",
                defaults.key_cache_capacity,
            )?,
            clock_skew_seconds: parse_env(
                &lookup,
                "CLOCK_SKEW_SECONDS",
                defaults.clock_skew_seconds,
            )?,
            expected_issuer: lookup("EXPECTED_ISSUER").filter(|iss| !iss.trim().is_empty()),
            auth_mode: parse_env(&lookup, "AUTH_MODE", defaults.auth_mode)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_cache_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.clock_skew_seconds > MAX_CLOCK_SKEW_SECONDS {
            return Err(ConfigError::InvalidClockSkew(self.clock_skew_seconds));
        }
        Ok(())
    }
}

/// Parse a variable with a default value.
fn parse_env<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
