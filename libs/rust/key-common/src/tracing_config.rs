//! Tracing subscriber setup shared by the token and edge services.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target for authentication audit records.
///
/// Route it to a dedicated sink with a filter such as `audit=info`.
pub const AUDIT_TARGET: &str = "audit";

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup record
    pub service_name: String,
    /// Log level filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "key-service".to_string(),
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Create config with custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Create config with custom log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Apply `LOG_LEVEL` and `LOG_FORMAT` (`json` or `text`) from a lookup.
    #[must_use]
    pub fn with_lookup(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = match lookup("LOG_LEVEL") {
            Some(level) => self.with_log_level(level),
            None => self,
        };
        match lookup("LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => config.with_json_output(),
            Some(_) => Self {
                json_output: false,
                ..config
            },
            None => config,
        }
    }
}

/// Initialize tracing with the given configuration.
///
/// Installs the global subscriber. A second call is a no-op, which keeps test
/// binaries that initialize tracing from several tests working.
pub fn init_tracing(config: &TracingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if result.is_ok() {
        tracing::info!(service = %config.service_name, "Tracing initialized");
    }
}
