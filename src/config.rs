//! Connection configuration and TOML loading

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error occurred while reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error occurred
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Driver-defined connection options.
///
/// The lifecycle manager passes these through untouched. Only a driver adapter
/// reads them, and each adapter decides which keys it understands.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ConnectOptions(Map<String, Value>);

impl ConnectOptions {
    /// Create an empty option set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, replacing any previous value for the key
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Look up a raw option value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterate over all options in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of options
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no options are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ConnectOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Database URI, handed to the driver as-is
    pub uri: String,
    /// Opaque driver options
    #[serde(default)]
    pub options: ConnectOptions,
}

impl ConnectionConfig {
    /// Create a configuration with no driver options
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: ConnectOptions::default(),
        }
    }

    /// Replace the driver options
    #[must_use]
    pub fn with_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// The URI with any password masked, for logging.
    ///
    /// URL-style URIs have their password component replaced. Anything the
    /// `url` crate cannot parse is treated as a `key=value` connection string
    /// and its `password=` pair is masked.
    #[must_use]
    pub fn redacted_uri(&self) -> String {
        match url::Url::parse(&self.uri) {
            Ok(mut parsed) if parsed.has_host() => {
                if parsed.password().is_some() && parsed.set_password(Some("***")).is_err() {
                    return "<unprintable uri>".to_string();
                }
                parsed.to_string()
            }
            Ok(parsed) => parsed.to_string(),
            Err(_) => self
                .uri
                .split_whitespace()
                .map(|pair| {
                    if pair.starts_with("password=") {
                        "password=***"
                    } else {
                        pair
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// View of this configuration that is safe to log
    #[must_use]
    pub fn redacted(&self) -> RedactedConfig<'_> {
        RedactedConfig {
            uri: self.redacted_uri(),
            options: &self.options,
        }
    }
}

/// Loggable view of a [`ConnectionConfig`] with the password masked
#[derive(Debug)]
pub struct RedactedConfig<'a> {
    /// URI as returned by [`ConnectionConfig::redacted_uri`]
    pub uri: String,
    /// Driver options, unchanged
    pub options: &'a ConnectOptions,
}

/// Error classifier settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Prefix marking driver-originated error kinds; the driver's own
    /// convention is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Database connection configuration
    pub database: ConnectionConfig,
    /// Error classification settings
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(contents)?)
    }
}
