//! Server configuration

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use axum::http::HeaderName;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer};

use crate::identity::DEFAULT_IDENTITY_HEADER;
use crate::validation::PageLimits;

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading config file {path}")]
    Io {
        /// Config file path
        path: Utf8PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("parsing config file {path}")]
    Parse {
        /// Config file path
        path: Utf8PathBuf,
        /// Underlying error
        #[source]
        source: toml_edit::de::Error,
    },

    /// The values are individually valid but inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Output format.
    pub format: LogFormat,

    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
        }
    }
}

/// Gateway server configuration.
///
/// ```toml
/// listen = "0.0.0.0:8080"
/// identity-header = "x-forwarded-user"
/// seed = "seed.json"
///
/// [pagination]
/// default-page-size = 20
/// max-page-size = 200
///
/// [log]
/// format = "json"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address to bind.
    pub listen: SocketAddr,

    /// Header carrying the verified username.
    #[serde(deserialize_with = "header_name")]
    pub identity_header: HeaderName,

    /// Page size bounds for repository listings.
    pub pagination: PageLimits,

    /// Logging settings.
    pub log: LogConfig,

    /// JSON seed file loaded into the in-memory collaborators at startup.
    pub seed: Option<Utf8PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
            pagination: PageLimits::default(),
            log: LogConfig::default(),
            seed: None,
        }
    }
}

fn header_name<'de, D>(deserializer: D) -> Result<HeaderName, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    HeaderName::try_from(name).map_err(serde::de::Error::custom)
}

impl GatewayConfig {
    /// Parse a configuration document.
    pub fn from_toml(document: &str) -> Result<Self, toml_edit::de::Error> {
        toml_edit::de::from_str(document)
    }

    /// Load and validate a configuration file.
    ///
    /// A relative `seed` path is resolved against the config file's directory.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;

        let mut config = Self::from_toml(&document).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;

        if let (Some(seed), Some(dir)) = (config.seed.as_mut(), path.parent()) {
            if seed.is_relative() {
                *seed = dir.join(&*seed);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.pagination;
        if limits.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "pagination.default-page-size must be positive".into(),
            ));
        }
        if limits.max_page_size < limits.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "pagination.max-page-size ({}) is smaller than default-page-size ({})",
                limits.max_page_size, limits.default_page_size
            )));
        }
        Ok(())
    }
}
