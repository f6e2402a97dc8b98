// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML configuration and per-type destination resolution.
//!
//! ```yaml
//! log_level: info
//! influxdb:                  # shared by every value type
//!   url: "https://influx.example.com:8086"
//!   org: "zabbix"
//!   bucket: "zabbix"
//!   token: "${INFLUX_TOKEN}"
//! history:                   # per-type overrides
//!   text:
//!     enabled: false
//!   log:
//!     bucket: "zabbix_logs"
//! ```
//!
//! A value type is exported only if its resolved destination has both a url
//! and a bucket.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use log::LevelFilter;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::delivery::{self, DeliveryError};
use crate::history::DataType;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Default log filter (`error`, `warn`, `info`, `debug`, `trace`, `off`).
    pub log_level: Option<String>,
    /// Destination settings shared by every value type.
    #[serde(default)]
    pub influxdb: InfluxDbConfig,
    /// Per value type overrides.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// InfluxDB v2 connection settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluxDbConfig {
    /// InfluxDB URL (e.g., "http://localhost:8086"); `https` if no scheme.
    pub url: Option<String>,
    /// InfluxDB organization.
    pub org: Option<String>,
    /// InfluxDB bucket.
    pub bucket: Option<String>,
    /// Authentication token.
    pub token: Option<String>,
}

/// Overrides keyed by value type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    pub float: Option<HistoryTypeConfig>,
    #[serde(alias = "uint")]
    pub integer: Option<HistoryTypeConfig>,
    #[serde(alias = "str")]
    pub string: Option<HistoryTypeConfig>,
    pub text: Option<HistoryTypeConfig>,
    pub log: Option<HistoryTypeConfig>,
}

impl HistoryConfig {
    pub fn get(&self, data_type: DataType) -> Option<&HistoryTypeConfig> {
        match data_type {
            DataType::Float => self.float.as_ref(),
            DataType::Integer => self.integer.as_ref(),
            DataType::String => self.string.as_ref(),
            DataType::Text => self.text.as_ref(),
            DataType::Log => self.log.as_ref(),
        }
    }
}

/// Settings for one value type. Unset fields fall back to `influxdb`; an
/// empty string unsets the field.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryTypeConfig {
    /// `false` never exports this type.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub url: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    pub token: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Where one value type is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destination {
    pub url: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    pub token: Option<String>,
}

impl Destination {
    /// Whether values routed here can be written at all.
    pub fn is_exported(&self) -> bool {
        self.url.is_some() && self.bucket.is_some()
    }
}

/// Resolved destination of every value type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destinations {
    table: [Destination; DataType::COUNT],
}

impl Destinations {
    /// Build the table by calling `f` once per value type.
    pub fn from_fn(mut f: impl FnMut(DataType) -> Destination) -> Self {
        Self {
            table: std::array::from_fn(|i| f(DataType::ALL[i])),
        }
    }

    /// Destination of `data_type`.
    pub fn resolve(&self, data_type: DataType) -> &Destination {
        &self.table[data_type.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DataType, &Destination)> + '_ {
        DataType::ALL.into_iter().zip(self.table.iter())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing failed.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// `log_level` is not a level name.
    #[error("invalid log level '{0}'")]
    LogLevel(String),
    /// An exported destination cannot be written to.
    #[error("invalid {data_type} destination: {source}")]
    Destination {
        data_type: DataType,
        #[source]
        source: DeliveryError,
    },
}

impl ExportConfig {
    /// Parse configuration from a YAML string.
    ///
    /// `${VAR}` and `${VAR:-default}` are replaced from the environment
    /// first.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ExportConfig = serde_yaml::from_str(&expand_env_vars(yaml))?;
        Ok(config)
    }

    /// Parse configuration from an open file or any other reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, ConfigError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Configured log filter, if any.
    pub fn log_level(&self) -> Result<Option<LevelFilter>, ConfigError> {
        self.log_level
            .as_deref()
            .map(|level| {
                LevelFilter::from_str(level.trim()).map_err(|_| ConfigError::LogLevel(level.into()))
            })
            .transpose()
    }

    /// Destination of `data_type`, merged from `influxdb` and the type's
    /// overrides. Not validated.
    pub fn destination(&self, data_type: DataType) -> Destination {
        let defaults = &self.influxdb;
        match self.history.get(data_type) {
            Some(overrides) if !overrides.enabled => Destination::default(),
            Some(overrides) => Destination {
                url: merge(&overrides.url, &defaults.url),
                org: merge(&overrides.org, &defaults.org),
                bucket: merge(&overrides.bucket, &defaults.bucket),
                token: merge(&overrides.token, &defaults.token),
            },
            None => Destination {
                url: non_empty(&defaults.url),
                org: non_empty(&defaults.org),
                bucket: non_empty(&defaults.bucket),
                token: non_empty(&defaults.token),
            },
        }
    }

    /// Resolve and validate the destination of every value type.
    ///
    /// Fails if an exported destination's url or token cannot be used for a
    /// write request.
    pub fn destinations(&self) -> Result<Destinations, ConfigError> {
        let destinations = Destinations::from_fn(|data_type| self.destination(data_type));
        for (data_type, destination) in destinations.iter() {
            if destination.is_exported() {
                delivery::validate(destination)
                    .map_err(|source| ConfigError::Destination { data_type, source })?;
            }
        }
        Ok(destinations)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn merge(value: &Option<String>, default: &Option<String>) -> Option<String> {
    match value {
        Some(_) => non_empty(value),
        None => non_empty(default),
    }
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

    let Some(regex) = ENV_VAR_REGEX
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").ok())
    else {
        return input.to_string();
    };

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}
