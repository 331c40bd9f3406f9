// ABOUTME: Connector configuration loaded from the platform config file
// ABOUTME: Validates required parameters and normalizes the Looker host URL

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::delivery::DashboardSpec;
use crate::error::ConnectorError;

/// Path segment appended to every host URL before any API call.
pub const API_VERSION_PATH: &str = "api/3.1/";

pub const DEFAULT_OUTPUT_TABLE: &str = "delivery_log.csv";
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

/// A string that never shows up in `Debug` output or logs.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub storage: Storage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub looker_host_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default, rename = "#client_secret")]
    pub client_secret: Option<SecretString>,
    #[serde(default)]
    pub dashboards: Vec<DashboardSpec>,
    #[serde(default = "default_output_table")]
    pub output_table: String,
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    #[serde(default)]
    pub debug: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            looker_host_url: None,
            client_id: None,
            client_secret: None,
            dashboards: Vec::new(),
            output_table: default_output_table(),
            progress_every: default_progress_every(),
            debug: false,
        }
    }
}

fn default_output_table() -> String {
    DEFAULT_OUTPUT_TABLE.to_string()
}

fn default_progress_every() -> usize {
    DEFAULT_PROGRESS_EVERY
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    #[serde(default)]
    pub input: InputMapping,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputMapping {
    #[serde(default)]
    pub tables: Vec<InputTableMapping>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputTableMapping {
    #[serde(default)]
    pub source: Option<String>,
    pub destination: String,
}

/// Configuration after validation: every required value present, URL normalized.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub base_url: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub input_tables: Vec<String>,
    pub dashboards: Vec<DashboardSpec>,
    pub output_table: String,
    pub progress_every: usize,
}

impl Config {
    /// Reads a config file; `.toml` files are parsed as TOML, anything else as JSON.
    pub fn from_path(path: &Path) -> Result<Self, ConnectorError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConnectorError::Configuration(format!(
                "Cannot read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConnectorError> {
        serde_json::from_str(raw).map_err(|e| {
            ConnectorError::Configuration(format!("Configuration is not valid JSON: {}", e))
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConnectorError> {
        toml::from_str(raw).map_err(|e| {
            ConnectorError::Configuration(format!("Configuration is not valid TOML: {}", e))
        })
    }

    /// Checks that every required parameter is present and turns the config
    /// into a [`ValidatedConfig`].
    pub fn validate(&self) -> Result<ValidatedConfig, ConnectorError> {
        let params = &self.parameters;
        let mut missing = Vec::new();

        let host = non_empty(params.looker_host_url.as_deref());
        if host.is_none() {
            missing.push("looker_host_url");
        }
        let client_id = non_empty(params.client_id.as_deref());
        if client_id.is_none() {
            missing.push("client_id");
        }
        let client_secret = params.client_secret.as_ref().filter(|s| !s.is_empty());
        if client_secret.is_none() {
            missing.push("#client_secret");
        }

        let input_tables: Vec<String> = self
            .storage
            .input
            .tables
            .iter()
            .map(|t| t.destination.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if input_tables.is_empty() && params.dashboards.is_empty() {
            missing.push("input tables or dashboards");
        }

        if !missing.is_empty() {
            return Err(ConnectorError::Configuration(format!(
                "Missing required parameters: {}",
                missing.join(", ")
            )));
        }

        if params.progress_every == 0 {
            return Err(ConnectorError::Configuration(
                "progress_every must be at least 1".to_string(),
            ));
        }

        let output_table = params.output_table.trim();
        if output_table.is_empty() {
            return Err(ConnectorError::Configuration(
                "output_table must not be empty".to_string(),
            ));
        }

        let base_url = normalize_url(host.unwrap_or_default())?;

        Ok(ValidatedConfig {
            base_url,
            client_id: client_id.unwrap_or_default().to_string(),
            client_secret: client_secret.cloned().unwrap_or_default(),
            input_tables,
            dashboards: params.dashboards.clone(),
            output_table: output_table.to_string(),
            progress_every: params.progress_every,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Normalizes a user-supplied Looker host into the API base URL.
///
/// Adds a trailing `/`, defaults the scheme to `https://`, and appends
/// [`API_VERSION_PATH`]. Schemes other than http/https, an empty port, and
/// anything that does not parse as an absolute URL with a host are
/// configuration errors.
pub fn normalize_url(raw: &str) -> Result<Url, ConnectorError> {
    let invalid = |reason: &str| {
        ConnectorError::Configuration(format!("Invalid Looker host URL '{}': {}", raw, reason))
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConnectorError::Configuration(
            "Looker host URL is empty".to_string(),
        ));
    }

    let (scheme, rest) = match trimmed.find("://") {
        Some(idx) => (trimmed[..idx].to_ascii_lowercase(), &trimmed[idx + 3..]),
        None => ("https".to_string(), trimmed),
    };
    if scheme != "http" && scheme != "https" {
        return Err(invalid(&format!("unsupported scheme '{}'", scheme)));
    }

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(invalid("missing host"));
    }
    if authority.ends_with(':') {
        return Err(invalid("empty port"));
    }

    let mut candidate = format!("{}://{}", scheme, rest);
    if !candidate.ends_with('/') {
        candidate.push('/');
    }

    let host_url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
    if host_url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(invalid("missing host"));
    }

    host_url
        .join(API_VERSION_PATH)
        .map_err(|e| invalid(&e.to_string()))
}

/// Default config file location inside the data directory.
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}
