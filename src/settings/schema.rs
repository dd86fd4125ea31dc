//! Settings schema for wbemcli.
//!
//! All settings structs use `#[serde(default)]` so a partial file is valid.
//! Missing fields are filled with defaults.

use serde::{Deserialize, Serialize};

/// Root settings structure, loaded from `~/.wbemcli/settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WbemSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Server and credentials
    pub connection: ConnectionSettings,

    /// Result display
    pub output: OutputSettings,
}

impl Default for WbemSettings {
    fn default() -> Self {
        Self {
            version: 1,
            connection: ConnectionSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

/// Connection defaults. Command-line flags win over every field here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Host name, URL, or local socket path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Supports `$VAR` / `${VAR}` references
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Use http instead of https when composing the URL
    pub no_ssl: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    pub verify_certificates: bool,

    /// Extra PEM root certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server: None,
            namespace: None,
            user: None,
            password: None,
            no_ssl: false,
            port: None,
            timeout_secs: 30,
            verify_certificates: true,
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
}

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mof,
    Json,
}
