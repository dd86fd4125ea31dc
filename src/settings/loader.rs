//! Reads `~/.wbemcli/settings.toml`.
//!
//! String values in `[connection]` may name an environment variable as
//! `$NAME` or `${NAME}`; the variable's value replaces the reference at
//! load time. An unset variable leaves the reference text as is. On first
//! run a commented template is written so users have something to edit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use super::schema::{ConnectionSettings, WbemSettings};

const TEMPLATE: &str = include_str!("template.toml");

/// `~/.wbemcli/settings.toml`, or `./.wbemcli/settings.toml` without a home.
pub fn settings_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".wbemcli").join("settings.toml")
}

/// Loaded settings plus the file they came from.
pub struct SettingsManager {
    settings: RwLock<WbemSettings>,
    path: PathBuf,
}

impl SettingsManager {
    pub async fn new() -> Result<Self> {
        Self::with_path(settings_path()).await
    }

    /// Load from `path`. A missing file yields the defaults.
    pub async fn with_path(path: PathBuf) -> Result<Self> {
        let settings = read_settings(&path).await?;
        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    pub async fn get(&self) -> WbemSettings {
        self.settings.read().await.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the template if no settings file exists yet. Returns whether
    /// a file was written.
    pub async fn ensure_settings_file(&self) -> Result<bool> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(false);
        }
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        tokio::fs::write(&self.path, TEMPLATE)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "Wrote settings template");
        Ok(true)
    }

    pub async fn reload(&self) -> Result<()> {
        let fresh = read_settings(&self.path).await?;
        *self.settings.write().await = fresh;
        Ok(())
    }
}

async fn read_settings(path: &Path) -> Result<WbemSettings> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(WbemSettings::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let mut settings: WbemSettings = toml::from_str(&contents)
        .with_context(|| format!("Invalid settings file {}", path.display()))?;
    interpolate(&mut settings.connection);
    tracing::debug!(path = %path.display(), "Loaded settings");
    Ok(settings)
}

fn interpolate(connection: &mut ConnectionSettings) {
    let fields = [
        &mut connection.server,
        &mut connection.namespace,
        &mut connection.user,
        &mut connection.password,
        &mut connection.ca_cert,
    ];
    for field in fields {
        if let Some(resolved) = field.as_deref().and_then(env_reference) {
            *field = Some(resolved);
        }
    }
}

/// Value of the variable named by `$NAME` / `${NAME}`, if it is set.
fn env_reference(value: &str) -> Option<String> {
    let name = value.trim().strip_prefix('$')?;
    let name = match name.strip_prefix('{') {
        Some(braced) => braced.strip_suffix('}')?,
        None => name,
    };
    std::env::var(name).ok()
}

/// First non-empty value of: the setting, then each of `env_vars` in
/// order, then `default`.
pub fn get_with_env_fallback(
    setting: &Option<String>,
    env_vars: &[&str],
    default: Option<String>,
) -> Option<String> {
    setting
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| {
            env_vars
                .iter()
                .filter_map(|name| std::env::var(name).ok())
                .find(|v| !v.is_empty())
        })
        .or(default)
}
