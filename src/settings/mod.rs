//! TOML-based settings for wbemcli.
//!
//! Settings are loaded from `~/.wbemcli/settings.toml` with environment
//! variable interpolation. The `WBEM_*` environment variables still work
//! through the `get_with_env_fallback` helper.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wbemcli_lib::settings::{SettingsManager, get_with_env_fallback};
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//!
//! let server = get_with_env_fallback(&settings.connection.server, &["WBEM_SERVER"], None);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, settings_path, SettingsManager};
pub use schema::{ConnectionSettings, OutputFormat, OutputSettings, WbemSettings};
