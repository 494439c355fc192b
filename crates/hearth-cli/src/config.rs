//! Configuration for the Hearth CLI.
//!
//! Provides the [`HearthConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `HEARTH_CONFIG` environment variable
//! 3. XDG default: `~/.config/hearth/config.toml`
//! 4. Built-in defaults

use confyg::{Confygery, env};
use hearth_core::traits::ConfigProvider;
use hearth_core::{Error, Result};
use hearth_vector::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Env var prefix.
const ENV_PREFIX: &str = "HEARTH";

/// Data kind for the vector store directory.
pub const VECTORS: &str = "vectors";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the Hearth CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Project name, used for default paths.
    pub project_name: String,

    /// Base path for stored data.
    pub base_path: Option<String>,

    /// Search engine configuration.
    pub store: StoreConfig,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            project_name: "hearth".to_string(),
            base_path: None,
            store: StoreConfig::default(),
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl HearthConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level(ENV_PREFIX);
        env_opts.add_section("store");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("HEARTH_CONFIG") {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hearth").join("config.toml"))
    }

    /// Store configuration with the vector directory resolved.
    ///
    /// A persistent store without an explicit `db_path` keeps its data under
    /// `<base_path>/vectors` when `base_path` is set.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut store = self.store.clone();
        if store.persist && store.db_path.is_none() && self.base_path.is_some() {
            store.db_path = Some(self.data_path(VECTORS)?.to_string_lossy().into_owned());
        }
        Ok(store)
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `HEARTH_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, ENV_PREFIX, &mut vars);
        Ok(vars)
    }
}

// ============================================================================
// ConfigProvider implementation
// ============================================================================

impl ConfigProvider for HearthConfig {
    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn base_path(&self) -> Result<PathBuf> {
        match &self.base_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => std::env::current_dir()
                .map_err(|e| Error::config(format!("Could not determine base path: {e}"))),
        }
    }

    fn data_path(&self, kind: &str) -> Result<PathBuf> {
        match (&self.store.db_path, kind) {
            (Some(p), VECTORS) => Ok(PathBuf::from(p)),
            _ => Ok(self.base_path()?.join(kind)),
        }
    }
}

// ============================================================================
// Helper: flatten TOML to env vars
// ============================================================================

fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
