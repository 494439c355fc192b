//! Handler functions for config CLI commands.
//!
//! Implements `hearth config {path,show,init,export}`. Editing is left to
//! the TOML file itself or `HEARTH_STORE_*` overrides.

use crate::cli::ConfigAction;
use crate::config::HearthConfig;
use hearth_core::{Error, Result};
use std::path::PathBuf;

// ============================================================================
// Command dispatch
// ============================================================================

/// Handle a config subcommand.
///
/// Receives the raw `--config` path (not a loaded config) because some
/// commands (path, init) work before a config file exists.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Show => {
            let config = HearthConfig::load(config_path)?;
            cmd_config_show(&config)
        }
        ConfigAction::Init { file, force } => cmd_config_init(file.as_deref(), force),
        ConfigAction::Export { docker_env } => {
            let config = HearthConfig::load(config_path)?;
            cmd_config_export(&config, docker_env)
        }
    }
}

// ============================================================================
// Command handlers
// ============================================================================

/// Show the resolved config file path.
fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    match HearthConfig::resolve_config_path(config_path) {
        Some(path) => {
            let exists = path.exists();
            println!("{}", path.display());
            if !exists {
                eprintln!("(file does not exist; run `hearth config init` to create it)");
            }
            Ok(())
        }
        None => Err(Error::config(
            "Could not determine config directory for this platform",
        )),
    }
}

/// Print the resolved configuration (file, env and defaults merged).
fn cmd_config_show(config: &HearthConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

/// Create a default configuration file.
fn cmd_config_init(file: Option<&str>, force: bool) -> Result<()> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => HearthConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let config = HearthConfig::default();
    let toml_str = config.to_toml_string()?;
    std::fs::write(&path, &toml_str).map_err(|e| Error::io_with_path(e, &path))?;

    println!("Config file created at {}", path.display());
    Ok(())
}

/// Export configuration as environment variables.
fn cmd_config_export(config: &HearthConfig, docker_env: bool) -> Result<()> {
    let vars = config.to_env_vars()?;
    for (key, value) in &vars {
        if docker_env {
            println!("--env {key}={value}");
        } else {
            println!("{key}={value}");
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, HearthConfig::default().to_toml_string().unwrap()).unwrap();
        (dir, path)
    }

    // ------------------------------------------------------------------------
    // Command tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_config_path_explicit() {
        assert!(cmd_config_path(Some("/explicit/config.toml")).is_ok());
    }

    #[test]
    fn test_config_show() {
        assert!(cmd_config_show(&HearthConfig::default()).is_ok());
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hearth").join("config.toml");

        cmd_config_init(Some(path.to_str().unwrap()), false).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[store]"));
        assert!(content.contains("collection = \"properties\""));
    }

    #[test]
    fn test_config_init_respects_force() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "old").unwrap();
        let p = path.to_str().unwrap();

        let err = cmd_config_init(Some(p), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        cmd_config_init(Some(p), true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[store]"));
    }

    #[test]
    fn test_config_export() {
        let config = HearthConfig::default();
        assert!(cmd_config_export(&config, false).is_ok());
        assert!(cmd_config_export(&config, true).is_ok());
    }

    #[test]
    fn test_dispatch_reads_config_file() {
        let (_dir, path) = default_config_file();
        let p = path.to_str();
        assert!(handle_config_command(p, ConfigAction::Show).is_ok());
        assert!(handle_config_command(p, ConfigAction::Export { docker_env: false }).is_ok());

        let loaded = HearthConfig::load(p).unwrap();
        assert!(loaded.store.persist);
        assert_eq!(loaded.store.collection, "properties");
    }
}
