//! Hearth CLI application.
//!
//! Loads configuration, installs logging and dispatches commands to the
//! handlers.

use crate::cli::{CliArgs, Command};
use crate::config::HearthConfig;
use crate::{config_handlers, store_handlers};
use hearth_core::Result;
use hearth_core::traits::ConfigProvider;
use std::path::Path;
use tracing_subscriber::EnvFilter;

// ============================================================================
// HearthCli
// ============================================================================

/// The `hearth` application.
pub struct HearthCli {
    config: HearthConfig,
    version: String,
}

impl HearthCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = HearthConfig::load(args.config.as_deref())?;
        Ok(Self::new(config))
    }

    /// Create with an already loaded configuration.
    pub fn new(config: HearthConfig) -> Self {
        Self {
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The loaded configuration.
    pub fn config(&self) -> &HearthConfig {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity
    /// flags. Records from the `log` facade are forwarded to the subscriber.
    pub fn init_logging(verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // A subscriber may already be installed (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        Self::init_logging(args.verbose, args.quiet);
        tracing::debug!("Running {} with {:?}", self.config.project_name(), args.command);

        let Some(command) = args.command else {
            println!(
                "{} {}: use --help for usage",
                self.config.project_name(),
                self.version
            );
            return Ok(());
        };

        match command {
            Command::Version => {
                println!("{} {}", self.config.project_name(), self.version);
                Ok(())
            }
            Command::Config(config_cmd) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            command => self.run_store_command(command).await,
        }
    }

    async fn run_store_command(&self, command: Command) -> Result<()> {
        let store = store_handlers::open_store(&self.config).await?;
        match command {
            Command::Index {
                file,
                batch_size,
                replace,
            } => store_handlers::handle_index(&store, Path::new(&file), batch_size, replace)
                .await
                .map(drop),
            Command::Search(search) => store_handlers::handle_search(&store, search).await.map(drop),
            Command::Get { ids } => store_handlers::handle_get(&store, &ids).await.map(drop),
            Command::Delete { source } => store_handlers::handle_delete(&store, &source).await.map(drop),
            Command::Stats => store_handlers::handle_stats(&store).await.map(drop),
            Command::Clear => store_handlers::handle_clear(&store).await,
            Command::Version | Command::Config(_) => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
