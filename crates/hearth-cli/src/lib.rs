//! Command-line front end for the Hearth listing search engine.
//!
//! # Modules
//!
//! - [`cli`]: clap argument and subcommand definitions
//! - [`config`]: [`HearthConfig`] loading (file, `HEARTH_` env, defaults)
//! - [`app`]: [`HearthCli`], logging setup and command dispatch
//! - [`store_handlers`]: index, search, get, delete, stats and clear
//! - [`config_handlers`]: `config` subcommands

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod store_handlers;

pub use app::HearthCli;
pub use cli::{CliArgs, Command};
pub use config::HearthConfig;
