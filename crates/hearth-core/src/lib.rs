//! Hearth Core: shared error type and configuration traits.
//!
//! This crate has no internal Hearth dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`traits`]: Configuration abstraction shared by the engine and CLI

pub mod error;
pub mod traits;

pub use error::{Error, Result};
pub use traits::ConfigProvider;
