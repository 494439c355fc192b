//! Core traits for Hearth.
//!
//! [`ConfigProvider`] abstracts where a deployment keeps its data, so the
//! engine and the CLI can resolve storage paths without knowing how the
//! configuration was loaded.

use std::path::PathBuf;

use crate::Result;

/// Trait for deployment-specific configuration.
///
/// # Bounds
///
/// - `Send + Sync`: Configuration must be shareable across threads
/// - `Clone`: Configuration can be duplicated for passing to subsystems
/// - `'static`: Configuration lifetime is not borrowed
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use hearth_core::traits::ConfigProvider;
/// use hearth_core::Result;
///
/// #[derive(Clone)]
/// struct ListingsConfig {
///     data_dir: PathBuf,
/// }
///
/// impl ConfigProvider for ListingsConfig {
///     fn project_name(&self) -> &str {
///         "listings"
///     }
///
///     fn base_path(&self) -> Result<PathBuf> {
///         Ok(self.data_dir.clone())
///     }
///
///     fn data_path(&self, kind: &str) -> Result<PathBuf> {
///         Ok(self.data_dir.join(kind))
///     }
/// }
/// ```
pub trait ConfigProvider: Send + Sync + Clone + 'static {
    /// The project name, used for env var prefixes and default paths.
    fn project_name(&self) -> &str;

    /// Base path for all project data.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined.
    fn base_path(&self) -> Result<PathBuf>;

    /// Path for a specific kind of stored data.
    ///
    /// `kind` is a key like `"vectors"` or `"listings"`; the implementation
    /// decides how it maps onto the filesystem.
    fn data_path(&self, kind: &str) -> Result<PathBuf>;
}
