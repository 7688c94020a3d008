//! Configuration for the cinedash admin client.
//!
//! Values are composed from built-in defaults, an optional TOML file and
//! `CINEDASH_*` environment variables, in that order of precedence.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{ApiConfig, ClientConfig, MediaConfig, SessionConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
