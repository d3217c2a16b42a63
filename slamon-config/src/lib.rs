//! Configuration for slamon.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! (or legacy JSON) file and `SLAMON_*` environment variables, optionally
//! seeded from a `.env` file. The result is validated before use; problems
//! that do not prevent a run are reported as [`ConfigWarnings`].

pub mod defaults;
pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use models::{Config, ConfigMetadata};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
