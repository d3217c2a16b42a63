//! HTTP adapters for the catalog and board ports.

pub mod filename_pattern;
pub mod statuspage;
pub mod thredds;

pub use filename_pattern::FilenamePattern;
pub use statuspage::{StatusPageClient, StatusPageConfig};
pub use thredds::ThreddsCatalog;
