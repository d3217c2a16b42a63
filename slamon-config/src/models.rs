use std::path::PathBuf;
use std::time::Duration;

use slamon_core::providers::StatusPageConfig;
use slamon_model::{Node, Product};

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub nodes: Vec<Node>,
    pub products: Vec<Product>,
    pub statuspage: StatusPageConfig,
    /// Log intended board writes instead of performing them.
    pub dry_run: bool,
    pub request_spacing: Duration,
    pub metadata: ConfigMetadata,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
    pub builtin_products: bool,
}

impl Config {
    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.name() == name)
    }
}
