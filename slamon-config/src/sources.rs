use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::defaults::DEFAULT_NODE_NAME;

/// Raw configuration as defined in a TOML or JSON file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub nodes: Vec<FileNodeConfig>,
    #[serde(default)]
    pub statuspage: FileStatusPageConfig,
    /// Replaces the built-in product table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<FileProductConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_spacing: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileNodeConfig {
    #[serde(default = "default_node_name")]
    pub name: String,
    #[serde(alias = "apikey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_node_name() -> String {
    DEFAULT_NODE_NAME.to_string()
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStatusPageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(alias = "apikey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileProductConfig {
    pub name: String,
    pub component_id: String,
    /// Hours of the day a run starts.
    pub cadence: Vec<u32>,
    pub expected_latency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_grace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_grace: Option<String>,
    pub catalog_url: String,
    pub filename_pattern: String,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub statuspage_page_id: Option<String>,
    pub statuspage_api_key: Option<String>,
    pub statuspage_api_key_file: Option<PathBuf>,
    pub dry_run: Option<bool>,
    pub request_spacing: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("SLAMON_CONFIG").ok().map(PathBuf::from),
            statuspage_page_id: non_empty_var("SLAMON_STATUSPAGE_PAGE_ID"),
            statuspage_api_key: non_empty_var("SLAMON_STATUSPAGE_API_KEY"),
            statuspage_api_key_file: non_empty_var(
                "SLAMON_STATUSPAGE_API_KEY_FILE",
            )
            .map(PathBuf::from),
            dry_run: parse_bool_var("SLAMON_DRY_RUN"),
            request_spacing: non_empty_var("SLAMON_REQUEST_SPACING"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
