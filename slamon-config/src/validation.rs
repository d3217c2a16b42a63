use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use super::models::Config;

/// statuspage.io throttles clients above one request per second.
const MIN_REQUEST_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("no nodes configured; every product would be reported as delayed")]
    NoNodes,
    #[error("no products configured")]
    NoProducts,
    #[error("node '{name}' is configured more than once")]
    DuplicateNode { name: String },
    #[error("product '{name}' is configured more than once")]
    DuplicateProduct { name: String },
    #[error("statuspage page_id must not be empty")]
    EmptyPageId,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.nodes.is_empty() {
        return Err(ConfigGuardRailError::NoNodes);
    }
    if config.products.is_empty() {
        return Err(ConfigGuardRailError::NoProducts);
    }
    if config.statuspage.page_id.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptyPageId);
    }

    let mut nodes = HashSet::new();
    for node in &config.nodes {
        if !nodes.insert(node.name.as_str()) {
            return Err(ConfigGuardRailError::DuplicateNode {
                name: node.name.clone(),
            });
        }
    }

    let mut products = HashSet::new();
    let mut components = HashSet::new();
    for product in &config.products {
        if !products.insert(product.name()) {
            return Err(ConfigGuardRailError::DuplicateProduct {
                name: product.name().to_string(),
            });
        }
        if !components.insert(product.component_id()) {
            warnings.push(format!(
                "component {} is shared by several products; their verdicts will overwrite each other",
                product.component_id()
            ));
        }
    }

    if config.statuspage.api_key.is_none() && !config.dry_run {
        warnings.push_with_hint(
            "No statuspage API key configured; board writes will be rejected",
            "Set SLAMON_STATUSPAGE_API_KEY or SLAMON_STATUSPAGE_API_KEY_FILE, or run with --dry-run",
        );
    }

    if config.request_spacing < MIN_REQUEST_SPACING {
        warnings.push_with_hint(
            format!(
                "Request spacing of {:?} is below the statuspage.io limit of one request per second",
                config.request_spacing
            ),
            "Remove SLAMON_REQUEST_SPACING unless talking to a test double",
        );
    }

    Ok(warnings)
}
