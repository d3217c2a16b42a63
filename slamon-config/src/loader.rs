use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::TimeDelta;
use slamon_core::gate::DEFAULT_REQUEST_SPACING;
use slamon_core::providers::StatusPageConfig;
use slamon_core::providers::statuspage::DEFAULT_PAGE_ID;
use slamon_model::{Cadence, ModelError, Node, Product};
use thiserror::Error;
use url::Url;

use super::{
    defaults::{self, DEFAULT_CONFIG_FILE},
    models::{Config, ConfigMetadata},
    sources::{
        EnvConfig, FileConfig, FileNodeConfig, FileProductConfig,
        FileStatusPageConfig,
    },
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from(DEFAULT_CONFIG_FILE),
        PathBuf::from("config").join(DEFAULT_CONFIG_FILE),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Loads against an already gathered environment.
    pub fn load_with_env(
        &self,
        env_config: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env_config)?;
        let (config, warnings) = self.compose_config(
            file_config,
            env_config,
            config_path,
            env_file_loaded,
        )?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        }

        if source.is_empty() {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config = parse_file_config(&path, &contents)?;
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No slamon.toml detected; falling back to environment variables",
                "Pass a configuration file or set SLAMON_CONFIG",
            );
        }

        let FileConfig {
            nodes: file_nodes,
            statuspage: file_statuspage,
            products: file_products,
            dry_run: file_dry_run,
            request_spacing: file_request_spacing,
        } = file_config.unwrap_or_default();

        let nodes = file_nodes
            .into_iter()
            .map(resolve_node)
            .collect::<Result<Vec<_>, _>>()?;

        let builtin_products = file_products.is_none();
        let products = match file_products {
            Some(products) => products
                .into_iter()
                .map(resolve_product)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults::builtin_products().map_err(|source| {
                ConfigLoadError::InvalidProduct {
                    name: "built-in table".to_string(),
                    source,
                }
            })?,
        };

        let request_spacing = match env
            .request_spacing
            .as_deref()
            .or(file_request_spacing.as_deref())
        {
            Some(raw) => parse_std_duration("request_spacing", raw)?,
            None => DEFAULT_REQUEST_SPACING,
        };

        let statuspage =
            resolve_statuspage(&env, file_statuspage, request_spacing)?;
        let dry_run = env.dry_run.or(file_dry_run).unwrap_or(false);

        let config = Config {
            nodes,
            products,
            statuspage,
            dry_run,
            request_spacing,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
                builtin_products,
            },
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }
}

fn parse_file_config(
    path: &Path,
    contents: &str,
) -> Result<FileConfig, ConfigLoadError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(contents).map_err(|source| {
            ConfigLoadError::ParseJson {
                path: path.to_path_buf(),
                source,
            }
        })
    } else {
        toml::from_str(contents).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn resolve_node(file: FileNodeConfig) -> Result<Node, ConfigLoadError> {
    let mut node = Node::new(file.name.trim());

    let api_key = match (
        file.api_key.filter(|key| !key.trim().is_empty()),
        file.api_key_file,
    ) {
        (Some(key), _) => Some(key),
        (None, Some(path)) => read_secret_file(&path)?,
        (None, None) => None,
    };
    if let Some(key) = api_key {
        node = node.with_api_key(key);
    }

    if let Some(raw) = file.base_url {
        let field = format!("nodes.{}.base_url", node.name);
        node = node.with_base_url(parse_url(&field, &raw)?);
    }
    Ok(node)
}

fn resolve_product(file: FileProductConfig) -> Result<Product, ConfigLoadError> {
    let invalid = |source: ModelError| ConfigLoadError::InvalidProduct {
        name: file.name.clone(),
        source,
    };
    let field = |name: &str| format!("products.{}.{}", file.name, name);

    let cadence = Cadence::new(file.cadence.iter().copied()).map_err(invalid)?;
    let mut builder = Product::builder(file.name.as_str(), file.component_id.as_str())
        .cadence(cadence)
        .expected_latency(parse_time_delta(
            &field("expected_latency"),
            &file.expected_latency,
        )?)
        .catalog_url(parse_url(&field("catalog_url"), &file.catalog_url)?)
        .filename_pattern(file.filename_pattern.as_str());

    if let Some(raw) = &file.warning_grace {
        builder = builder.warning_grace(parse_time_delta(&field("warning_grace"), raw)?);
    }
    if let Some(raw) = &file.error_grace {
        builder = builder.error_grace(parse_time_delta(&field("error_grace"), raw)?);
    }

    builder.build().map_err(invalid)
}

fn resolve_statuspage(
    env: &EnvConfig,
    file: FileStatusPageConfig,
    request_spacing: Duration,
) -> Result<StatusPageConfig, ConfigLoadError> {
    let page_id = env
        .statuspage_page_id
        .clone()
        .or(file.page_id)
        .unwrap_or_else(|| DEFAULT_PAGE_ID.to_string());

    let mut api_key = env.statuspage_api_key.clone();
    if api_key.is_none() {
        if let Some(path) = env.statuspage_api_key_file.as_ref() {
            api_key = read_secret_file(path)?;
        }
    }
    if api_key.is_none() {
        api_key = file.api_key.filter(|key| !key.trim().is_empty());
    }
    if api_key.is_none() {
        if let Some(path) = file.api_key_file.as_ref() {
            api_key = read_secret_file(path)?;
        }
    }

    let api_base = file
        .api_base
        .map(|raw| parse_url("statuspage.api_base", &raw))
        .transpose()?;
    let status_base = file
        .status_base
        .map(|raw| parse_url("statuspage.status_base", &raw))
        .transpose()?;

    Ok(StatusPageConfig {
        page_id,
        api_key,
        api_base,
        status_base,
        request_spacing,
    })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigLoadError> {
    Url::parse(raw.trim()).map_err(|source| ConfigLoadError::InvalidUrl {
        field: field.to_string(),
        value: raw.to_string(),
        source,
    })
}

fn parse_std_duration(field: &str, raw: &str) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|err| {
        ConfigLoadError::InvalidDuration {
            field: field.to_string(),
            value: raw.to_string(),
            reason: err.to_string(),
        }
    })
}

fn parse_time_delta(field: &str, raw: &str) -> Result<TimeDelta, ConfigLoadError> {
    let duration = parse_std_duration(field, raw)?;
    TimeDelta::from_std(duration).map_err(|err| ConfigLoadError::InvalidDuration {
        field: field.to_string(),
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

fn read_secret_file(path: &Path) -> Result<Option<String>, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse JSON configuration {path}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid duration '{value}' for {field}: {reason}")]
    InvalidDuration {
        field: String,
        value: String,
        reason: String,
    },
    #[error("invalid URL '{value}' for {field}")]
    InvalidUrl {
        field: String,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid product '{name}'")]
    InvalidProduct {
        name: String,
        #[source]
        source: ModelError,
    },
    #[error("failed to read secret file {path}")]
    SecretFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.env.is_none() && self.default.is_none()
    }

    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Env
        )
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
