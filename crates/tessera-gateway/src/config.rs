//! Gateway configuration
//!
//! Loaded from a YAML file with `TESSERA__`-prefixed environment overrides.
//! Backends, regions and transport rules are lists: their names are values,
//! so they keep their case.

use crate::error::ConfigError;
use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tessera_transport::TransportRule;
use url::Url;

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum request body size (bytes)
    ///
    /// Bodies are buffered whole before the fan-out, so this bounds memory
    /// per in-flight request. Larger objects need multipart uploads.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: u64,
    /// Storage nodes
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Regions and the domains they serve
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
    /// Transport rules, in match order
    #[serde(default)]
    pub transports: Vec<TransportRule>,
    /// Divergence log
    #[serde(default)]
    pub sync_log: SyncLogConfig,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_body_size() -> u64 {
    64 * 1024 * 1024 // 64 MiB
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_size: default_max_body_size(),
            backends: Vec::new(),
            regions: Vec::new(),
            transports: Vec::new(),
            sync_log: SyncLogConfig::default(),
        }
    }
}

/// One storage node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    /// `http` or `https` URL of the node
    pub endpoint: String,
    /// Start drained
    #[serde(default)]
    pub maintenance: bool,
}

impl BackendConfig {
    /// Parsed endpoint
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            backend: self.name.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                backend: self.name.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidEndpoint {
                backend: self.name.clone(),
                reason: "missing host".to_string(),
            });
        }
        Ok(url)
    }
}

/// A region: the domains it answers for and its replica backends
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub domains: Vec<String>,
    /// Backend names
    pub backends: Vec<String>,
}

/// Divergence log settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncLogConfig {
    /// Methods whose divergences are recorded; empty disables the log
    #[serde(default)]
    pub methods: Vec<String>,
    /// Log file; the `synclog` tracing target when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SyncLogConfig {
    /// Configured methods
    pub fn parsed_methods(&self) -> Result<Vec<Method>, ConfigError> {
        self.methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| ConfigError::InvalidMethod(m.clone()))
            })
            .collect()
    }
}

impl GatewayConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix("TESSERA").separator("__"))
            .build()?;
        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml))
            .build()?;
        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Body limit for the HTTP layer, saturating on narrow targets
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_body_size).unwrap_or(usize::MAX)
    }

    /// Check cross references and endpoints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for backend in &self.backends {
            if !names.insert(backend.name.as_str()) {
                return Err(ConfigError::DuplicateBackend(backend.name.clone()));
            }
            backend.endpoint_url()?;
        }

        for region in &self.regions {
            if region.domains.is_empty() {
                return Err(ConfigError::EmptyRegion {
                    region: region.name.clone(),
                    missing: "domains",
                });
            }
            if region.backends.is_empty() {
                return Err(ConfigError::EmptyRegion {
                    region: region.name.clone(),
                    missing: "backends",
                });
            }
            if let Some(unknown) = region
                .backends
                .iter()
                .find(|name| !names.contains(name.as_str()))
            {
                return Err(ConfigError::UnknownBackend {
                    region: region.name.clone(),
                    backend: unknown.clone(),
                });
            }
        }

        self.sync_log.parsed_methods()?;
        Ok(())
    }
}
