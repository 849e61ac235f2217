//! Application state

use crate::config::{GatewayConfig, SyncLogConfig};
use crate::error::ConfigError;
use crate::regions::RegionResolver;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{Backend, RoundTrip, Ring};
use tessera_storages::{Cluster, FileSyncLog, SyncLogSink, SyncSender, TracingSyncLog};
use tessera_transport::HttpTransport;
use tracing::info;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Domain table
    pub resolver: RegionResolver,
}

impl AppState {
    /// Build transports, backends and regions from configuration
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let transport: Arc<dyn RoundTrip> =
            Arc::new(HttpTransport::new(config.transports.iter().cloned())?);
        let sync = Arc::new(sync_sender(&config.sync_log)?);

        let mut backends = HashMap::with_capacity(config.backends.len());
        for backend in &config.backends {
            let node = Backend::new(&backend.name, backend.endpoint_url()?, Arc::clone(&transport))
                .with_maintenance(backend.maintenance);
            if backend.maintenance {
                info!("backend {} starts in maintenance", backend.name);
            }
            backends.insert(backend.name.as_str(), Arc::new(node));
        }

        let mut resolver = RegionResolver::new();
        for region in &config.regions {
            let members = region
                .backends
                .iter()
                .map(|name| {
                    backends
                        .get(name.as_str())
                        .cloned()
                        .ok_or_else(|| ConfigError::UnknownBackend {
                            region: region.name.clone(),
                            backend: name.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            info!(
                "region {} serves {} with {} backends",
                region.name,
                region.domains.join(", "),
                members.len()
            );
            let ring: Arc<dyn Ring> =
                Arc::new(Cluster::new(&region.name, members, Arc::clone(&sync)));
            for domain in &region.domains {
                resolver.bind(&region.name, domain, Arc::clone(&ring));
            }
        }

        Ok(Self { config, resolver })
    }

    /// State around a prebuilt resolver
    pub fn with_resolver(config: GatewayConfig, resolver: RegionResolver) -> Self {
        Self { config, resolver }
    }
}

fn sync_sender(config: &SyncLogConfig) -> Result<SyncSender, ConfigError> {
    let methods = config.parsed_methods()?;
    if methods.is_empty() {
        return Ok(SyncSender::disabled());
    }

    let sink: Arc<dyn SyncLogSink> = match &config.path {
        Some(path) => {
            let log = FileSyncLog::open(path).map_err(|source| ConfigError::SyncLog {
                path: path.clone(),
                source,
            })?;
            info!("recording divergences to {}", path.display());
            Arc::new(log)
        }
        None => {
            info!("recording divergences to the synclog log target");
            Arc::new(TracingSyncLog)
        }
    };
    Ok(SyncSender::new(methods, Some(sink)))
}
