// Service registry, built once at startup and passed to callers

use std::sync::Arc;
use tracing::debug;

use super::backends::YouTube;
use super::errors::{DownloadError, Result};
use super::models::DownloaderConfig;
use super::tools::{FfmpegMuxer, Muxer};
use super::traits::Service;

/// Immutable list of services, consulted in registration order
#[derive(Clone)]
pub struct ServiceRegistry {
    services: Arc<[Box<dyn Service>]>,
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Registry with every built-in service, sharing one muxer probe
    pub fn with_defaults(config: &DownloaderConfig) -> Result<Self> {
        let muxer: Arc<dyn Muxer> = Arc::new(FfmpegMuxer::detect());
        Ok(Self::builder()
            .add_service(Box::new(YouTube::new(config, muxer)?))
            .build())
    }

    /// First service accepting `target`
    pub fn find(&self, target: &str) -> Result<&dyn Service> {
        for service in self.services.iter() {
            if service.is_valid_target(target) {
                debug!("{} handles {}", service.name(), target);
                return Ok(service.as_ref());
            }
        }

        Err(DownloadError::UnsupportedTarget(target.to_string()))
    }

    pub fn services(&self) -> impl Iterator<Item = &dyn Service> {
        self.services.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[derive(Default)]
pub struct ServiceRegistryBuilder {
    services: Vec<Box<dyn Service>>,
}

impl ServiceRegistryBuilder {
    pub fn add_service(mut self, service: Box<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            services: self.services.into(),
        }
    }
}
