use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    provider::{ProviderError, StorageProvider},
    yaml_config::{ResolvedBackend, ResolvedConfig},
};
use crate::infra::{aws::S3Storage, filesystem::FilesystemStorage, memory::MemoryStorage};

/// Named providers configured for this gateway.
///
/// The map is built once at startup and shared read-only between requests.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<HashMap<String, Arc<dyn StorageProvider>>>,
    /// S3 backends, kept separately for the startup connectivity check
    buckets: Arc<HashMap<String, Arc<S3Storage>>>,
}

impl ProviderRegistry {
    /// Create a registry from resolved configuration
    pub async fn from_config(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        let mut providers: HashMap<String, Arc<dyn StorageProvider>> = HashMap::new();
        let mut buckets = HashMap::new();

        for provider_config in &config.providers {
            let provider: Arc<dyn StorageProvider> = match &provider_config.backend {
                ResolvedBackend::Memory => Arc::new(MemoryStorage::new()),
                ResolvedBackend::Filesystem { root } => {
                    Arc::new(FilesystemStorage::new(root).await?)
                }
                ResolvedBackend::S3(bucket_config) => {
                    let storage = Arc::new(S3Storage::from_resolved_bucket(bucket_config).await?);
                    buckets.insert(provider_config.name.clone(), storage.clone());
                    storage
                }
            };
            providers.insert(provider_config.name.clone(), provider);
        }

        Ok(Self {
            providers: Arc::new(providers),
            buckets: Arc::new(buckets),
        })
    }

    /// Build a registry from already constructed providers
    pub fn from_providers<I>(providers: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<dyn StorageProvider>)>,
    {
        Self {
            providers: Arc::new(providers.into_iter().collect()),
            buckets: Arc::new(HashMap::new()),
        }
    }

    /// Test connectivity to all configured S3 buckets
    /// This should be called during startup to validate bucket access
    pub async fn test_all_buckets(&self) -> Result<(), ProviderError> {
        if self.buckets.is_empty() {
            return Ok(());
        }
        tracing::info!("Testing connectivity to all configured buckets...");

        for (name, storage) in self.buckets.iter() {
            tracing::info!("Testing provider: {}", name);
            storage.test_connection().await?;
        }

        tracing::info!("All bucket connectivity tests passed");
        Ok(())
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageProvider>> {
        self.providers.get(name).cloned()
    }

    /// Get provider names
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.providers.keys()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
