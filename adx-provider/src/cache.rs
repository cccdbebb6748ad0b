//! Connection cache
//!
//! One live client per distinct cluster configuration, built lazily and kept
//! for the life of the process. The cache owns the only lock and exposes
//! nothing but [`ConnectionCache::get_or_create`]; no other component touches
//! the underlying map.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use adx_core::ClusterConfig;
use tracing::debug;

use crate::client::KustoClient;
use crate::error::ProviderError;

/// Builds a client from a validated configuration.
pub trait ClientFactory: Send + Sync {
    type Client: Send + Sync;

    fn build(&self, config: &ClusterConfig) -> Result<Self::Client, ProviderError>;
}

/// Default factory producing [`KustoClient`]s.
pub struct KustoClientFactory;

impl ClientFactory for KustoClientFactory {
    type Client = KustoClient;

    fn build(&self, config: &ClusterConfig) -> Result<KustoClient, ProviderError> {
        Ok(KustoClient::connect(config))
    }
}

/// Cache of live clients keyed by the configuration digest.
pub struct ConnectionCache<F: ClientFactory> {
    factory: F,
    clients: RwLock<HashMap<String, Arc<F::Client>>>,
}

/// The cache used by resource operations.
pub type KustoConnectionCache = ConnectionCache<KustoClientFactory>;

impl Default for KustoConnectionCache {
    fn default() -> Self {
        ConnectionCache::new(KustoClientFactory)
    }
}

impl<F: ClientFactory> ConnectionCache<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached client for this configuration, building it on first
    /// use.
    ///
    /// Validation runs under the write lock before construction, and a failed
    /// build leaves no entry behind, so a later call with the same
    /// configuration retries cleanly. At most one client is ever built per
    /// distinct configuration.
    pub fn get_or_create(&self, config: &ClusterConfig) -> Result<Arc<F::Client>, ProviderError> {
        let key = config.cache_key();

        {
            let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(client) = clients.get(&key) {
                return Ok(client.clone());
            }
        }

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the write lock: another worker may have built the
        // client while we waited.
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        config.validate()?;
        let client = Arc::new(self.factory.build(config)?);
        clients.insert(key, client.clone());
        debug!(uri = %config.uri, "built new cluster client");
        Ok(client)
    }

    /// Number of live clients currently held.
    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adx_core::ConfigError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        built: AtomicUsize,
        fail_first: bool,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                built: AtomicUsize::new(0),
                fail_first: false,
            }
        }

        fn failing_once() -> Self {
            Self {
                built: AtomicUsize::new(0),
                fail_first: true,
            }
        }
    }

    impl ClientFactory for CountingFactory {
        type Client = String;

        fn build(&self, config: &ClusterConfig) -> Result<String, ProviderError> {
            let attempt = self.built.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && attempt == 0 {
                return Err(ProviderError::Token("transient".to_string()));
            }
            Ok(format!("client-for-{}", config.uri))
        }
    }

    fn config() -> ClusterConfig {
        ClusterConfig {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            tenant_id: "tid".to_string(),
            uri: "https://c.kusto.windows.net".to_string(),
            use_default_credentials: false,
        }
    }

    #[test]
    fn test_same_config_builds_once() {
        let cache = ConnectionCache::new(CountingFactory::new());
        let first = cache.get_or_create(&config()).unwrap();
        let second = cache.get_or_create(&config()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.factory.built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let cache = ConnectionCache::new(CountingFactory::new());
        let reference = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| cache.get_or_create(&config()).unwrap()))
                .collect();
            let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let reference = clients[0].clone();
            for client in &clients {
                assert!(Arc::ptr_eq(client, &reference));
            }
            reference
        });

        assert_eq!(cache.factory.built.load(Ordering::SeqCst), 1);
        assert_eq!(*reference, "client-for-https://c.kusto.windows.net");
    }

    #[test]
    fn test_distinct_secrets_get_distinct_clients() {
        let cache = ConnectionCache::new(CountingFactory::new());
        let first = cache.get_or_create(&config()).unwrap();

        let mut other = config();
        other.client_secret = "rotated".to_string();
        let second = cache.get_or_create(&other).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.factory.built.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache = ConnectionCache::new(CountingFactory::failing_once());

        assert!(cache.get_or_create(&config()).is_err());
        assert!(cache.is_empty());

        // The next call retries construction rather than replaying the error.
        let client = cache.get_or_create(&config()).unwrap();
        assert_eq!(*client, "client-for-https://c.kusto.windows.net");
        assert_eq!(cache.factory.built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_validation_runs_before_construction() {
        let cache = ConnectionCache::new(CountingFactory::new());
        let mut config = config();
        config.client_secret.clear();

        let err = cache.get_or_create(&config).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Config(ConfigError::MissingField("client_secret"))
        ));
        assert_eq!(cache.factory.built.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }
}
