//! Cluster connection configuration
//!
//! Every resource operation targets a cluster described by a [`ClusterConfig`].
//! Objects may carry their own configuration block; anything left empty falls
//! back to the provider-level default and, for the four ambient values, to
//! environment-sourced defaults. Resolution is a pure merge and never fails;
//! validation happens separately, right before a client is built.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// Connection settings for one cluster.
///
/// All fields may be empty while a configuration is still being merged; a
/// configuration handed to the connection cache must pass [`validate`].
///
/// [`validate`]: ClusterConfig::validate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub uri: String,
    pub use_default_credentials: bool,
}

/// Ambient defaults sourced from the environment by the embedding process.
///
/// The resolver never reads the environment itself; callers hand it one of
/// these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDefaults {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub endpoint: String,
}

impl EnvDefaults {
    /// Read the `ADX_*` variables. Unset variables resolve to empty strings.
    pub fn from_env() -> Self {
        Self {
            client_id: std::env::var("ADX_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("ADX_CLIENT_SECRET").unwrap_or_default(),
            tenant_id: std::env::var("ADX_TENANT_ID").unwrap_or_default(),
            endpoint: std::env::var("ADX_ENDPOINT").unwrap_or_default(),
        }
    }
}

fn pick(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

impl ClusterConfig {
    /// Merge this configuration over `defaults`: any empty field takes the
    /// default's value, non-empty fields always win.
    /// `use_default_credentials` falls through when unset.
    pub fn resolved(&self, defaults: &ClusterConfig) -> ClusterConfig {
        ClusterConfig {
            client_id: pick(&self.client_id, &defaults.client_id),
            client_secret: pick(&self.client_secret, &defaults.client_secret),
            tenant_id: pick(&self.tenant_id, &defaults.tenant_id),
            uri: pick(&self.uri, &defaults.uri),
            use_default_credentials: self.use_default_credentials
                || defaults.use_default_credentials,
        }
    }

    /// Fill any field that is still empty from the ambient environment
    /// defaults.
    pub fn with_env_defaults(&self, env: &EnvDefaults) -> ClusterConfig {
        ClusterConfig {
            client_id: pick(&self.client_id, &env.client_id),
            client_secret: pick(&self.client_secret, &env.client_secret),
            tenant_id: pick(&self.tenant_id, &env.tenant_id),
            uri: pick(&self.uri, &env.endpoint),
            use_default_credentials: self.use_default_credentials,
        }
    }

    /// Full three-level resolution: object-level block over provider-level
    /// default over ambient environment values.
    pub fn resolve(
        object: Option<&ClusterConfig>,
        defaults: &ClusterConfig,
        env: &EnvDefaults,
    ) -> ClusterConfig {
        object
            .cloned()
            .unwrap_or_default()
            .resolved(defaults)
            .with_env_defaults(env)
    }

    /// Check that every field needed to build a client is present.
    ///
    /// `use_default_credentials` exempts the three credential fields; the
    /// cluster uri is always required.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.use_default_credentials {
            if self.client_id.is_empty() {
                return Err(ConfigError::MissingField("client_id"));
            }
            if self.client_secret.is_empty() {
                return Err(ConfigError::MissingField("client_secret"));
            }
            if self.tenant_id.is_empty() {
                return Err(ConfigError::MissingField("tenant_id"));
            }
        }
        if self.uri.is_empty() {
            return Err(ConfigError::MissingField("uri"));
        }
        Ok(())
    }

    /// Stable digest over all five fields, in fixed order. Secrets
    /// participate so configurations that differ only by credentials never
    /// share a client.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            &self.client_id,
            &self.client_secret,
            &self.tenant_id,
            &self.uri,
        ] {
            hasher.update(field.as_bytes());
            // Field boundary marker so adjacent fields cannot alias.
            hasher.update([0u8]);
        }
        hasher.update([u8::from(self.use_default_credentials)]);
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
