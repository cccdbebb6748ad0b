//! Kusto management-endpoint client
//!
//! Speaks the v1 REST management API: one POST per command, bearer-token
//! auth, primary result table decoded into a [`RowSet`]. Construction
//! performs no I/O; tokens are fetched lazily on first use and cached by
//! their provider until shortly before expiry.

use std::time::{Duration, Instant};

use adx_core::{ClusterConfig, CommandExecutor, RemoteError, RowSet};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ProviderError;

const AAD_LOGIN_BASE: &str = "https://login.microsoftonline.com";
const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Abstraction over AAD token acquisition — enables test injection.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, ProviderError>;
}

/// Client-credentials flow for a service principal.
pub struct ServicePrincipalTokenProvider {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    scope: String,
    login_base: String,
    http: reqwest::Client,
    cache: Mutex<Option<(String, Instant)>>,
}

impl ServicePrincipalTokenProvider {
    pub fn new(config: &ClusterConfig) -> Self {
        Self::with_login_base(config, AAD_LOGIN_BASE)
    }

    pub(crate) fn with_login_base(config: &ClusterConfig, login_base: impl Into<String>) -> Self {
        Self {
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: format!("{}/.default", config.uri.trim_end_matches('/')),
            login_base: login_base.into(),
            http: reqwest::Client::new(),
            cache: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipalTokenProvider {
    async fn token(&self) -> Result<String, ProviderError> {
        {
            let guard = self.cache.lock().await;
            if let Some((token, expiry)) = guard.as_ref()
                && Instant::now() < *expiry
            {
                return Ok(token.clone());
            }
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.login_base, self.tenant_id);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let resp: serde_json::Value = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Token(format!("token request: {e}")))?
            .json()
            .await
            .map_err(|e| ProviderError::Token(format!("token decode: {e}")))?;

        let token = resp["access_token"]
            .as_str()
            .ok_or_else(|| ProviderError::Token("no access_token in response".to_string()))?
            .to_string();
        let expires_in = resp["expires_in"].as_u64().unwrap_or(3600);
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));

        *self.cache.lock().await = Some((token.clone(), expiry));
        Ok(token)
    }
}

/// IMDS-based managed identity flow, selected when the configuration opts
/// into ambient credentials.
pub struct ManagedIdentityTokenProvider {
    resource: String,
    http: reqwest::Client,
    cache: Mutex<Option<(String, Instant)>>,
}

impl ManagedIdentityTokenProvider {
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            resource: config.uri.clone(),
            http: reqwest::Client::new(),
            cache: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentityTokenProvider {
    async fn token(&self) -> Result<String, ProviderError> {
        {
            let guard = self.cache.lock().await;
            if let Some((token, expiry)) = guard.as_ref()
                && Instant::now() < *expiry
            {
                return Ok(token.clone());
            }
        }

        let resp: serde_json::Value = self
            .http
            .get(IMDS_TOKEN_ENDPOINT)
            .header("Metadata", "true")
            .query(&[
                ("api-version", "2018-02-01"),
                ("resource", self.resource.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Token(format!("IMDS token request: {e}")))?
            .json()
            .await
            .map_err(|e| ProviderError::Token(format!("IMDS token decode: {e}")))?;

        let token = resp["access_token"]
            .as_str()
            .ok_or_else(|| ProviderError::Token("no access_token in IMDS response".to_string()))?
            .to_string();
        // IMDS reports expires_in as a string.
        let expires_in = match &resp["expires_in"] {
            serde_json::Value::String(s) => s.parse().unwrap_or(3600),
            other => other.as_u64().unwrap_or(3600),
        };
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));

        *self.cache.lock().await = Some((token.clone(), expiry));
        Ok(token)
    }
}

/// Handle to one cluster's management endpoint.
pub struct KustoClient {
    endpoint: String,
    http: reqwest::Client,
    tokens: Box<dyn TokenProvider>,
}

impl KustoClient {
    /// Build a client for a validated configuration.
    pub fn connect(config: &ClusterConfig) -> Self {
        let tokens: Box<dyn TokenProvider> = if config.use_default_credentials {
            Box::new(ManagedIdentityTokenProvider::new(config))
        } else {
            Box::new(ServicePrincipalTokenProvider::new(config))
        };
        Self::with_token_provider(&config.uri, tokens)
    }

    pub(crate) fn with_token_provider(endpoint: &str, tokens: Box<dyn TokenProvider>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            tokens,
        }
    }

    async fn mgmt(&self, database: &str, command: &str) -> Result<RowSet, RemoteError> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| RemoteError::new(database, command, e.to_string()))?;

        let url = format!("{}/v1/rest/mgmt", self.endpoint);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "db": database, "csl": command }))
            .send()
            .await
            .map_err(|e| RemoteError::new(database, command, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::new(
                database,
                command,
                format!("management endpoint returned {status}: {body}"),
            ));
        }

        let decoded: MgmtResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::new(database, command, format!("response decode: {e}")))?;

        Ok(decoded.into_row_set())
    }
}

#[async_trait]
impl CommandExecutor for KustoClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute(&self, database: &str, command: &str) -> Result<RowSet, RemoteError> {
        debug!(database, "executing management command");
        self.mgmt(database, command).await
    }
}

#[derive(Debug, Deserialize)]
struct MgmtResponse {
    #[serde(rename = "Tables", default)]
    tables: Vec<MgmtTable>,
}

#[derive(Debug, Deserialize)]
struct MgmtTable {
    #[serde(rename = "Columns", default)]
    columns: Vec<MgmtColumn>,
    #[serde(rename = "Rows", default)]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct MgmtColumn {
    #[serde(rename = "ColumnName")]
    column_name: String,
}

impl MgmtResponse {
    /// The first table in the response is the primary result.
    fn into_row_set(self) -> RowSet {
        match self.tables.into_iter().next() {
            Some(table) => RowSet::new(
                table.columns.into_iter().map(|c| c.column_name).collect(),
                table.rows,
            ),
            None => RowSet::default(),
        }
    }
}
