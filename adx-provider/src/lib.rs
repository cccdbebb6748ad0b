//! ADX Connector Provider
//!
//! Remote-side building blocks for the connector: the Kusto management
//! client, the connection cache, policy lifecycle dispatch, entity helpers
//! and async operation polling.

pub mod cache;
pub mod client;
pub mod entity;
pub mod error;
pub mod operation;
pub mod policy;

pub use cache::{ClientFactory, ConnectionCache, KustoClientFactory, KustoConnectionCache};
pub use client::{KustoClient, TokenProvider};
pub use error::ProviderError;
pub use operation::{run_async_operation, AsyncOperationResponse, OperationDetails, OperationWait};
pub use policy::{PolicyDispatcher, PolicyRead, PolicyRecord};

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    use adx_core::{CommandExecutor, RemoteError, RowSet};
    use async_trait::async_trait;

    /// Executor that replays scripted responses and records every command it
    /// was asked to run. Once the script runs down to its last entry, that
    /// entry repeats forever.
    pub struct ScriptedExecutor {
        endpoint: String,
        responses: Mutex<Vec<Result<RowSet, RemoteError>>>,
        commands: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedExecutor {
        pub fn new(responses: Vec<Result<RowSet, RemoteError>>) -> Self {
            Self {
                endpoint: "https://test-cluster.kusto.windows.net".to_string(),
                responses: Mutex::new(responses),
                commands: Mutex::new(Vec::new()),
            }
        }

        pub fn command_count(&self) -> usize {
            self.commands.lock().unwrap().len()
        }

        pub fn commands(&self) -> Vec<(String, String)> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        fn endpoint(&self) -> &str {
            &self.endpoint
        }

        async fn execute(&self, database: &str, command: &str) -> Result<RowSet, RemoteError> {
            self.commands
                .lock()
                .unwrap()
                .push((database.to_string(), command.to_string()));

            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Ok(RowSet::default()))
            }
        }
    }

    /// Single-row result with string cells, keyed by column name.
    pub fn single_row(pairs: &[(&str, &str)]) -> RowSet {
        RowSet::new(
            pairs.iter().map(|(column, _)| column.to_string()).collect(),
            vec![pairs
                .iter()
                .map(|(_, value)| serde_json::Value::String(value.to_string()))
                .collect()],
        )
    }
}
