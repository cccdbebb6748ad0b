//! Async operation polling
//!
//! Some management commands run out of band and hand back an operation id
//! instead of a result. [`OperationWait`] turns that into a bounded blocking
//! wait: query the operation's status on a fixed interval until it reaches a
//! target state, an unexpected state, or the overall deadline. The poller
//! knows nothing about what the operation does, only its status vocabulary.

use std::time::Duration;

use adx_core::{CommandExecutor, RowSet};
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::ProviderError;

/// States meaning "still running, keep polling".
pub const PENDING_STATES: &[&str] = &["Scheduled", "InProgress"];

/// States meaning the operation finished as requested.
pub const TARGET_STATES: &[&str] = &["Completed"];

/// Response row for a command issued with the async option.
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncOperationResponse {
    #[serde(rename = "OperationId")]
    pub operation_id: String,
}

/// One row of `.show operations <id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationDetails {
    #[serde(rename = "OperationId", default)]
    pub operation_id: String,
    #[serde(rename = "Operation", default)]
    pub operation: String,
    #[serde(rename = "NodeId", default)]
    pub node_id: String,
    #[serde(rename = "StartedOn", default)]
    pub started_on: String,
    #[serde(rename = "LastUpdatedOn", default)]
    pub last_updated_on: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
}

/// Bounded wait configuration for one long-running operation.
#[derive(Debug, Clone)]
pub struct OperationWait {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for OperationWait {
    fn default() -> Self {
        Self {
            pending: PENDING_STATES.iter().map(|s| s.to_string()).collect(),
            target: TARGET_STATES.iter().map(|s| s.to_string()).collect(),
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl OperationWait {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
            ..Self::default()
        }
    }

    /// Poll `.show operations <id>` until a terminal state or the deadline.
    ///
    /// A state outside both the pending and target sets fails immediately
    /// with the observed state embedded; exceeding the deadline fails with a
    /// timeout instead. The two stay distinct because they call for different
    /// remediation: inspect the remote operation vs. re-attempt later.
    pub async fn wait<E>(
        &self,
        executor: &E,
        database: &str,
        operation_id: &str,
    ) -> Result<OperationDetails, ProviderError>
    where
        E: CommandExecutor + ?Sized,
    {
        let started = Instant::now();
        let command = format!(".show operations {operation_id}");

        loop {
            let rows = executor.execute(database, &command).await?;
            let details = decode_details(rows, operation_id)?;

            if self.target.iter().any(|s| s == &details.state) {
                return Ok(details);
            }
            if !self.pending.iter().any(|s| s == &details.state) {
                return Err(ProviderError::UnexpectedOperationState {
                    operation_id: operation_id.to_string(),
                    state: details.state,
                    status: details.status,
                });
            }

            if started.elapsed() + self.poll_interval > self.timeout {
                return Err(ProviderError::OperationTimeout {
                    operation_id: operation_id.to_string(),
                    waited: started.elapsed(),
                });
            }
            debug!(operation_id, state = %details.state, "operation still pending");
            sleep(self.poll_interval).await;
        }
    }
}

fn decode_details(rows: RowSet, operation_id: &str) -> Result<OperationDetails, ProviderError> {
    let decoded: Vec<OperationDetails> =
        rows.into_typed().map_err(|source| ProviderError::RowDecode {
            context: format!("operation {operation_id}"),
            source,
        })?;
    decoded
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MissingOperation(operation_id.to_string()))
}

/// Execute a command that was issued with the async option and block until
/// the resulting operation completes.
pub async fn run_async_operation<E>(
    executor: &E,
    database: &str,
    command: &str,
    wait: &OperationWait,
) -> Result<OperationDetails, ProviderError>
where
    E: CommandExecutor + ?Sized,
{
    let rows = executor.execute(database, command).await?;
    let responses: Vec<AsyncOperationResponse> =
        rows.into_typed().map_err(|source| ProviderError::RowDecode {
            context: "async operation response".to_string(),
            source,
        })?;
    let operation_id = responses
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::EmptyResult {
            context: format!("async command against database {database:?}"),
        })?
        .operation_id;

    debug!(operation_id = %operation_id, "command accepted as async operation");
    wait.wait(executor, database, &operation_id).await
}
