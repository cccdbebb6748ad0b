//! Provider error taxonomy
//!
//! Everything here propagates to the resource-handler layer; none of these
//! primitives swallow errors or retry.

use std::time::Duration;

use adx_core::{ConfigError, IdentityError, RemoteError};
use thiserror::Error;

/// Errors surfaced by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Token acquisition failed before a command could be sent.
    #[error("error acquiring access token: {0}")]
    Token(String),

    /// The (entity kind, policy kind) pair is not in the registry.
    #[error("policy kind {policy_kind:?} is not supported for entity kind {entity_kind:?}")]
    UnsupportedPolicy {
        entity_kind: String,
        policy_kind: String,
    },

    /// Existence probing is only implemented for a fixed set of entity kinds.
    #[error("checking for existence of entity kind ({0}) is not supported")]
    UnsupportedEntityKind(String),

    /// The parent entity exists but the policy query returned nothing. Points
    /// at inconsistent remote state, unlike the parent going missing.
    #[error("no results returned for policy {policy_kind} for {entity_kind} {entity_name:?} (database {database:?})")]
    EmptyPolicy {
        entity_kind: String,
        policy_kind: String,
        entity_name: String,
        database: String,
    },

    /// A query expected to return rows returned none.
    #[error("no results returned for {context}")]
    EmptyResult { context: String },

    /// Rows came back but could not be decoded into the expected shape.
    #[error("error decoding rows for {context}: {source}")]
    RowDecode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A status query for a known operation id returned no rows.
    #[error("no status returned for operation {0}")]
    MissingOperation(String),

    /// The operation reached a terminal state outside the target set.
    #[error("operation {operation_id} entered unexpected state {state:?}: {status}")]
    UnexpectedOperationState {
        operation_id: String,
        state: String,
        status: String,
    },

    /// The overall wait deadline elapsed before a terminal state was seen.
    #[error("timed out after {waited:?} waiting for operation {operation_id}")]
    OperationTimeout {
        operation_id: String,
        waited: Duration,
    },
}
