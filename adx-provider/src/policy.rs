//! Policy lifecycle dispatcher
//!
//! Create/read/delete for policy sub-objects addressed by an
//! (entity kind, policy kind) pair. The command text itself is assembled by
//! callers and opaque here; this module owns identity handling, the parent
//! existence gate, and the registry of known pairs.

use std::sync::Arc;

use adx_core::identity::{build_resource_id, POLICY_SEGMENT};
use adx_core::{CommandExecutor, PolicyResourceId};
use serde::Deserialize;
use tracing::debug;

use crate::entity::{entity_exists, escape_entity_name};
use crate::error::ProviderError;

/// Policy kinds accepted per entity kind. Kinds stay open strings by design;
/// the registry exists so an unknown pair fails here instead of deep inside
/// command formatting.
const SUPPORTED_POLICIES: &[(&str, &[&str])] = &[
    (
        "table",
        &[
            "caching",
            "ingestion_batching",
            "ingestiontime",
            "partitioning",
            "restricted_view_access",
            "retention",
            "row_level_security",
            "streaming_ingestion",
            "update",
        ],
    ),
    (
        "materialized-view",
        &["caching", "retention", "row_level_security"],
    ),
];

fn ensure_supported(entity_kind: &str, policy_kind: &str) -> Result<(), ProviderError> {
    let known = SUPPORTED_POLICIES
        .iter()
        .find(|(kind, _)| *kind == entity_kind)
        .map(|(_, policies)| policies.contains(&policy_kind))
        .unwrap_or(false);
    if known {
        Ok(())
    } else {
        Err(ProviderError::UnsupportedPolicy {
            entity_kind: entity_kind.to_string(),
            policy_kind: policy_kind.to_string(),
        })
    }
}

/// One row of a `.show ... policy ...` result.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRecord {
    #[serde(rename = "PolicyName", default)]
    pub policy_name: String,
    #[serde(rename = "EntityName", default)]
    pub entity_name: String,
    #[serde(rename = "Policy", default)]
    pub policy: String,
    #[serde(rename = "ChildEntities", default)]
    pub child_entities: String,
    #[serde(rename = "EntityType", default)]
    pub entity_type: String,
}

/// Outcome of reading a policy.
#[derive(Debug, Clone)]
pub enum PolicyRead {
    /// The parent entity no longer exists: the managed policy is gone, and
    /// the caller should clear its persisted identity rather than fail.
    Deleted,
    /// The policy exists; records carry the remote policy document.
    Active {
        id: PolicyResourceId,
        records: Vec<PolicyRecord>,
    },
}

/// Uniform create/read/delete for policy sub-objects.
///
/// A policy moves Absent → Created → Active → Deleted; updates are idempotent
/// re-creation, so create doubles as the update path.
pub struct PolicyDispatcher<E: CommandExecutor + ?Sized> {
    executor: Arc<E>,
}

impl<E: CommandExecutor + ?Sized> PolicyDispatcher<E> {
    pub fn new(executor: Arc<E>) -> Self {
        Self { executor }
    }

    /// Execute the caller-assembled create statement and mint the persisted
    /// identity for the new policy.
    pub async fn create(
        &self,
        entity_kind: &str,
        policy_kind: &str,
        database_name: &str,
        entity_name: &str,
        create_statement: &str,
    ) -> Result<String, ProviderError> {
        ensure_supported(entity_kind, policy_kind)?;
        self.executor
            .execute(database_name, create_statement)
            .await?;

        let id = build_resource_id(
            self.executor.endpoint(),
            &[
                database_name,
                entity_kind,
                entity_name,
                POLICY_SEGMENT,
                policy_kind,
            ],
        );
        debug!(id = %id, "created policy");
        Ok(id)
    }

    /// Parse the persisted identity and fetch the policy document.
    ///
    /// The parent entity is probed first: if it is gone, the policy query
    /// (which would fail ambiguously) is never issued and the caller gets
    /// [`PolicyRead::Deleted`]. A present parent with zero policy rows is an
    /// error, since it points at inconsistent remote state.
    pub async fn read(
        &self,
        persisted_id: &str,
        entity_kind: &str,
        policy_kind: &str,
    ) -> Result<PolicyRead, ProviderError> {
        ensure_supported(entity_kind, policy_kind)?;
        let id = PolicyResourceId::parse(persisted_id)?;

        if !entity_exists(
            self.executor.as_ref(),
            &id.entity.database_name,
            entity_kind,
            &id.entity.name,
        )
        .await?
        {
            debug!(persisted_id, "parent entity is gone; treating policy as deleted");
            return Ok(PolicyRead::Deleted);
        }

        let show = format!(
            ".show {entity_kind} {} policy {policy_kind}",
            id.entity.name
        );
        let rows = self.executor.execute(&id.entity.database_name, &show).await?;
        let records: Vec<PolicyRecord> =
            rows.into_typed().map_err(|source| ProviderError::RowDecode {
                context: format!("{entity_kind} {} policy {policy_kind}", id.entity.name),
                source,
            })?;

        if records.is_empty() {
            return Err(ProviderError::EmptyPolicy {
                entity_kind: entity_kind.to_string(),
                policy_kind: policy_kind.to_string(),
                entity_name: id.entity.name.clone(),
                database: id.entity.database_name.clone(),
            });
        }
        Ok(PolicyRead::Active { id, records })
    }

    /// Drop the policy. `follower_database` switches to the command shape
    /// required when the policy lives on a follower database.
    pub async fn delete(
        &self,
        persisted_id: &str,
        entity_kind: &str,
        policy_kind: &str,
        follower_database: bool,
    ) -> Result<(), ProviderError> {
        ensure_supported(entity_kind, policy_kind)?;
        let id = PolicyResourceId::parse(persisted_id)?;

        let statement = if follower_database {
            format!(
                ".delete follower database {} {entity_kind} {} policy {policy_kind}",
                escape_entity_name(&id.entity.database_name),
                id.entity.name
            )
        } else {
            format!(
                ".delete {entity_kind} {} policy {policy_kind}",
                id.entity.name
            )
        };
        self.executor
            .execute(&id.entity.database_name, &statement)
            .await?;
        Ok(())
    }
}
