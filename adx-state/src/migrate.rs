//! Persisted-state migrations
//!
//! The hosting framework stores each managed object as a flat map with the
//! persisted identity under `id`. When an object kind's schema version
//! increases, the matching upgraders run once per stored object and rewrite
//! only the identity field; every other key passes through untouched.
//!
//! Upgraders are gated on the stored schema version, never on content
//! sniffing: a V0 upgrader applied to an already-upgraded identity fails on
//! the field count instead of silently corrupting it.

use adx_core::identity::{build_resource_id, split_resource_id, TABLE_MAPPING_SEGMENT};
use adx_core::IdentityError;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Raw persisted state for one managed object.
pub type RawState = serde_json::Map<String, Value>;

/// Key under which the persisted identity is stored.
pub const STATE_ID_KEY: &str = "id";

/// Current schema version of table state.
pub const TABLE_SCHEMA_VERSION: u32 = 1;

/// Current schema version of table mapping state.
pub const TABLE_MAPPING_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// The state map carries no usable identity.
    #[error("persisted state has no string \"id\" field")]
    MissingId,

    /// The stored identity does not match the expected legacy layout.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// A single schema-version step for one object kind.
pub struct StateUpgrader {
    /// Stored schema version this upgrader migrates away from.
    pub from_version: u32,
    pub run: fn(&RawState) -> Result<RawState, MigrationError>,
}

/// Run every upgrader whose `from_version` is at or above the stored version,
/// in order. State already at `current_version` passes through untouched.
pub fn apply_upgrades(
    state: &RawState,
    stored_version: u32,
    current_version: u32,
    upgraders: &[StateUpgrader],
) -> Result<(RawState, u32), MigrationError> {
    if stored_version >= current_version {
        return Ok((state.clone(), stored_version));
    }

    let mut state = state.clone();
    for upgrader in upgraders {
        if upgrader.from_version >= stored_version {
            state = (upgrader.run)(&state)?;
        }
    }
    Ok((state, current_version))
}

/// Upgraders for the table kind.
pub fn table_upgraders() -> Vec<StateUpgrader> {
    vec![StateUpgrader {
        from_version: 0,
        run: upgrade_table_v0,
    }]
}

/// Upgraders for the table mapping kind.
pub fn table_mapping_upgraders() -> Vec<StateUpgrader> {
    vec![StateUpgrader {
        from_version: 0,
        run: upgrade_table_mapping_v0,
    }]
}

fn state_id(state: &RawState) -> Result<&str, MigrationError> {
    state
        .get(STATE_ID_KEY)
        .and_then(Value::as_str)
        .ok_or(MigrationError::MissingId)
}

fn replace_id(state: &RawState, new_id: String) -> RawState {
    let mut next = state.clone();
    next.insert(STATE_ID_KEY.to_string(), Value::String(new_id));
    next
}

/// V0 table identities carried no entity kind: `endpoint|database|name`.
fn upgrade_table_v0(state: &RawState) -> Result<RawState, MigrationError> {
    let old_id = state_id(state)?;
    let parts = split_resource_id(old_id, 3)?;
    let new_id = build_resource_id(parts[0], &[parts[1], "table", parts[2]]);
    debug!(old_id, new_id = %new_id, "rewriting table identity");
    Ok(replace_id(state, new_id))
}

/// V0 mapping identities were `endpoint|database|name|kind|mappingName`; V1
/// nests the mapping pair behind the owning table.
fn upgrade_table_mapping_v0(state: &RawState) -> Result<RawState, MigrationError> {
    let old_id = state_id(state)?;
    let parts = split_resource_id(old_id, 5)?;
    let new_id = build_resource_id(
        parts[0],
        &[
            parts[1],
            "table",
            parts[2],
            TABLE_MAPPING_SEGMENT,
            parts[3],
            parts[4],
        ],
    );
    debug!(old_id, new_id = %new_id, "rewriting table mapping identity");
    Ok(replace_id(state, new_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_with_id(id: &str) -> RawState {
        let mut state = RawState::new();
        state.insert(STATE_ID_KEY.to_string(), json!(id));
        state.insert("database_name".to_string(), json!("db1"));
        state.insert("name".to_string(), json!("events"));
        state
    }

    #[test]
    fn test_table_v0_upgrade_inserts_entity_kind() {
        let state = state_with_id("c.kusto.windows.net|db1|events");
        let (upgraded, version) =
            apply_upgrades(&state, 0, TABLE_SCHEMA_VERSION, &table_upgraders()).unwrap();

        assert_eq!(version, TABLE_SCHEMA_VERSION);
        assert_eq!(
            upgraded.get(STATE_ID_KEY),
            Some(&json!("c.kusto.windows.net|db1|table|events"))
        );
        // Only the identity changes.
        assert_eq!(upgraded.get("database_name"), Some(&json!("db1")));
        assert_eq!(upgraded.get("name"), Some(&json!("events")));
    }

    #[test]
    fn test_table_mapping_v0_upgrade_nests_mapping_pair() {
        let state = state_with_id("c.kusto.windows.net|db1|events|Json|events_mapping");
        let (upgraded, _) = apply_upgrades(
            &state,
            0,
            TABLE_MAPPING_SCHEMA_VERSION,
            &table_mapping_upgraders(),
        )
        .unwrap();

        assert_eq!(
            upgraded.get(STATE_ID_KEY),
            Some(&json!(
                "c.kusto.windows.net|db1|table|events|tablemapping|Json|events_mapping"
            ))
        );
    }

    #[test]
    fn test_upgrade_is_a_noop_at_current_version() {
        let state = state_with_id("c.kusto.windows.net|db1|table|events");
        let (upgraded, version) =
            apply_upgrades(&state, TABLE_SCHEMA_VERSION, TABLE_SCHEMA_VERSION, &table_upgraders())
                .unwrap();

        assert_eq!(version, TABLE_SCHEMA_VERSION);
        assert_eq!(upgraded, state);
    }

    #[test]
    fn test_rerunning_upgrader_on_new_identity_fails_loudly() {
        let state = state_with_id("c.kusto.windows.net|db1|events");
        let (upgraded, _) =
            apply_upgrades(&state, 0, TABLE_SCHEMA_VERSION, &table_upgraders()).unwrap();

        // Applying the V0 step again must error on the field count, never
        // rewrite a valid V1 identity.
        let err = apply_upgrades(&upgraded, 0, TABLE_SCHEMA_VERSION, &table_upgraders())
            .unwrap_err();
        assert!(matches!(err, MigrationError::Identity(_)));
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let mut state = RawState::new();
        state.insert("name".to_string(), json!("events"));

        let err = apply_upgrades(&state, 0, TABLE_SCHEMA_VERSION, &table_upgraders()).unwrap_err();
        assert!(matches!(err, MigrationError::MissingId));
    }

    #[test]
    fn test_non_string_id_is_an_error() {
        let mut state = RawState::new();
        state.insert(STATE_ID_KEY.to_string(), json!(42));

        let err = apply_upgrades(&state, 0, TABLE_SCHEMA_VERSION, &table_upgraders()).unwrap_err();
        assert!(matches!(err, MigrationError::MissingId));
    }
}
