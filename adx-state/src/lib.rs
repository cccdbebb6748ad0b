//! ADX Connector State
//!
//! Version-gated rewriting of persisted resource state when the identity
//! format changes, so objects provisioned under an older scheme keep
//! resolving to the same remote entities.

pub mod migrate;

pub use migrate::{
    apply_upgrades, table_mapping_upgraders, table_upgraders, MigrationError, RawState,
    StateUpgrader, STATE_ID_KEY, TABLE_MAPPING_SCHEMA_VERSION, TABLE_SCHEMA_VERSION,
};
