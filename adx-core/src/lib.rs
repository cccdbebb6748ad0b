//! ADX Connector Core
//!
//! Shared primitives for managing remote objects on an Azure Data Explorer
//! cluster: composite resource identities, cluster connection configuration,
//! and the management-command execution boundary.

pub mod command;
pub mod config;
pub mod error;
pub mod identity;

pub use command::{CommandExecutor, RemoteError, RowSet};
pub use config::{ClusterConfig, EnvDefaults};
pub use error::{ConfigError, IdentityError};
pub use identity::{PolicyResourceId, ResourceId, TableMappingResourceId};
