//! Composite resource identities
//!
//! A persisted identity is the cluster endpoint joined with a kind-specific
//! sequence of fields by a fixed delimiter. The codec itself is
//! arity-agnostic and only splits and joins; each object kind knows its own
//! field count and offsets.

use crate::error::IdentityError;

/// Field delimiter used in persisted identity strings. Field values (entity
/// names in particular) must not contain this character; the codec does not
/// escape it.
pub const ID_DELIMITER: char = '|';

/// Literal segment marking the nested policy pair in a policy identity.
pub const POLICY_SEGMENT: &str = "policy";

/// Literal segment marking the nested mapping pair in a table mapping
/// identity.
pub const TABLE_MAPPING_SEGMENT: &str = "tablemapping";

/// Strip any `scheme://` prefix from a cluster endpoint.
pub fn sanitize_endpoint(endpoint: &str) -> String {
    endpoint.replacen("https://", "", 1).replacen("http://", "", 1)
}

/// Join the sanitized endpoint and the given fields into a persisted
/// identity string.
pub fn build_resource_id(endpoint: &str, fields: &[&str]) -> String {
    let endpoint = sanitize_endpoint(endpoint);
    let mut parts = Vec::with_capacity(fields.len() + 1);
    parts.push(endpoint.as_str());
    parts.extend_from_slice(fields);
    parts.join("|")
}

/// Split a persisted identity, failing unless it has exactly `expected`
/// fields.
pub fn split_resource_id(input: &str, expected: usize) -> Result<Vec<&str>, IdentityError> {
    let parts: Vec<&str> = input.split(ID_DELIMITER).collect();
    if parts.len() != expected {
        return Err(IdentityError::UnexpectedFormat {
            input: input.to_string(),
            expected,
            found: parts.len(),
        });
    }
    Ok(parts)
}

/// Positions of the entity quadruple inside a kind's identity layout.
#[derive(Debug, Clone, Copy)]
pub struct FieldOffsets {
    pub endpoint: usize,
    pub database: usize,
    pub entity_kind: usize,
    pub name: usize,
}

/// Identity of a primary entity (table, materialized view, function):
/// `endpoint|database|kind|name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub endpoint_uri: String,
    pub database_name: String,
    pub entity_kind: String,
    pub name: String,
}

impl ResourceId {
    /// Field count of an entity identity.
    pub const PARTS: usize = 4;

    pub fn new(
        endpoint_uri: impl Into<String>,
        database_name: impl Into<String>,
        entity_kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_uri: endpoint_uri.into(),
            database_name: database_name.into(),
            entity_kind: entity_kind.into(),
            name: name.into(),
        }
    }

    /// Parse an identity with `expected` fields, picking the entity quadruple
    /// out of kind-specific offsets.
    pub fn parse_with_offsets(
        input: &str,
        expected: usize,
        offsets: FieldOffsets,
    ) -> Result<Self, IdentityError> {
        let parts = split_resource_id(input, expected)?;
        Ok(Self::new(
            parts[offsets.endpoint],
            parts[offsets.database],
            parts[offsets.entity_kind],
            parts[offsets.name],
        ))
    }

    /// Parse the plain entity layout `endpoint|database|kind|name`.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        Self::parse_with_offsets(
            input,
            Self::PARTS,
            FieldOffsets {
                endpoint: 0,
                database: 1,
                entity_kind: 2,
                name: 3,
            },
        )
    }

    /// Rebuild the persisted identity string for this entity.
    pub fn to_id_string(&self) -> String {
        build_resource_id(
            &self.endpoint_uri,
            &[&self.database_name, &self.entity_kind, &self.name],
        )
    }
}

/// Identity of a policy attached to a primary entity:
/// `endpoint|database|kind|name|policy|policyKind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResourceId {
    pub policy_kind: String,
    pub entity: ResourceId,
}

impl PolicyResourceId {
    /// Field count of a policy identity.
    pub const PARTS: usize = 6;

    /// Parse the nested policy layout. The literal segment at offset 4 is
    /// not inspected; only the field count is enforced.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let parts = split_resource_id(input, Self::PARTS)?;
        Ok(Self {
            policy_kind: parts[5].to_string(),
            entity: ResourceId::new(parts[0], parts[1], parts[2], parts[3]),
        })
    }

    pub fn to_id_string(&self) -> String {
        build_resource_id(
            &self.entity.endpoint_uri,
            &[
                &self.entity.database_name,
                &self.entity.entity_kind,
                &self.entity.name,
                POLICY_SEGMENT,
                &self.policy_kind,
            ],
        )
    }
}

/// Identity of an ingestion mapping:
/// `endpoint|database|table|tableName|tablemapping|mappingKind|mappingName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMappingResourceId {
    pub mapping_kind: String,
    pub mapping_name: String,
    pub entity: ResourceId,
}

impl TableMappingResourceId {
    /// Field count of a table mapping identity.
    pub const PARTS: usize = 7;

    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let parts = split_resource_id(input, Self::PARTS)?;
        Ok(Self {
            mapping_kind: parts[5].to_string(),
            mapping_name: parts[6].to_string(),
            entity: ResourceId::new(parts[0], parts[1], parts[2], parts[3]),
        })
    }

    pub fn to_id_string(&self) -> String {
        build_resource_id(
            &self.entity.endpoint_uri,
            &[
                &self.entity.database_name,
                &self.entity.entity_kind,
                &self.entity.name,
                TABLE_MAPPING_SEGMENT,
                &self.mapping_kind,
                &self.mapping_name,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_strips_scheme() {
        let id = build_resource_id("https://mycluster.westeurope.kusto.windows.net", &["db1", "table", "t1"]);
        assert_eq!(id, "mycluster.westeurope.kusto.windows.net|db1|table|t1");

        let id = build_resource_id("http://localhost:8080", &["db1", "table", "t1"]);
        assert_eq!(id, "localhost:8080|db1|table|t1");
    }

    #[test]
    fn test_build_leaves_bare_endpoint_alone() {
        let id = build_resource_id("mycluster.kusto.windows.net", &["db1", "function", "f1"]);
        assert_eq!(id, "mycluster.kusto.windows.net|db1|function|f1");
    }

    #[test]
    fn test_entity_round_trip() {
        let id = build_resource_id("https://c.kusto.windows.net", &["db1", "table", "events"]);
        let parsed = ResourceId::parse(&id).unwrap();
        assert_eq!(
            parsed,
            ResourceId::new("c.kusto.windows.net", "db1", "table", "events")
        );
        assert_eq!(parsed.to_id_string(), id);
    }

    #[test]
    fn test_policy_round_trip() {
        let id = build_resource_id(
            "https://c.kusto.windows.net",
            &["db1", "table", "events", POLICY_SEGMENT, "caching"],
        );
        let parsed = PolicyResourceId::parse(&id).unwrap();
        assert_eq!(parsed.policy_kind, "caching");
        assert_eq!(parsed.entity.database_name, "db1");
        assert_eq!(parsed.entity.entity_kind, "table");
        assert_eq!(parsed.entity.name, "events");
        assert_eq!(parsed.to_id_string(), id);
    }

    #[test]
    fn test_table_mapping_round_trip() {
        let id = build_resource_id(
            "https://c.kusto.windows.net",
            &["db1", "table", "events", TABLE_MAPPING_SEGMENT, "Json", "events_mapping"],
        );
        let parsed = TableMappingResourceId::parse(&id).unwrap();
        assert_eq!(parsed.mapping_kind, "Json");
        assert_eq!(parsed.mapping_name, "events_mapping");
        assert_eq!(parsed.entity.name, "events");
        assert_eq!(parsed.to_id_string(), id);
    }

    #[test]
    fn test_parse_rejects_too_few_fields() {
        let err = ResourceId::parse("c.kusto.windows.net|db1|events").unwrap_err();
        assert_eq!(
            err,
            IdentityError::UnexpectedFormat {
                input: "c.kusto.windows.net|db1|events".to_string(),
                expected: 4,
                found: 3,
            }
        );
    }

    #[test]
    fn test_parse_rejects_too_many_fields() {
        let input = "c|db1|table|events|policy|caching";
        let err = ResourceId::parse(input).unwrap_err();
        assert_eq!(
            err,
            IdentityError::UnexpectedFormat {
                input: input.to_string(),
                expected: 4,
                found: 6,
            }
        );

        // The same string is a well-formed policy identity.
        assert!(PolicyResourceId::parse(input).is_ok());
    }

    #[test]
    fn test_delimiter_in_field_corrupts_parse() {
        // Known constraint: names carrying the delimiter shift every later
        // field. The codec surfaces this as an arity failure, never a
        // partially-populated identity.
        let id = build_resource_id("https://c", &["db1", "table", "bad|name"]);
        assert!(ResourceId::parse(&id).is_err());
    }

    #[test]
    fn test_parse_with_offsets() {
        let parsed = ResourceId::parse_with_offsets(
            "c|db1|table|events|policy|retention",
            6,
            FieldOffsets {
                endpoint: 0,
                database: 1,
                entity_kind: 2,
                name: 3,
            },
        )
        .unwrap();
        assert_eq!(parsed.name, "events");
        assert_eq!(parsed.entity_kind, "table");
    }
}
