//! Entity-level helpers: existence probes, name escaping, timespan literals.

use adx_core::CommandExecutor;
use serde::Deserialize;

use crate::error::ProviderError;

/// Row shape for single-value `print Result=...` round trips.
#[derive(Debug, Deserialize)]
struct SimpleQueryRow {
    #[serde(rename = "Result")]
    result: String,
}

/// Escape an entity name for use inside a management command. Names with
/// dashes must be bracket-quoted.
pub fn escape_entity_name(name: &str) -> String {
    if name.contains('-') && !name.starts_with('[') {
        format!("['{name}']")
    } else {
        name.to_string()
    }
}

/// Inverse of [`escape_entity_name`], used when comparing values the cluster
/// reports back.
pub fn unescape_entity_name(name: &str) -> String {
    name.strip_prefix("['")
        .and_then(|n| n.strip_suffix("']"))
        .unwrap_or(name)
        .to_string()
}

/// True when the statement returns at least one row.
async fn has_statement_results<E>(
    executor: &E,
    database: &str,
    statement: &str,
) -> Result<bool, ProviderError>
where
    E: CommandExecutor + ?Sized,
{
    let rows = executor.execute(database, statement).await?;
    Ok(!rows.is_empty())
}

/// Check whether a primary entity still exists on the cluster.
///
/// Returning `false` is a valid outcome, not an error: the caller should
/// treat its managed object as already gone.
pub async fn entity_exists<E>(
    executor: &E,
    database: &str,
    entity_kind: &str,
    entity_name: &str,
) -> Result<bool, ProviderError>
where
    E: CommandExecutor + ?Sized,
{
    let statement = match entity_kind {
        "table" => format!(".show tables ({entity_name}) details"),
        "materialized-view" => format!(".show materialized-views ({entity_name}) details"),
        "function" => format!(".show functions | where Name == '{entity_name}'"),
        other => return Err(ProviderError::UnsupportedEntityKind(other.to_string())),
    };
    has_statement_results(executor, database, &statement).await
}

/// Normalize a timespan literal to `expected_unit` (d, h, m or s) using the
/// cluster's own timespan arithmetic, so `72h` and `3d` compare equal.
pub async fn to_timespan_literal<E>(
    executor: &E,
    database: &str,
    input: &str,
    expected_unit: &str,
) -> Result<String, ProviderError>
where
    E: CommandExecutor + ?Sized,
{
    if input.is_empty() || expected_unit.is_empty() {
        return Ok(input.to_string());
    }

    let query = format!("print Result=tostring(toint(totimespan('{input}')/1{expected_unit}))");
    let rows = executor.execute(database, &query).await?;
    let decoded: Vec<SimpleQueryRow> =
        rows.into_typed().map_err(|source| ProviderError::RowDecode {
            context: format!("timespan literal {input:?}"),
            source,
        })?;

    match decoded.into_iter().next() {
        Some(row) => Ok(format!("{}{}", row.result, expected_unit)),
        None => Err(ProviderError::EmptyResult {
            context: format!("timespan literal {input:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{single_row, ScriptedExecutor};
    use adx_core::RowSet;

    #[test]
    fn test_escape_entity_name() {
        assert_eq!(escape_entity_name("events"), "events");
        assert_eq!(escape_entity_name("my-table"), "['my-table']");
        assert_eq!(escape_entity_name("['my-table']"), "['my-table']");
    }

    #[test]
    fn test_unescape_entity_name() {
        assert_eq!(unescape_entity_name("name"), "name");
        assert_eq!(unescape_entity_name("['name']"), "name");
    }

    #[tokio::test]
    async fn test_entity_exists_true_on_any_row() {
        let executor = ScriptedExecutor::new(vec![Ok(single_row(&[("TableName", "events")]))]);
        assert!(entity_exists(&executor, "db1", "table", "events").await.unwrap());

        let commands = executor.commands();
        assert_eq!(commands[0].1, ".show tables (events) details");
    }

    #[tokio::test]
    async fn test_entity_exists_false_on_no_rows() {
        let executor = ScriptedExecutor::new(vec![Ok(RowSet::default())]);
        assert!(!entity_exists(&executor, "db1", "materialized-view", "mv1")
            .await
            .unwrap());

        let commands = executor.commands();
        assert_eq!(commands[0].1, ".show materialized-views (mv1) details");
    }

    #[tokio::test]
    async fn test_entity_exists_unknown_kind_fails_fast() {
        let executor = ScriptedExecutor::new(vec![]);
        let err = entity_exists(&executor, "db1", "external-table", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedEntityKind(_)));
        assert_eq!(executor.command_count(), 0);
    }

    #[tokio::test]
    async fn test_to_timespan_literal_converts_unit() {
        let executor = ScriptedExecutor::new(vec![Ok(single_row(&[("Result", "72")]))]);
        let literal = to_timespan_literal(&executor, "db1", "3d", "h").await.unwrap();
        assert_eq!(literal, "72h");
    }

    #[tokio::test]
    async fn test_to_timespan_literal_passes_empty_through() {
        let executor = ScriptedExecutor::new(vec![]);
        assert_eq!(to_timespan_literal(&executor, "db1", "", "h").await.unwrap(), "");
        assert_eq!(executor.command_count(), 0);
    }
}
