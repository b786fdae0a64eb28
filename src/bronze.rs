use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::error::{PipelineError, Result};

pub const BRONZE_TABLE: &str = "player_stats_bronze";

/// Flatten nested objects into dotted column names, preserving key order
/// (`{"player": {"playerId": 7}}` becomes `player.playerId`). Arrays and
/// any other non-object leaves are kept as-is and serialized to JSON text
/// at insert time.
pub fn flatten_record(record: &Value) -> Result<Vec<(String, Value)>> {
    let Value::Object(_) = record else {
        return Err(PipelineError::Transport(
            "stats payload row is not an object".to_string(),
        ));
    };
    let mut out = Vec::new();
    flatten_into(None, record, &mut out);
    Ok(out)
}

fn flatten_into(prefix: Option<&str>, value: &Value, out: &mut Vec<(String, Value)>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match child {
            Value::Object(_) => flatten_into(Some(&name), child, out),
            other => out.push((name, other.clone())),
        }
    }
}

/// Fully replace the bronze table with the flattened payload. The column
/// set is dynamic by contract: it is the union of flattened keys across
/// all rows, in first-seen order. Drop, create and insert happen inside
/// one transaction, so a failed run leaves the prior table untouched.
pub fn replace_raw_table(conn: &mut Connection, payload: &[Value]) -> Result<usize> {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows: Vec<HashMap<String, SqlValue>> = Vec::with_capacity(payload.len());

    for record in payload {
        let flat = flatten_record(record)?;
        let mut row = HashMap::with_capacity(flat.len());
        for (name, value) in flat {
            if seen.insert(name.clone()) {
                columns.push(name.clone());
            }
            row.insert(name, to_sql_value(&value));
        }
        rows.push(row);
    }

    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {BRONZE_TABLE};"))?;

    if columns.is_empty() {
        // Empty upstream collection: keep a one-column shell so downstream
        // reads fail with a schema error instead of a missing table.
        tx.execute_batch(&format!("CREATE TABLE {BRONZE_TABLE} (\"_empty\");"))?;
        tx.commit()?;
        return Ok(0);
    }

    let quoted = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>();
    tx.execute_batch(&format!(
        "CREATE TABLE {BRONZE_TABLE} ({});",
        quoted.join(", ")
    ))?;

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!(
        "INSERT INTO {BRONZE_TABLE} ({}) VALUES ({placeholders})",
        quoted.join(", ")
    );

    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for row in &rows {
            let values = columns
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(SqlValue::Null))
                .collect::<Vec<_>>();
            stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null)
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Bronze is the one place SQL identifiers come from upstream data, so
/// they are quoted rather than templated into the statement verbatim.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
