use chrono::DateTime;
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;

use crate::bronze::BRONZE_TABLE;
use crate::error::{PipelineError, Result};

pub const SILVER_TABLE: &str = "player_stats";

/// Normalized target column and the exact dotted bronze column it is
/// projected from. This is the rename/coercion boundary that decouples
/// every downstream stage from the upstream API shape.
const COLUMN_MAP: &[(&str, &str)] = &[
    ("player_id", "player.playerId"),
    ("player_name", "player.name"),
    ("birthday", "player.birthdayTimestamp"),
    ("age", "player.age"),
    ("position", "player.position"),
    ("nationality", "player.nationality"),
    ("team_id", "team.teamId"),
    ("team_name", "team.name"),
    ("season_id", "seasonId"),
    ("unique_tournament_id", "uniqueTournamentId"),
    ("appearances", "stats.appearances"),
    ("goals", "stats.goals"),
    ("assists", "stats.assists"),
    ("minutes_played", "stats.minutes_played"),
    ("yellow_cards", "stats.yellow_cards"),
    ("red_cards", "stats.red_cards"),
    ("shots_on_target", "stats.shots_on_target"),
    ("shots_off_target", "stats.shots_off_target"),
    ("passes_total", "stats.total_passes"),
    ("passes_accurate", "stats.accurate_passes"),
    ("passes_accuracy_percent", "stats.accurate_passes_percentage"),
    ("tackles", "stats.tackles"),
    ("interceptions", "stats.interceptions"),
    ("fouls", "stats.fouls"),
    ("possession_lost", "stats.possession_lost"),
];

const CREATE_SILVER_SQL: &str = "
    CREATE TABLE player_stats (
        player_id INTEGER,
        player_name TEXT,
        birthday TEXT,
        age INTEGER,
        position TEXT,
        nationality TEXT,
        team_id INTEGER,
        team_name TEXT,
        season_id INTEGER,
        unique_tournament_id INTEGER,
        appearances REAL,
        goals REAL,
        assists REAL,
        minutes_played REAL,
        yellow_cards REAL,
        red_cards REAL,
        shots_on_target REAL,
        shots_off_target REAL,
        passes_total REAL,
        passes_accurate REAL,
        passes_accuracy_percent REAL,
        tackles REAL,
        interceptions REAL,
        fouls REAL,
        possession_lost REAL
    );
";

/// Project every bronze row onto the fixed normalized schema (1:1, no
/// filtering, no dedup yet) and fully replace the silver table. A bronze
/// column missing from the mapping's source side is fatal: defaulting it
/// would silently propagate a broken upstream schema downstream.
pub fn normalize_bronze(conn: &mut Connection) -> Result<usize> {
    let rows = read_projected_bronze(conn)?;

    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {SILVER_TABLE};"))?;
    tx.execute_batch(CREATE_SILVER_SQL)?;
    {
        let placeholders = (1..=COLUMN_MAP.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {SILVER_TABLE} VALUES ({placeholders})"
        ))?;
        for row in &rows {
            stmt.execute(rusqlite::params_from_iter(row.iter()))?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

fn read_projected_bronze(conn: &Connection) -> Result<Vec<Vec<SqlValue>>> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {BRONZE_TABLE}"))?;
    let names = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>();

    let mut indices = Vec::with_capacity(COLUMN_MAP.len());
    for (_, source) in COLUMN_MAP {
        let idx = names
            .iter()
            .position(|name| name == source)
            .ok_or_else(|| PipelineError::missing_column(source))?;
        indices.push(idx);
    }

    let mut out = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut projected = Vec::with_capacity(indices.len());
        for (map_idx, col_idx) in indices.iter().enumerate() {
            let value = row.get::<_, SqlValue>(*col_idx)?;
            let (target, _) = COLUMN_MAP[map_idx];
            projected.push(if target == "birthday" {
                coerce_birthday(value)
            } else {
                value
            });
        }
        out.push(projected);
    }
    Ok(out)
}

/// The upstream birthday field is a unix timestamp in seconds; coerce it
/// to an ISO date. Strings are passed through (already rendered dates),
/// nulls stay null.
fn coerce_birthday(value: SqlValue) -> SqlValue {
    let secs = match &value {
        SqlValue::Integer(secs) => *secs,
        SqlValue::Real(secs) if secs.is_finite() => *secs as i64,
        SqlValue::Real(_) => return SqlValue::Null,
        _ => return value,
    };
    match DateTime::from_timestamp(secs, 0) {
        Some(ts) => SqlValue::Text(ts.date_naive().to_string()),
        None => SqlValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value as SqlValue;

    use super::coerce_birthday;

    #[test]
    fn birthday_timestamp_becomes_iso_date() {
        // 1996-09-16 00:00:00 UTC
        let coerced = coerce_birthday(SqlValue::Integer(842832000));
        assert_eq!(coerced, SqlValue::Text("1996-09-16".to_string()));
    }

    #[test]
    fn unusable_timestamps_become_null() {
        assert_eq!(coerce_birthday(SqlValue::Real(f64::NAN)), SqlValue::Null);
        assert_eq!(
            coerce_birthday(SqlValue::Real(f64::INFINITY)),
            SqlValue::Null
        );
        assert_eq!(coerce_birthday(SqlValue::Integer(i64::MAX)), SqlValue::Null);
    }

    #[test]
    fn birthday_passthrough_for_text_and_null() {
        assert_eq!(
            coerce_birthday(SqlValue::Text("1996-09-16".to_string())),
            SqlValue::Text("1996-09-16".to_string())
        );
        assert_eq!(coerce_birthday(SqlValue::Null), SqlValue::Null);
    }
}
