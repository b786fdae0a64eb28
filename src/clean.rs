use std::collections::HashMap;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params};

use crate::error::{PipelineError, Result};
use crate::silver::SILVER_TABLE;

pub const CLEAN_TABLE: &str = "player_stats_clean";

const CREATE_CLEAN_SQL: &str = "
    CREATE TABLE player_stats_clean (
        player_id INTEGER NOT NULL,
        player_name TEXT NOT NULL,
        team_id INTEGER NOT NULL,
        team_name TEXT NOT NULL,
        season_id INTEGER NOT NULL,
        goals REAL NOT NULL,
        assists REAL NOT NULL,
        minutes_played REAL NOT NULL,
        appearances REAL NOT NULL,
        yellow_cards REAL NOT NULL,
        red_cards REAL NOT NULL,
        tackles REAL NOT NULL,
        interceptions REAL NOT NULL,
        fouls REAL NOT NULL,
        passes_accuracy_percent REAL NOT NULL,
        UNIQUE (player_id, season_id)
    );
";

/// One cleaned row: identity plus counting stats, keyed by
/// (player_id, season_id), with every null already filled.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub player_id: i64,
    pub player_name: String,
    pub team_id: i64,
    pub team_name: String,
    pub season_id: i64,
    pub goals: f64,
    pub assists: f64,
    pub minutes_played: f64,
    pub appearances: f64,
    pub yellow_cards: f64,
    pub red_cards: f64,
    pub tackles: f64,
    pub interceptions: f64,
    pub fouls: f64,
    pub passes_accuracy_percent: f64,
}

/// Enforce the data-quality invariants over the normalized table and
/// fully replace the clean table: names null-filled to "Unknown",
/// counting stats null-filled to 0, key fields coerced to integers, and
/// exactly one row per (player_id, season_id). When the key repeats, the
/// last occurrence in ingestion order wins; the survivor keeps the
/// first occurrence's position.
pub fn clean_normalized(conn: &mut Connection) -> Result<usize> {
    let records = read_cleaned_rows(conn)?;

    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {CLEAN_TABLE};"))?;
    tx.execute_batch(CREATE_CLEAN_SQL)?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {CLEAN_TABLE} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ))?;
        for rec in &records {
            stmt.execute(params![
                rec.player_id,
                rec.player_name,
                rec.team_id,
                rec.team_name,
                rec.season_id,
                rec.goals,
                rec.assists,
                rec.minutes_played,
                rec.appearances,
                rec.yellow_cards,
                rec.red_cards,
                rec.tackles,
                rec.interceptions,
                rec.fouls,
                rec.passes_accuracy_percent,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

fn read_cleaned_rows(conn: &Connection) -> Result<Vec<CleanRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT player_id, player_name, team_id, team_name, season_id, goals, assists,
                minutes_played, appearances, yellow_cards, red_cards, tackles,
                interceptions, fouls, passes_accuracy_percent
         FROM {SILVER_TABLE}"
    ))?;

    let mut records: Vec<CleanRecord> = Vec::new();
    let mut by_key: HashMap<(i64, i64), usize> = HashMap::new();

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let player_id = coerce_id("player_id", row.get::<_, SqlValue>(0)?)?;
        let team_id = coerce_id("team_id", row.get::<_, SqlValue>(2)?)?;
        let season_id = coerce_id("season_id", row.get::<_, SqlValue>(4)?)?;
        let rec = CleanRecord {
            player_id,
            player_name: fill_name(row.get::<_, Option<String>>(1)?),
            team_id,
            team_name: fill_name(row.get::<_, Option<String>>(3)?),
            season_id,
            goals: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
            assists: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
            minutes_played: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
            appearances: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
            yellow_cards: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
            red_cards: row.get::<_, Option<f64>>(10)?.unwrap_or(0.0),
            tackles: row.get::<_, Option<f64>>(11)?.unwrap_or(0.0),
            interceptions: row.get::<_, Option<f64>>(12)?.unwrap_or(0.0),
            fouls: row.get::<_, Option<f64>>(13)?.unwrap_or(0.0),
            passes_accuracy_percent: row.get::<_, Option<f64>>(14)?.unwrap_or(0.0),
        };

        match by_key.get(&(rec.player_id, rec.season_id)).copied() {
            Some(idx) => records[idx] = rec,
            None => {
                by_key.insert((rec.player_id, rec.season_id), records.len());
                records.push(rec);
            }
        }
    }
    Ok(records)
}

/// Load the cleaned rows back out, in stored order. Used by the metric
/// deriver and by tests asserting the clean invariants.
pub fn load_clean_records(conn: &Connection) -> Result<Vec<CleanRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT player_id, player_name, team_id, team_name, season_id, goals, assists,
                minutes_played, appearances, yellow_cards, red_cards, tackles,
                interceptions, fouls, passes_accuracy_percent
         FROM {CLEAN_TABLE}"
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(CleanRecord {
            player_id: row.get(0)?,
            player_name: row.get(1)?,
            team_id: row.get(2)?,
            team_name: row.get(3)?,
            season_id: row.get(4)?,
            goals: row.get(5)?,
            assists: row.get(6)?,
            minutes_played: row.get(7)?,
            appearances: row.get(8)?,
            yellow_cards: row.get(9)?,
            red_cards: row.get(10)?,
            tackles: row.get(11)?,
            interceptions: row.get(12)?,
            fouls: row.get(13)?,
            passes_accuracy_percent: row.get(14)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// Only null gets the default; empty strings pass through unchanged.
fn fill_name(value: Option<String>) -> String {
    value.unwrap_or_else(|| "Unknown".to_string())
}

/// Key fields must be integers. Integral reals and integer-looking text
/// are accepted (the dynamic bronze schema gives no typing guarantee);
/// anything else, including null, aborts the run.
fn coerce_id(column: &'static str, value: SqlValue) -> Result<i64> {
    let fail = |value: &SqlValue| PipelineError::TypeCoercion {
        column,
        value: render_value(value),
    };
    match &value {
        SqlValue::Integer(n) => Ok(*n),
        SqlValue::Real(f) if f.fract() == 0.0 => Ok(*f as i64),
        SqlValue::Text(s) => s.trim().parse::<i64>().map_err(|_| fail(&value)),
        _ => Err(fail(&value)),
    }
}

fn render_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(n) => n.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value as SqlValue;

    use super::{coerce_id, fill_name};
    use crate::error::PipelineError;

    #[test]
    fn coerces_integral_values() {
        assert_eq!(coerce_id("player_id", SqlValue::Integer(7)).unwrap(), 7);
        assert_eq!(coerce_id("player_id", SqlValue::Real(7.0)).unwrap(), 7);
        assert_eq!(
            coerce_id("player_id", SqlValue::Text(" 42 ".to_string())).unwrap(),
            42
        );
    }

    #[test]
    fn non_numeric_ids_are_fatal() {
        for bad in [
            SqlValue::Null,
            SqlValue::Real(7.5),
            SqlValue::Text("abc".to_string()),
        ] {
            let err = coerce_id("season_id", bad).unwrap_err();
            assert!(matches!(
                err,
                PipelineError::TypeCoercion {
                    column: "season_id",
                    ..
                }
            ));
        }
    }

    #[test]
    fn only_null_names_default_to_unknown() {
        assert_eq!(fill_name(None), "Unknown");
        assert_eq!(fill_name(Some(String::new())), "");
        assert_eq!(fill_name(Some("Saka".to_string())), "Saka");
    }
}
