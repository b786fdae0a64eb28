use rusqlite::{Connection, params};

use crate::clean::{self, CleanRecord};
use crate::error::Result;

pub const GOLD_TABLE: &str = "player_stats_gold";
const STAGING_TABLE: &str = "player_stats_gold_staging";

/// The published analytical column set, in order. The read-model
/// publisher depends on these names verbatim, so this is the one schema
/// that must not drift.
pub const GOLD_COLUMNS: [&str; 23] = [
    "player_id",
    "player_name",
    "team_id",
    "team_name",
    "season_id",
    "goals",
    "assists",
    "appearances",
    "minutes_played",
    "goal_per_appearance",
    "assist_per_appearance",
    "goal_assist_per_90",
    "passes_accuracy_percent",
    "yellow_cards",
    "yellow_per_appearance",
    "red_cards",
    "red_per_appearance",
    "tackles",
    "tackles_per_90",
    "interceptions",
    "interceptions_per_90",
    "fouls",
    "fouls_per_90",
];

const CREATE_STAGING_SQL: &str = "
    CREATE TABLE player_stats_gold_staging (
        player_id INTEGER NOT NULL,
        player_name TEXT NOT NULL,
        team_id INTEGER NOT NULL,
        team_name TEXT NOT NULL,
        season_id INTEGER NOT NULL,
        goals REAL NOT NULL,
        assists REAL NOT NULL,
        appearances REAL NOT NULL,
        minutes_played REAL NOT NULL,
        goal_per_appearance REAL NOT NULL,
        assist_per_appearance REAL NOT NULL,
        goal_assist_per_90 REAL NOT NULL,
        passes_accuracy_percent REAL NOT NULL,
        yellow_cards REAL NOT NULL,
        yellow_per_appearance REAL NOT NULL,
        red_cards REAL NOT NULL,
        red_per_appearance REAL NOT NULL,
        tackles REAL NOT NULL,
        tackles_per_90 REAL NOT NULL,
        interceptions REAL NOT NULL,
        interceptions_per_90 REAL NOT NULL,
        fouls REAL NOT NULL,
        fouls_per_90 REAL NOT NULL
    );
";

#[derive(Debug, Clone, PartialEq)]
pub struct GoldRecord {
    pub base: CleanRecord,
    pub goal_per_appearance: f64,
    pub assist_per_appearance: f64,
    pub goal_assist_per_90: f64,
    pub yellow_per_appearance: f64,
    pub red_per_appearance: f64,
    pub tackles_per_90: f64,
    pub interceptions_per_90: f64,
    pub fouls_per_90: f64,
}

/// Derive the published rate metrics from one cleaned row. A zero
/// denominator is treated as 1, never as null: a player with 0
/// appearances and 0 goals reports a per-appearance rate of 0, not
/// "undefined". This is the literal published contract; changing it would
/// silently alter downstream analytics.
pub fn derive_record(base: CleanRecord) -> GoldRecord {
    let goal_per_appearance = per_unit(base.goals, base.appearances);
    let assist_per_appearance = per_unit(base.assists, base.appearances);
    let goal_assist_per_90 = per_90(base.goals + base.assists, base.minutes_played);
    let yellow_per_appearance = per_unit(base.yellow_cards, base.appearances);
    let red_per_appearance = per_unit(base.red_cards, base.appearances);
    let tackles_per_90 = per_90(base.tackles, base.minutes_played);
    let interceptions_per_90 = per_90(base.interceptions, base.minutes_played);
    let fouls_per_90 = per_90(base.fouls, base.minutes_played);
    GoldRecord {
        base,
        goal_per_appearance,
        assist_per_appearance,
        goal_assist_per_90,
        yellow_per_appearance,
        red_per_appearance,
        tackles_per_90,
        interceptions_per_90,
        fouls_per_90,
    }
}

fn per_unit(numerator: f64, denominator: f64) -> f64 {
    let denominator = if denominator == 0.0 { 1.0 } else { denominator };
    numerator / denominator
}

fn per_90(count: f64, minutes_played: f64) -> f64 {
    per_unit(count, minutes_played) * 90.0
}

/// Compute gold rows from the clean table and publish them atomically:
/// everything is written to a staging table which is then swapped in
/// (drop + rename) inside the same transaction. A crash at any point
/// leaves the previous gold table intact; there is no window in which a
/// reader can observe an empty or half-written table.
pub fn derive_gold(conn: &mut Connection) -> Result<usize> {
    let records = clean::load_clean_records(conn)?
        .into_iter()
        .map(derive_record)
        .collect::<Vec<_>>();

    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {STAGING_TABLE};"))?;
    tx.execute_batch(CREATE_STAGING_SQL)?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {STAGING_TABLE} VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                                                 ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)"
        ))?;
        for rec in &records {
            stmt.execute(params![
                rec.base.player_id,
                rec.base.player_name,
                rec.base.team_id,
                rec.base.team_name,
                rec.base.season_id,
                rec.base.goals,
                rec.base.assists,
                rec.base.appearances,
                rec.base.minutes_played,
                rec.goal_per_appearance,
                rec.assist_per_appearance,
                rec.goal_assist_per_90,
                rec.base.passes_accuracy_percent,
                rec.base.yellow_cards,
                rec.yellow_per_appearance,
                rec.base.red_cards,
                rec.red_per_appearance,
                rec.base.tackles,
                rec.tackles_per_90,
                rec.base.interceptions,
                rec.interceptions_per_90,
                rec.base.fouls,
                rec.fouls_per_90,
            ])?;
        }
    }
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {GOLD_TABLE};
         ALTER TABLE {STAGING_TABLE} RENAME TO {GOLD_TABLE};"
    ))?;
    tx.commit()?;
    Ok(records.len())
}
