use rusqlite::Connection;

use crate::error::Result;
use crate::gold::GOLD_TABLE;

pub const TEAM_AGGREGATES_TABLE: &str = "team_aggregates";
const TOP_N: u32 = 50;

/// One ranked read model over the gold table: a view named `name`,
/// exposing identity columns plus `ranked_columns`, ordered by
/// `order_by`, capped at the top 50.
struct RankingView {
    name: &'static str,
    ranked_columns: &'static [&'static str],
    order_by: &'static str,
}

const RANKINGS: &[RankingView] = &[
    RankingView {
        name: "top_scorers",
        ranked_columns: &["goals", "goal_assist_per_90"],
        order_by: "goals DESC",
    },
    RankingView {
        name: "top_assisters",
        ranked_columns: &["assists", "goal_assist_per_90"],
        order_by: "assists DESC",
    },
    RankingView {
        name: "disciplined_players",
        ranked_columns: &["yellow_per_appearance", "red_per_appearance"],
        order_by: "red_per_appearance DESC, yellow_per_appearance DESC",
    },
    RankingView {
        name: "top_pass_accuracy",
        ranked_columns: &["passes_accuracy_percent"],
        order_by: "passes_accuracy_percent DESC",
    },
];

const CREATE_TEAM_AGGREGATES_SQL: &str = "
    CREATE TABLE team_aggregates AS
    SELECT
        team_name,
        season_id,
        SUM(goals) AS total_goals,
        SUM(assists) AS total_assists,
        SUM(appearances) AS total_appearances,
        AVG(passes_accuracy_percent) AS avg_pass_accuracy,
        SUM(yellow_cards) AS total_yellow,
        SUM(red_cards) AS total_red,
        SUM(tackles) AS total_tackles,
        SUM(interceptions) AS total_interceptions,
        SUM(fouls) AS total_fouls
    FROM player_stats_gold
    GROUP BY team_name, season_id
    ORDER BY total_goals DESC;
";

/// Rebuild the four ranking views and the team aggregate table. These
/// are pure functions of the gold table and carry no independent state;
/// they only assume the gold column names stay stable.
pub fn publish_read_models(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    for view in RANKINGS {
        tx.execute_batch(&format!(
            "DROP VIEW IF EXISTS {name};
             CREATE VIEW {name} AS
             SELECT player_name, team_name, season_id, {columns}
             FROM {GOLD_TABLE}
             ORDER BY {order_by}
             LIMIT {TOP_N};",
            name = view.name,
            columns = view.ranked_columns.join(", "),
            order_by = view.order_by,
        ))?;
    }
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {TEAM_AGGREGATES_TABLE};"
    ))?;
    tx.execute_batch(CREATE_TEAM_AGGREGATES_SQL)?;
    tx.commit()?;
    Ok(())
}
