use std::path::Path;

use log::{info, warn};
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::RunConfig;
use crate::error::Result;
use crate::{bronze, clean, gold, read_model, silver, stats_api};

/// Row counts committed by each stage of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub raw_rows: usize,
    pub normalized_rows: usize,
    pub clean_rows: usize,
    pub gold_rows: usize,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    Ok(conn)
}

/// Run the full bronze → silver → clean → gold → read-model pipeline,
/// strictly in order: each stage commits its full table replacement
/// before the next starts. The fetch happens before any write, so a
/// transport failure leaves every table untouched. A failure in a later
/// stage leaves earlier stages' tables in their new state and later
/// tables in their prior state; there is no cross-stage rollback.
pub fn run(conn: &mut Connection, client: &Client, config: &RunConfig) -> Result<PipelineSummary> {
    info!(
        "fetching player season stats (tournament={}, season={})",
        config.tournament_id, config.season_id
    );
    let payload = stats_api::fetch_player_season_stats(client, config)?;

    let raw_rows = bronze::replace_raw_table(conn, &payload)?;
    info!("bronze: {raw_rows} raw rows");
    if raw_rows == 0 {
        warn!("upstream returned an empty collection; normalization will fail on missing columns");
    }

    let normalized_rows = silver::normalize_bronze(conn)?;
    info!("silver: {normalized_rows} normalized rows");

    let clean_rows = clean::clean_normalized(conn)?;
    info!("clean: {clean_rows} rows after dedup");

    let gold_rows = gold::derive_gold(conn)?;
    info!("gold: {gold_rows} rows published");

    read_model::publish_read_models(conn)?;
    info!("read models rebuilt");

    Ok(PipelineSummary {
        raw_rows,
        normalized_rows,
        clean_rows,
        gold_rows,
    })
}
